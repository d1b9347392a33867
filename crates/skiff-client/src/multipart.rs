//! Resumable multipart upload engine.
//!
//! An upload runs as: resume detection (or initiation), then a feeder task
//! pushing fixed-size chunks from the source into a bounded channel while
//! the consumer uploads them sequentially, then server-side completion with
//! the ordered part manifest. Parts whose MD5 digest matches a part already
//! stored at the same position from an interrupted run are skipped without
//! a network call.
//!
//! On error the session is left on the server; resuming or calling
//! [`SkiffClient::abort_multipart_upload`] is the caller's decision.

use std::collections::BTreeMap;

use bytes::Bytes;
use md5::{Digest as _, Md5};
use reqwest::{Method, StatusCode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use skiff_xml::{
    build_complete_multipart_xml, parse_complete_multipart, parse_initiate_multipart,
    parse_list_multipart_uploads, parse_list_parts, CompleteOutcome, CompletedPart,
    MultipartUploadEntry, PartEntry,
};

use crate::client::SkiffClient;
use crate::config::MAX_PARTS;
use crate::error::{Error, Result};
use crate::partsize::calculate_part_size;
use crate::request::{etag_from_response, version_id_from_response, RequestDescriptor};
use crate::types::{ObjectMetadata, ObjectWriteResult};
use crate::validate::{check_bucket_name, check_object_name};

/// A part stored by a previous, interrupted run of the same upload.
#[derive(Clone, Debug)]
struct PreviousPart {
    etag: String,
    size: u64,
}

/// One multipart upload in flight. Created per engine invocation, never
/// persisted; resumption works by re-querying the server, not local state.
#[derive(Debug)]
struct UploadSession {
    bucket: String,
    object: String,
    upload_id: String,
    previous: BTreeMap<u16, PreviousPart>,
}

impl SkiffClient {
    /// Store an object from an in-memory buffer.
    ///
    /// Routes to a single PUT when the buffer fits in one part, otherwise
    /// through the multipart engine.
    #[instrument(skip(self, data))]
    pub async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: impl Into<Bytes>,
    ) -> Result<ObjectWriteResult> {
        self.put_object_with_metadata(bucket, object, data, None).await
    }

    /// Store an object from an in-memory buffer with optional headers.
    #[instrument(skip(self, data, metadata))]
    pub async fn put_object_with_metadata(
        &self,
        bucket: &str,
        object: &str,
        data: impl Into<Bytes>,
        metadata: Option<ObjectMetadata>,
    ) -> Result<ObjectWriteResult> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;

        let data = data.into();
        let total_size = data.len() as u64;
        let part_size = calculate_part_size(self.config(), total_size)?;

        if total_size <= part_size {
            return self.put_object_single(bucket, object, data, metadata).await;
        }
        self.upload_stream(bucket, object, metadata, std::io::Cursor::new(data), part_size)
            .await
    }

    /// Store an object from an async byte source of known total size.
    ///
    /// The source is consumed in `part_size` chunks with bounded memory; the
    /// whole object is never buffered unless it fits in a single part.
    #[instrument(skip(self, source, metadata))]
    pub async fn put_object_stream<R>(
        &self,
        bucket: &str,
        object: &str,
        source: R,
        total_size: u64,
        metadata: Option<ObjectMetadata>,
    ) -> Result<ObjectWriteResult>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        check_bucket_name(bucket)?;
        check_object_name(object)?;

        let part_size = calculate_part_size(self.config(), total_size)?;

        if total_size <= part_size {
            let mut buf = Vec::with_capacity(total_size as usize);
            source.take(total_size).read_to_end(&mut buf).await?;
            return self
                .put_object_single(bucket, object, Bytes::from(buf), metadata)
                .await;
        }
        self.upload_stream(bucket, object, metadata, source, part_size).await
    }

    /// Single-shot path: one PUT carrying the whole payload.
    async fn put_object_single(
        &self,
        bucket: &str,
        object: &str,
        data: Bytes,
        metadata: Option<ObjectMetadata>,
    ) -> Result<ObjectWriteResult> {
        let descriptor = RequestDescriptor::new(Method::PUT, Some(bucket), Some(object))
            .headers(metadata.map(ObjectMetadata::into_headers).unwrap_or_default());

        let response = self.execute(descriptor, data, &[StatusCode::OK]).await?;
        Ok(ObjectWriteResult {
            etag: etag_from_response(&response).unwrap_or_default(),
            version_id: version_id_from_response(&response),
        })
    }

    /// Multipart path: chunk the source and upload parts sequentially,
    /// skipping parts already stored by an interrupted run.
    async fn upload_stream<R>(
        &self,
        bucket: &str,
        object: &str,
        metadata: Option<ObjectMetadata>,
        mut source: R,
        part_size: u64,
    ) -> Result<ObjectWriteResult>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let session = self.open_session(bucket, object, metadata).await?;

        let chunk_size = part_size as usize;
        let (tx, mut rx) = mpsc::channel::<Bytes>(2);

        // The feeder reads ahead while the consumer uploads, bounded by the
        // channel capacity.
        let feeder = tokio::spawn(async move {
            loop {
                let chunk = read_chunk(&mut source, chunk_size).await?;
                if chunk.is_empty() {
                    break;
                }
                let last = chunk.len() < chunk_size;
                if tx.send(chunk).await.is_err() {
                    // Consumer bailed out; its error wins.
                    break;
                }
                if last {
                    break;
                }
            }
            Ok::<(), std::io::Error>(())
        });

        let consumed = self.consume_chunks(&session, &mut rx).await;
        drop(rx);

        match feeder.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(join_err) => {
                return Err(Error::Protocol(format!("chunk feeder task failed: {join_err}")))
            }
        }

        let parts = consumed?;
        self.complete_multipart_upload(&session, &parts).await
    }

    /// Drain chunks in order, assigning part numbers from 1 upward.
    async fn consume_chunks(
        &self,
        session: &UploadSession,
        rx: &mut mpsc::Receiver<Bytes>,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut part_number: u16 = 1;

        while let Some(chunk) = rx.recv().await {
            if u64::from(part_number) > MAX_PARTS {
                return Err(Error::InvalidArgument(format!(
                    "upload would exceed {MAX_PARTS} parts; use a larger part size"
                )));
            }

            let digest = hex::encode(Md5::digest(&chunk));
            if let Some(previous) = session.previous.get(&part_number) {
                if previous.etag == digest && previous.size == chunk.len() as u64 {
                    debug!(part_number, "part matches stored digest, skipping transfer");
                    parts.push(CompletedPart {
                        part_number,
                        etag: previous.etag.clone(),
                    });
                    part_number += 1;
                    continue;
                }
            }

            let etag = self.upload_part(session, part_number, chunk).await?;
            parts.push(CompletedPart { part_number, etag });
            part_number += 1;
        }

        Ok(parts)
    }

    async fn upload_part(
        &self,
        session: &UploadSession,
        part_number: u16,
        chunk: Bytes,
    ) -> Result<String> {
        let descriptor =
            RequestDescriptor::new(Method::PUT, Some(&session.bucket), Some(&session.object))
                .query("partNumber", &part_number.to_string())
                .query("uploadId", &session.upload_id);

        let response = self.execute(descriptor, chunk, &[StatusCode::OK]).await?;
        etag_from_response(&response)
            .ok_or_else(|| Error::Protocol("part upload response carried no ETag".to_string()))
    }

    /// Resume the latest incomplete upload for this key, or initiate a new
    /// one.
    async fn open_session(
        &self,
        bucket: &str,
        object: &str,
        metadata: Option<ObjectMetadata>,
    ) -> Result<UploadSession> {
        if let Some(upload_id) = self.find_resumable_upload(bucket, object).await? {
            debug!(bucket, object, upload_id, "resuming incomplete multipart upload");
            let previous = self.fetch_previous_parts(bucket, object, &upload_id).await?;
            return Ok(UploadSession {
                bucket: bucket.to_string(),
                object: object.to_string(),
                upload_id,
                previous,
            });
        }

        let upload_id = self.initiate_multipart_upload(bucket, object, metadata).await?;
        Ok(UploadSession {
            bucket: bucket.to_string(),
            object: object.to_string(),
            upload_id,
            previous: BTreeMap::new(),
        })
    }

    /// List the bucket's incomplete multipart uploads under a prefix,
    /// following pagination to the end.
    pub async fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<MultipartUploadEntry>> {
        check_bucket_name(bucket)?;

        let mut uploads = Vec::new();
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;

        loop {
            let mut descriptor = RequestDescriptor::new(Method::GET, Some(bucket), None)
                .query("uploads", "")
                .query("prefix", prefix)
                .query("max-uploads", "1000");
            if let Some(marker) = &key_marker {
                descriptor = descriptor.query("key-marker", marker);
            }
            if let Some(marker) = &upload_id_marker {
                descriptor = descriptor.query("upload-id-marker", marker);
            }

            let response = self.execute(descriptor, Bytes::new(), &[StatusCode::OK]).await?;
            let page = parse_list_multipart_uploads(&response.text().await?)?;

            uploads.extend(page.uploads);

            if !page.is_truncated {
                break;
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
            if key_marker.is_none() && upload_id_marker.is_none() {
                // Truncated page without markers gives nothing to continue from.
                break;
            }
        }

        Ok(uploads)
    }

    /// List the stored parts of an incomplete upload, following pagination
    /// to the end.
    pub async fn list_parts(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> Result<Vec<PartEntry>> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;

        let mut parts = Vec::new();
        let mut marker: Option<u16> = None;

        loop {
            let mut descriptor = RequestDescriptor::new(Method::GET, Some(bucket), Some(object))
                .query("uploadId", upload_id);
            if let Some(marker) = marker {
                descriptor = descriptor.query("part-number-marker", &marker.to_string());
            }

            let response = self.execute(descriptor, Bytes::new(), &[StatusCode::OK]).await?;
            let page = parse_list_parts(&response.text().await?)?;

            parts.extend(page.parts);

            if !page.is_truncated {
                break;
            }
            marker = page.next_part_number_marker;
            if marker.is_none() {
                break;
            }
        }

        Ok(parts)
    }

    /// Among the bucket's incomplete uploads for exactly this key, pick the
    /// one initiated most recently.
    async fn find_resumable_upload(&self, bucket: &str, object: &str) -> Result<Option<String>> {
        let mut latest: Option<MultipartUploadEntry> = None;
        for upload in self.list_incomplete_uploads(bucket, object).await? {
            if upload.key != object {
                continue;
            }
            let newer = match &latest {
                None => true,
                Some(current) => upload.initiated >= current.initiated,
            };
            if newer {
                latest = Some(upload);
            }
        }
        Ok(latest.map(|upload| upload.upload_id))
    }

    /// Fetch all stored parts of an upload into a part-number map.
    async fn fetch_previous_parts(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> Result<BTreeMap<u16, PreviousPart>> {
        let mut previous = BTreeMap::new();
        for part in self.list_parts(bucket, object, upload_id).await? {
            previous.insert(
                part.part_number,
                PreviousPart {
                    etag: part.etag,
                    size: part.size,
                },
            );
        }
        Ok(previous)
    }

    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        object: &str,
        metadata: Option<ObjectMetadata>,
    ) -> Result<String> {
        let descriptor = RequestDescriptor::new(Method::POST, Some(bucket), Some(object))
            .query("uploads", "")
            .headers(metadata.map(ObjectMetadata::into_headers).unwrap_or_default());

        let response = self.execute(descriptor, Bytes::new(), &[StatusCode::OK]).await?;
        let result = parse_initiate_multipart(&response.text().await?)?;
        debug!(bucket, object, upload_id = result.upload_id, "initiated multipart upload");
        Ok(result.upload_id)
    }

    /// Issue `CompleteMultipartUpload` with the ordered part manifest.
    ///
    /// Completion failures can arrive inside a `200 OK` body; those are
    /// translated into server errors here.
    async fn complete_multipart_upload(
        &self,
        session: &UploadSession,
        parts: &[CompletedPart],
    ) -> Result<ObjectWriteResult> {
        debug_assert!(parts.windows(2).all(|w| w[0].part_number < w[1].part_number));

        let body = build_complete_multipart_xml(parts);
        let mut headers = std::collections::HashMap::new();
        headers.insert("Content-Type".to_string(), "application/xml".to_string());

        let descriptor =
            RequestDescriptor::new(Method::POST, Some(&session.bucket), Some(&session.object))
                .query("uploadId", &session.upload_id)
                .headers(headers);

        let response = self
            .execute(descriptor, Bytes::from(body), &[StatusCode::OK])
            .await?;
        let version_id = version_id_from_response(&response);
        let text = response.text().await?;

        match parse_complete_multipart(&text) {
            Ok(CompleteOutcome::Completed(result)) => Ok(ObjectWriteResult {
                etag: result.etag,
                version_id,
            }),
            Ok(CompleteOutcome::ServerFailure(envelope)) => {
                Err(Error::from_envelope(envelope, StatusCode::OK.as_u16()))
            }
            Err(err) => Err(Error::Protocol(format!(
                "completion response could not be parsed: {err}"
            ))),
        }
    }
}

/// Read the next chunk of up to `chunk_size` bytes from the source.
///
/// Short reads are retried until the chunk is full or the source is
/// exhausted; only the final chunk of a stream may be shorter.
async fn read_chunk<R: AsyncRead + Unpin>(
    source: &mut R,
    chunk_size: usize,
) -> std::io::Result<Bytes> {
    let mut buf = vec![0u8; chunk_size];
    let mut filled = 0;
    while filled < chunk_size {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn read_chunk_yields_fixed_blocks_and_short_tail() {
        let data = vec![7u8; 10];
        let mut source = Cursor::new(data);

        let first = read_chunk(&mut source, 4).await.unwrap();
        let second = read_chunk(&mut source, 4).await.unwrap();
        let third = read_chunk(&mut source, 4).await.unwrap();
        let done = read_chunk(&mut source, 4).await.unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        assert_eq!(third.len(), 2);
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn read_chunk_exact_boundary_has_no_padding() {
        let mut source = Cursor::new(vec![1u8; 8]);
        assert_eq!(read_chunk(&mut source, 4).await.unwrap().len(), 4);
        assert_eq!(read_chunk(&mut source, 4).await.unwrap().len(), 4);
        assert!(read_chunk(&mut source, 4).await.unwrap().is_empty());
    }
}
