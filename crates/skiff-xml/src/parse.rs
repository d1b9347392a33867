//! Event-driven parsers for the S3 response documents the client consumes.
//!
//! Each parser takes the raw response body and returns a typed struct. The
//! reader skips elements it does not recognize, so additive server-side
//! schema changes do not break parsing.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::XmlError;
use crate::types::{
    CompleteMultipartResult, CompleteOutcome, ErrorEnvelope, InitiateMultipartResult,
    ListMultipartUploadsPage, ListPartsPage, MultipartUploadEntry, PartEntry,
};

/// Parse a `GetBucketLocation` response.
///
/// The body is a single `<LocationConstraint>` element whose text is the
/// region. Buckets in the default region report an empty constraint; the
/// empty string is returned as-is and mapped to the default region by the
/// caller.
pub fn parse_bucket_region(xml: &str) -> Result<String, XmlError> {
    let mut reader = make_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(_) => return read_text_content(&mut reader),
            // Self-closing <LocationConstraint/> means the default region.
            Event::Empty(_) => return Ok(String::new()),
            Event::Eof => return Err(XmlError::MissingElement("LocationConstraint".to_string())),
            _ => {}
        }
    }
}

/// Parse an `<Error>` response body into an [`ErrorEnvelope`].
pub fn parse_error_envelope(xml: &str) -> Result<ErrorEnvelope, XmlError> {
    let mut reader = make_reader(xml);
    expect_root(&mut reader, "Error")?;
    read_error_body(&mut reader)
}

/// Parse an `InitiateMultipartUpload` response.
pub fn parse_initiate_multipart(xml: &str) -> Result<InitiateMultipartResult, XmlError> {
    let mut reader = make_reader(xml);
    expect_root(&mut reader, "InitiateMultipartUploadResult")?;

    let mut bucket = None;
    let mut key = None;
    let mut upload_id = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Bucket" => bucket = Some(read_text_content(&mut reader)?),
                b"Key" => key = Some(read_text_content(&mut reader)?),
                b"UploadId" => upload_id = Some(read_text_content(&mut reader)?),
                _ => skip_element(&mut reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(InitiateMultipartResult {
        bucket: bucket.ok_or_else(|| XmlError::MissingElement("Bucket".to_string()))?,
        key: key.ok_or_else(|| XmlError::MissingElement("Key".to_string()))?,
        upload_id: upload_id.ok_or_else(|| XmlError::MissingElement("UploadId".to_string()))?,
    })
}

/// Parse one page of a `ListMultipartUploads` response.
pub fn parse_list_multipart_uploads(xml: &str) -> Result<ListMultipartUploadsPage, XmlError> {
    let mut reader = make_reader(xml);
    expect_root(&mut reader, "ListMultipartUploadsResult")?;

    let mut page = ListMultipartUploadsPage::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Upload" => page.uploads.push(read_upload_entry(&mut reader)?),
                b"IsTruncated" => {
                    page.is_truncated = read_text_content(&mut reader)? == "true";
                }
                b"NextKeyMarker" => {
                    page.next_key_marker = non_empty(read_text_content(&mut reader)?);
                }
                b"NextUploadIdMarker" => {
                    page.next_upload_id_marker = non_empty(read_text_content(&mut reader)?);
                }
                _ => skip_element(&mut reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

/// Parse one page of a `ListParts` response.
pub fn parse_list_parts(xml: &str) -> Result<ListPartsPage, XmlError> {
    let mut reader = make_reader(xml);
    expect_root(&mut reader, "ListPartsResult")?;

    let mut page = ListPartsPage::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Part" => page.parts.push(read_part_entry(&mut reader)?),
                b"IsTruncated" => {
                    page.is_truncated = read_text_content(&mut reader)? == "true";
                }
                b"NextPartNumberMarker" => {
                    let text = read_text_content(&mut reader)?;
                    page.next_part_number_marker = text.parse().ok();
                }
                _ => skip_element(&mut reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(page)
}

/// Parse a `CompleteMultipartUpload` response.
///
/// Completion failures can hide inside a `200 OK`: the server may replace the
/// result document with an `<Error>` document after the status line has been
/// sent. The root element name decides which variant of [`CompleteOutcome`]
/// is returned.
pub fn parse_complete_multipart(xml: &str) -> Result<CompleteOutcome, XmlError> {
    let mut reader = make_reader(xml);

    let root = loop {
        match reader.read_event()? {
            Event::Start(e) => break e.name().as_ref().to_vec(),
            Event::Eof => {
                return Err(XmlError::MissingElement(
                    "CompleteMultipartUploadResult".to_string(),
                ))
            }
            _ => {}
        }
    };

    match root.as_slice() {
        b"Error" => Ok(CompleteOutcome::ServerFailure(read_error_body(&mut reader)?)),
        b"CompleteMultipartUploadResult" => {
            let mut location = None;
            let mut bucket = None;
            let mut key = None;
            let mut etag = None;

            loop {
                match reader.read_event()? {
                    Event::Start(e) => match e.name().as_ref() {
                        b"Location" => location = Some(read_text_content(&mut reader)?),
                        b"Bucket" => bucket = Some(read_text_content(&mut reader)?),
                        b"Key" => key = Some(read_text_content(&mut reader)?),
                        b"ETag" => etag = Some(strip_quotes(read_text_content(&mut reader)?)),
                        _ => skip_element(&mut reader)?,
                    },
                    Event::End(_) | Event::Eof => break,
                    _ => {}
                }
            }

            Ok(CompleteOutcome::Completed(CompleteMultipartResult {
                location,
                bucket,
                key,
                etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_string()))?,
            }))
        }
        other => Err(XmlError::Unexpected(format!(
            "unexpected root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader
}

/// Consume events up to the root element and verify its name.
fn expect_root(reader: &mut Reader<&[u8]>, name: &str) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if e.name().as_ref() == name.as_bytes() {
                    return Ok(());
                }
                return Err(XmlError::Unexpected(format!(
                    "expected <{}>, found <{}>",
                    name,
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            Event::Eof => return Err(XmlError::MissingElement(name.to_string())),
            _ => {}
        }
    }
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| XmlError::Parse(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "unexpected EOF inside element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Skip over the current element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::Unexpected(
                    "unexpected EOF while skipping element".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Read the children of an `<Error>` element into an envelope.
fn read_error_body(reader: &mut Reader<&[u8]>) -> Result<ErrorEnvelope, XmlError> {
    let mut code = None;
    let mut message = None;
    let mut request_id = None;
    let mut resource = None;
    let mut region = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Code" => code = Some(read_text_content(reader)?),
                b"Message" => message = Some(read_text_content(reader)?),
                b"RequestId" => request_id = Some(read_text_content(reader)?),
                b"Resource" => resource = Some(read_text_content(reader)?),
                b"Region" => region = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(ErrorEnvelope {
        code: code.ok_or_else(|| XmlError::MissingElement("Code".to_string()))?,
        message: message.unwrap_or_default(),
        request_id,
        resource,
        region,
    })
}

fn read_upload_entry(reader: &mut Reader<&[u8]>) -> Result<MultipartUploadEntry, XmlError> {
    let mut key = None;
    let mut upload_id = None;
    let mut initiated = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"Key" => key = Some(read_text_content(reader)?),
                b"UploadId" => upload_id = Some(read_text_content(reader)?),
                b"Initiated" => initiated = parse_timestamp(&read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(MultipartUploadEntry {
        key: key.ok_or_else(|| XmlError::MissingElement("Key".to_string()))?,
        upload_id: upload_id.ok_or_else(|| XmlError::MissingElement("UploadId".to_string()))?,
        initiated,
    })
}

fn read_part_entry(reader: &mut Reader<&[u8]>) -> Result<PartEntry, XmlError> {
    let mut part_number = None;
    let mut etag = None;
    let mut size = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"PartNumber" => {
                    let text = read_text_content(reader)?;
                    part_number = Some(
                        text.parse::<u16>()
                            .map_err(|_| XmlError::Parse(format!("invalid PartNumber: {text}")))?,
                    );
                }
                b"ETag" => etag = Some(strip_quotes(read_text_content(reader)?)),
                b"Size" => {
                    let text = read_text_content(reader)?;
                    size = Some(
                        text.parse::<u64>()
                            .map_err(|_| XmlError::Parse(format!("invalid Size: {text}")))?,
                    );
                }
                _ => skip_element(reader)?,
            },
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }

    Ok(PartEntry {
        part_number: part_number
            .ok_or_else(|| XmlError::MissingElement("PartNumber".to_string()))?,
        etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_string()))?,
        size: size.unwrap_or(0),
    })
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn strip_quotes(s: String) -> String {
    s.trim_matches('"').to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
