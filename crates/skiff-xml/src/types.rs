//! Typed views of the S3 XML documents the client exchanges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A structured S3 error response body.
///
/// Some errors carry extra hints beyond code and message; the most important
/// one for the client is `region`, which `AuthorizationHeaderMalformed`
/// responses use to tell the caller which region the bucket actually lives in.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Machine-readable error code, e.g. `NoSuchBucket`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Request id assigned by the server, if any.
    pub request_id: Option<String>,
    /// The resource the error refers to, if any.
    pub resource: Option<String>,
    /// Corrected region embedded in `AuthorizationHeaderMalformed` errors.
    pub region: Option<String>,
}

/// Result of `InitiateMultipartUpload`.
#[derive(Clone, Debug)]
pub struct InitiateMultipartResult {
    /// Bucket the upload targets.
    pub bucket: String,
    /// Object key the upload targets.
    pub key: String,
    /// Server-assigned upload id for all subsequent part operations.
    pub upload_id: String,
}

/// One in-progress upload from a `ListMultipartUploads` page.
#[derive(Clone, Debug)]
pub struct MultipartUploadEntry {
    /// Object key of the incomplete upload.
    pub key: String,
    /// Upload id of the incomplete upload.
    pub upload_id: String,
    /// When the upload was initiated.
    pub initiated: Option<DateTime<Utc>>,
}

/// One page of `ListMultipartUploads` results.
#[derive(Clone, Debug, Default)]
pub struct ListMultipartUploadsPage {
    /// Uploads on this page.
    pub uploads: Vec<MultipartUploadEntry>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Key marker for the next page.
    pub next_key_marker: Option<String>,
    /// Upload-id marker for the next page.
    pub next_upload_id_marker: Option<String>,
}

/// One previously uploaded part from a `ListParts` page.
///
/// The etag is stored with surrounding quotes stripped.
#[derive(Clone, Debug)]
pub struct PartEntry {
    /// 1-based part number.
    pub part_number: u16,
    /// Content fingerprint of the stored part.
    pub etag: String,
    /// Size of the stored part in bytes.
    pub size: u64,
}

/// One page of `ListParts` results.
#[derive(Clone, Debug, Default)]
pub struct ListPartsPage {
    /// Parts on this page.
    pub parts: Vec<PartEntry>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Part-number marker for the next page.
    pub next_part_number_marker: Option<u16>,
}

/// Successful `CompleteMultipartUpload` response body.
#[derive(Clone, Debug)]
pub struct CompleteMultipartResult {
    /// URL of the completed object, if reported.
    pub location: Option<String>,
    /// Bucket of the completed object, if reported.
    pub bucket: Option<String>,
    /// Key of the completed object, if reported.
    pub key: Option<String>,
    /// Aggregate etag of the completed object, quotes stripped.
    pub etag: String,
}

/// Outcome of parsing a `CompleteMultipartUpload` response.
///
/// The operation can fail inside a `200 OK`: the server streams whitespace
/// while assembling the object and, if assembly fails, replaces the result
/// document with an `<Error>` document. Callers must check for
/// [`CompleteOutcome::ServerFailure`] even on a 2xx status.
#[derive(Clone, Debug)]
pub enum CompleteOutcome {
    /// The upload completed; the body carried a result document.
    Completed(CompleteMultipartResult),
    /// The body carried an error document despite the HTTP status.
    ServerFailure(ErrorEnvelope),
}

/// One entry of the part manifest sent in `CompleteMultipartUpload`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u16,
    /// Etag recorded when the part was uploaded, quotes stripped.
    pub etag: String,
}
