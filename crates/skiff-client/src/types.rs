//! Common result types for client operations

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Result of writing an object, whether single-shot or multipart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectWriteResult {
    /// ETag of the stored object, quotes stripped.
    pub etag: String,
    /// Version id, when the bucket has versioning enabled.
    pub version_id: Option<String>,
}

/// Metadata returned by a HEAD on an object.
#[derive(Clone, Debug)]
pub struct ObjectStat {
    /// ETag, quotes stripped.
    pub etag: String,
    /// Content type, if reported.
    pub content_type: Option<String>,
    /// Size in bytes.
    pub content_length: u64,
    /// User-defined metadata (`x-amz-meta-*`), keys without the prefix.
    pub metadata: HashMap<String, String>,
}

/// Optional headers attached when storing an object.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetadata {
    /// Content type.
    pub content_type: Option<String>,
    /// User-defined metadata, stored under `x-amz-meta-*`.
    pub user_metadata: HashMap<String, String>,
}

impl ObjectMetadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add one user metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_metadata.insert(key.into(), value.into());
        self
    }

    /// Flatten into request headers.
    pub(crate) fn into_headers(self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(content_type) = self.content_type {
            headers.insert("Content-Type".to_string(), content_type);
        }
        for (key, value) in self.user_metadata {
            headers.insert(format!("x-amz-meta-{key}"), value);
        }
        headers
    }
}
