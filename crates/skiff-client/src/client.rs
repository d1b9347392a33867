//! Main client implementation

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use reqwest::{header, Method, StatusCode};
use tracing::instrument;

use crate::config::Config;
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::{Error, Result};
use crate::request::{etag_from_response, RequestDescriptor};
use crate::types::ObjectStat;
use crate::validate::{check_bucket_name, check_object_name};

/// Client for an S3-compatible object-storage endpoint.
///
/// Holds the immutable [`Config`], the HTTP connection pool, and the mutable
/// per-client state: the credentials snapshot and the bucket-to-region
/// cache. Cheap to share behind an [`Arc`]; all operations take `&self`.
pub struct SkiffClient {
    config: Config,
    http: reqwest::Client,
    credentials: Mutex<Option<Credentials>>,
    provider: Option<Arc<dyn CredentialProvider>>,
    region_cache: DashMap<String, String>,
}

impl SkiffClient {
    /// Create an anonymous client.
    pub fn new(config: Config) -> Result<Self> {
        Self::build(config, None, None)
    }

    /// Create a client with static credentials.
    pub fn with_credentials(config: Config, credentials: Credentials) -> Result<Self> {
        Self::build(config, Some(credentials), None)
    }

    /// Create a client whose credentials are refreshed by a provider before
    /// every signed request.
    pub fn with_provider(config: Config, provider: Arc<dyn CredentialProvider>) -> Result<Self> {
        Self::build(config, None, Some(provider))
    }

    fn build(
        config: Config,
        credentials: Option<Credentials>,
        provider: Option<Arc<dyn CredentialProvider>>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            config.user_agent.parse().map_err(|_| {
                Error::InvalidArgument("user agent is not a valid header".to_string())
            })?,
        );

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::Transport)?;

        Ok(Self {
            config,
            http,
            credentials: Mutex::new(credentials),
            provider,
            region_cache: DashMap::new(),
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Snapshot credentials, refreshing through the provider when one is
    /// configured. Provider failures surface as
    /// [`Error::CredentialRefresh`].
    pub(crate) async fn refresh_credentials(&self) -> Result<Option<Credentials>> {
        if let Some(provider) = &self.provider {
            let fresh = provider
                .credentials()
                .await
                .map_err(|e| Error::CredentialRefresh(e.to_string()))?;
            *self.credentials.lock() = Some(fresh.clone());
            return Ok(Some(fresh));
        }
        Ok(self.credentials.lock().clone())
    }

    pub(crate) fn cached_region(&self, bucket: &str) -> Option<String> {
        self.region_cache.get(bucket).map(|entry| entry.value().clone())
    }

    pub(crate) fn cache_region(&self, bucket: &str, region: &str) {
        self.region_cache
            .insert(bucket.to_string(), region.to_string());
    }

    /// Entries are removed, never updated in place; the next call for the
    /// bucket re-resolves.
    pub(crate) fn invalidate_region(&self, bucket: &str) {
        self.region_cache.remove(bucket);
    }

    // ==================== Bucket Operations ====================

    /// Check if a bucket exists.
    #[instrument(skip(self))]
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_bucket_name(bucket)?;
        let descriptor = RequestDescriptor::new(Method::HEAD, Some(bucket), None);
        match self.execute(descriptor, Bytes::new(), &[StatusCode::OK]).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Create a bucket, optionally in a specific region.
    #[instrument(skip(self))]
    pub async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> Result<()> {
        check_bucket_name(bucket)?;

        let target_region = region
            .map(str::to_string)
            .or_else(|| self.config.region.clone())
            .unwrap_or_else(|| crate::config::DEFAULT_REGION.to_string());

        if let (Some(requested), Some(configured)) = (region, &self.config.region) {
            if requested != configured {
                return Err(Error::InvalidArgument(format!(
                    "requested region {requested} conflicts with configured region {configured}"
                )));
            }
        }

        // The default region is expressed by an empty body.
        let body = if target_region == crate::config::DEFAULT_REGION {
            Bytes::new()
        } else {
            Bytes::from(skiff_xml::build_location_constraint_xml(&target_region))
        };

        let descriptor = RequestDescriptor::new(Method::PUT, Some(bucket), None)
            .region(&target_region)
            .force_path_style();
        self.execute(descriptor, body, &[StatusCode::OK]).await?;

        self.cache_region(bucket, &target_region);
        Ok(())
    }

    /// Delete an empty bucket.
    #[instrument(skip(self))]
    pub async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket)?;
        let descriptor = RequestDescriptor::new(Method::DELETE, Some(bucket), None);
        self.execute(descriptor, Bytes::new(), &[StatusCode::NO_CONTENT])
            .await?;
        self.invalidate_region(bucket);
        Ok(())
    }

    // ==================== Object Operations ====================

    /// Download an object into memory.
    #[instrument(skip(self))]
    pub async fn get_object(&self, bucket: &str, object: &str) -> Result<Bytes> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;
        let descriptor = RequestDescriptor::new(Method::GET, Some(bucket), Some(object));
        let response = self
            .execute(descriptor, Bytes::new(), &[StatusCode::OK, StatusCode::PARTIAL_CONTENT])
            .await?;
        Ok(response.bytes().await?)
    }

    /// Fetch object metadata without the content.
    #[instrument(skip(self))]
    pub async fn stat_object(&self, bucket: &str, object: &str) -> Result<ObjectStat> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;
        let descriptor = RequestDescriptor::new(Method::HEAD, Some(bucket), Some(object));
        let response = self.execute(descriptor, Bytes::new(), &[StatusCode::OK]).await?;

        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let mut metadata = HashMap::new();
        for (name, value) in headers.iter() {
            if let Some(key) = name.as_str().strip_prefix("x-amz-meta-") {
                if let Ok(v) = value.to_str() {
                    metadata.insert(key.to_string(), v.to_string());
                }
            }
        }

        Ok(ObjectStat {
            etag: etag_from_response(&response).unwrap_or_default(),
            content_type,
            content_length,
            metadata,
        })
    }

    /// Delete an object.
    #[instrument(skip(self))]
    pub async fn remove_object(&self, bucket: &str, object: &str) -> Result<()> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;
        let descriptor = RequestDescriptor::new(Method::DELETE, Some(bucket), Some(object));
        self.execute(descriptor, Bytes::new(), &[StatusCode::NO_CONTENT])
            .await?;
        Ok(())
    }

    /// Abort an incomplete multipart upload, discarding its stored parts.
    ///
    /// Never called automatically; a failed upload stays on the server until
    /// it is resumed or explicitly aborted.
    #[instrument(skip(self))]
    pub async fn abort_multipart_upload(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
    ) -> Result<()> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;
        let descriptor = RequestDescriptor::new(Method::DELETE, Some(bucket), Some(object))
            .query("uploadId", upload_id);
        self.execute(descriptor, Bytes::new(), &[StatusCode::NO_CONTENT])
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for SkiffClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkiffClient")
            .field("config", &self.config)
            .field("cached_regions", &self.region_cache.len())
            .finish_non_exhaustive()
    }
}
