//! Region resolution and the per-bucket region cache.
//!
//! Buckets live in exactly one region, and every signature embeds that
//! region. The resolver keeps a process-wide cache so each bucket costs at
//! most one location query; the request executor evicts entries whenever a
//! request for the bucket fails, forcing a fresh lookup next time.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use tracing::debug;

use skiff_xml::parse_bucket_region;

use crate::client::SkiffClient;
use crate::config::DEFAULT_REGION;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;

impl SkiffClient {
    /// Resolve the region owning a bucket.
    ///
    /// An explicitly configured region wins unconditionally, then the cache.
    /// Otherwise a `GetBucketLocation` query is issued, signed with the
    /// default placeholder region. If the server rejects that signature with
    /// an `AuthorizationHeaderMalformed` error that names the right region,
    /// the query is retried once with the corrected region; this is the only
    /// automatic retry in the client.
    pub async fn get_bucket_region(&self, bucket: &str) -> Result<String> {
        if let Some(region) = &self.config().region {
            return Ok(region.clone());
        }
        if let Some(cached) = self.cached_region(bucket) {
            return Ok(cached);
        }

        let region = match self.query_bucket_region(bucket, DEFAULT_REGION).await {
            Ok(region) => region,
            Err(Error::Server {
                ref code,
                region: Some(ref corrected),
                ..
            }) if code == "AuthorizationHeaderMalformed" => {
                debug!(bucket, corrected, "retrying location query with corrected region");
                self.query_bucket_region(bucket, corrected).await?
            }
            Err(err) => return Err(err),
        };

        self.cache_region(bucket, &region);
        Ok(region)
    }

    /// Internal alias used by the executor.
    pub(crate) async fn resolve_region(&self, bucket: &str) -> Result<String> {
        self.get_bucket_region(bucket).await
    }

    async fn query_bucket_region(&self, bucket: &str, signing_region: &str) -> Result<String> {
        // Virtual-host addressing needs the very region being looked up, so
        // the location query is always path-style.
        let descriptor = RequestDescriptor::new(Method::GET, Some(bucket), None)
            .query("location", "")
            .force_path_style();

        let response = self
            .execute_in_region(descriptor, Bytes::new(), &[StatusCode::OK], signing_region)
            .await?;
        let text = response.text().await?;

        Ok(normalize_region(&parse_bucket_region(&text)?))
    }
}

/// Map the wire form of a location constraint to a usable region name.
fn normalize_region(constraint: &str) -> String {
    match constraint {
        // Buckets in the default region report an empty constraint.
        "" => DEFAULT_REGION.to_string(),
        // Legacy alias predating region-qualified constraints.
        "EU" => "eu-west-1".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_constraint_means_default_region() {
        assert_eq!(normalize_region(""), "us-east-1");
    }

    #[test]
    fn legacy_eu_alias() {
        assert_eq!(normalize_region("EU"), "eu-west-1");
    }

    #[test]
    fn explicit_regions_pass_through() {
        assert_eq!(normalize_region("ap-southeast-2"), "ap-southeast-2");
    }
}
