//! Request construction, signing, sending, and status validation.
//!
//! Every network call in the client funnels through [`SkiffClient::execute`]:
//! it refreshes credentials, resolves the target region, computes the
//! addressing style and content hash, signs, sends, and translates
//! unexpected statuses into typed errors. The executor never retries; the
//! single corrective retry in the system lives in region resolution.

use std::collections::{BTreeMap, HashMap, HashSet};

use base64::Engine;
use bytes::Bytes;
use chrono::Utc;
use md5::{Digest as _, Md5};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, trace};

use skiff_signer::{amz_date, sha256_hex, sign_v4, uri_encode, SigningContext, UNSIGNED_PAYLOAD};
use skiff_xml::parse_error_envelope;

use crate::client::SkiffClient;
use crate::config::{Config, Scheme, DEFAULT_REGION};
use crate::credentials::Credentials;
use crate::error::{Error, Result};

/// Headers excluded from the signature.
const UNSIGNED_HEADERS: [&str; 4] = [
    "authorization",
    "content-length",
    "content-type",
    "user-agent",
];

/// A single request to be executed, built per call and discarded.
#[derive(Clone, Debug)]
pub(crate) struct RequestDescriptor {
    pub method: Method,
    pub bucket: Option<String>,
    pub object: Option<String>,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    /// Region to sign with; `None` means resolve from the bucket.
    pub region: Option<String>,
    /// Pin path-style addressing for this request regardless of config.
    pub force_path_style: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, bucket: Option<&str>, object: Option<&str>) -> Self {
        Self {
            method,
            bucket: bucket.map(str::to_string),
            object: object.map(str::to_string),
            query: Vec::new(),
            headers: HashMap::new(),
            region: None,
            force_path_style: false,
        }
    }

    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn force_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }
}

impl SkiffClient {
    /// Execute a request, resolving the target region first if the
    /// descriptor does not carry one.
    pub(crate) async fn execute(
        &self,
        descriptor: RequestDescriptor,
        body: Bytes,
        expect: &[StatusCode],
    ) -> Result<Response> {
        let region = match &descriptor.region {
            Some(region) => region.clone(),
            None => match &descriptor.bucket {
                Some(bucket) => self.resolve_region(bucket).await?,
                None => self
                    .config()
                    .region
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            },
        };
        self.execute_in_region(descriptor, body, expect, &region).await
    }

    /// Execute a request against a known region. This is the full
    /// build-sign-send-validate pipeline; region resolution calls it
    /// directly to avoid resolving recursively.
    pub(crate) async fn execute_in_region(
        &self,
        descriptor: RequestDescriptor,
        body: Bytes,
        expect: &[StatusCode],
        region: &str,
    ) -> Result<Response> {
        let config = self.config();
        let credentials = self.refresh_credentials().await?;

        let (host, path) = request_target(config, &descriptor, region);
        let payload_signed = credentials.is_some() && config.scheme == Scheme::Http;
        let content_sha256 = content_hash_value(config, credentials.as_ref(), &body);

        let now = Utc::now();
        let mut extra_headers = descriptor.headers.clone();

        // When the payload is not covered by the signature's SHA-256, cover
        // it with Content-MD5 instead.
        if !payload_signed
            && !body.is_empty()
            && matches!(descriptor.method, Method::PUT | Method::POST)
        {
            let digest = Md5::digest(&body);
            extra_headers.insert(
                "Content-MD5".to_string(),
                base64::engine::general_purpose::STANDARD.encode(digest),
            );
        }

        let mut signed_headers: BTreeMap<String, String> = BTreeMap::new();
        signed_headers.insert("host".to_string(), config.host_header(&host));
        signed_headers.insert("x-amz-date".to_string(), amz_date(now));
        if let Some(sha) = &content_sha256 {
            signed_headers.insert("x-amz-content-sha256".to_string(), sha.clone());
        }
        if let Some(token) = credentials.as_ref().and_then(|c| c.session_token.as_ref()) {
            signed_headers.insert("x-amz-security-token".to_string(), token.clone());
        }
        for (name, value) in &extra_headers {
            let lower = name.to_ascii_lowercase();
            if !UNSIGNED_HEADERS.contains(&lower.as_str()) {
                signed_headers.insert(lower, value.clone());
            }
        }

        let authorization = credentials.as_ref().map(|creds| {
            sign_v4(&SigningContext {
                method: descriptor.method.as_str(),
                path: &path,
                query: &descriptor.query,
                headers: &signed_headers,
                content_sha256: content_sha256.as_deref().unwrap_or(UNSIGNED_PAYLOAD),
                timestamp: now,
                region,
                access_key: &creds.access_key,
                secret_key: &creds.secret_key,
            })
        });

        let url = build_url(config, &host, &path, &descriptor.query);
        debug!(method = %descriptor.method, %url, "sending request");

        let extra_names: HashSet<String> = extra_headers
            .keys()
            .map(|name| name.to_ascii_lowercase())
            .collect();

        let mut request = self.http().request(descriptor.method.clone(), &url);
        for (name, value) in &signed_headers {
            if name != "host" && !extra_names.contains(name) {
                request = request.header(name.as_str(), value);
            }
        }
        for (name, value) in &extra_headers {
            request = request.header(name.as_str(), value);
        }
        if let Some(auth) = &authorization {
            trace!(authorization = %redact_signature(auth), "signed request");
            request = request.header("Authorization", auth);
        }

        let response = request.body(body).send().await?;
        let status = response.status();

        if !expect.contains(&status) {
            // Force re-resolution on the next attempt, whatever the cause.
            if let Some(bucket) = &descriptor.bucket {
                self.invalidate_region(bucket);
            }
            let text = response.text().await.unwrap_or_default();
            let err = match parse_error_envelope(&text) {
                Ok(envelope) => Error::from_envelope(envelope, status.as_u16()),
                Err(_) => Error::from_status(status.as_u16()),
            };
            debug!(%url, status = status.as_u16(), error = %err, "request failed");
            return Err(err);
        }

        debug!(%url, status = status.as_u16(), "request succeeded");
        Ok(response)
    }
}

/// Compute the value for `x-amz-content-sha256`, or `None` for anonymous
/// requests which carry no hash header at all.
///
/// The real digest is only worth computing when the connection itself gives
/// no integrity guarantee: authenticated plain-HTTP requests. Over TLS the
/// reserved `UNSIGNED-PAYLOAD` sentinel is used instead.
fn content_hash_value(
    config: &Config,
    credentials: Option<&Credentials>,
    body: &Bytes,
) -> Option<String> {
    match credentials {
        None => None,
        Some(_) if config.scheme == Scheme::Https => Some(UNSIGNED_PAYLOAD.to_string()),
        Some(_) => Some(sha256_hex(body)),
    }
}

/// Compute the target host and path for a request.
///
/// Virtual-host style (bucket as subdomain) is used when the bucket name
/// contains no dot, the endpoint host is not an IP literal, and neither the
/// config nor the descriptor pins path style. Recognized provider roots are
/// substituted with their region-specific (or acceleration) endpoint.
pub(crate) fn request_target(
    config: &Config,
    descriptor: &RequestDescriptor,
    region: &str,
) -> (String, String) {
    let mut host = config.host.clone();

    let bucket = match &descriptor.bucket {
        Some(bucket) => bucket,
        None => return (host, "/".to_string()),
    };

    let dotless_bucket = !bucket.contains('.');

    if is_provider_root(&host) {
        host = if config.accelerate && dotless_bucket {
            "s3-accelerate.amazonaws.com".to_string()
        } else {
            format!("s3.{region}.amazonaws.com")
        };
    }

    let virtual_host = !config.path_style
        && !descriptor.force_path_style
        && dotless_bucket
        && host.parse::<std::net::IpAddr>().is_err();

    let object_path = descriptor.object.as_deref().map(|object| uri_encode(object, false));

    if virtual_host {
        let path = match object_path {
            Some(object) => format!("/{object}"),
            None => "/".to_string(),
        };
        (format!("{bucket}.{host}"), path)
    } else {
        let path = match object_path {
            Some(object) => format!("/{bucket}/{object}"),
            None => format!("/{bucket}"),
        };
        (host, path)
    }
}

/// Recognized storage-provider roots that get a region-specific endpoint
/// substituted in.
fn is_provider_root(host: &str) -> bool {
    host == "s3.amazonaws.com" || host == "s3.dualstack.amazonaws.com"
}

fn build_url(config: &Config, host: &str, path: &str, query: &[(String, String)]) -> String {
    let mut url = format!("{}://{}", config.scheme.as_str(), host);
    if config.has_custom_port() {
        url.push_str(&format!(":{}", config.port));
    }
    url.push_str(path);
    if !query.is_empty() {
        url.push('?');
        url.push_str(&skiff_signer::canonical_query_string(query));
    }
    url
}

/// Replace the signature value in an `Authorization` header with a
/// placeholder so trace records never leak it.
pub(crate) fn redact_signature(authorization: &str) -> String {
    match authorization.find("Signature=") {
        Some(idx) => format!("{}Signature=*REDACTED*", &authorization[..idx]),
        None => authorization.to_string(),
    }
}

/// Read the `ETag` response header with surrounding quotes stripped.
pub(crate) fn etag_from_response(response: &Response) -> Option<String> {
    response
        .headers()
        .get("ETag")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim_matches('"').to_string())
}

/// Read the `x-amz-version-id` response header, if any.
pub(crate) fn version_id_from_response(response: &Response) -> Option<String> {
    response
        .headers()
        .get("x-amz-version-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> Config {
        Config::new(endpoint).unwrap()
    }

    fn descriptor(bucket: Option<&str>, object: Option<&str>) -> RequestDescriptor {
        RequestDescriptor::new(Method::GET, bucket, object)
    }

    #[test]
    fn virtual_host_style_for_dotless_bucket() {
        let config = config("https://storage.example.com");
        let (host, path) =
            request_target(&config, &descriptor(Some("bucket"), Some("key")), "us-east-1");
        assert_eq!(host, "bucket.storage.example.com");
        assert_eq!(path, "/key");
    }

    #[test]
    fn path_style_for_dotted_bucket() {
        let config = config("https://storage.example.com");
        let (host, path) =
            request_target(&config, &descriptor(Some("my.bucket"), Some("key")), "us-east-1");
        assert_eq!(host, "storage.example.com");
        assert_eq!(path, "/my.bucket/key");
    }

    #[test]
    fn path_style_when_pinned_or_forced() {
        let pinned = config("https://storage.example.com").with_path_style();
        let (host, path) =
            request_target(&pinned, &descriptor(Some("bucket"), Some("key")), "us-east-1");
        assert_eq!(host, "storage.example.com");
        assert_eq!(path, "/bucket/key");

        let config = config("https://storage.example.com");
        let desc = descriptor(Some("bucket"), None).force_path_style();
        let (host, path) = request_target(&config, &desc, "us-east-1");
        assert_eq!(host, "storage.example.com");
        assert_eq!(path, "/bucket");
    }

    #[test]
    fn ip_endpoints_never_use_virtual_host_style() {
        let config = config("http://127.0.0.1:9000");
        let (host, path) =
            request_target(&config, &descriptor(Some("bucket"), Some("key")), "us-east-1");
        assert_eq!(host, "127.0.0.1");
        assert_eq!(path, "/bucket/key");
    }

    #[test]
    fn provider_root_substitutes_region_endpoint() {
        let config = config("https://s3.amazonaws.com");
        let (host, _) =
            request_target(&config, &descriptor(Some("bucket"), Some("key")), "eu-west-1");
        assert_eq!(host, "bucket.s3.eu-west-1.amazonaws.com");
    }

    #[test]
    fn provider_root_accelerate_endpoint() {
        let config = config("https://s3.amazonaws.com").with_accelerate();
        let (host, _) =
            request_target(&config, &descriptor(Some("bucket"), Some("key")), "eu-west-1");
        assert_eq!(host, "bucket.s3-accelerate.amazonaws.com");

        // Dotted buckets cannot use acceleration; they fall back to the
        // region endpoint in path style.
        let (host, path) =
            request_target(&config, &descriptor(Some("my.bucket"), Some("key")), "eu-west-1");
        assert_eq!(host, "s3.eu-west-1.amazonaws.com");
        assert_eq!(path, "/my.bucket/key");
    }

    #[test]
    fn object_keys_are_percent_encoded_but_keep_slashes() {
        let config = config("https://storage.example.com").with_path_style();
        let desc = descriptor(Some("bucket"), Some("dir/file name+x.txt"));
        let (_, path) = request_target(&config, &desc, "us-east-1");
        assert_eq!(path, "/bucket/dir/file%20name%2Bx.txt");
    }

    #[test]
    fn url_includes_custom_port_and_sorted_query() {
        let config = config("http://localhost:9000");
        let query = vec![
            ("uploadId".to_string(), "u1".to_string()),
            ("partNumber".to_string(), "2".to_string()),
        ];
        let url = build_url(&config, "localhost", "/bucket/key", &query);
        assert_eq!(url, "http://localhost:9000/bucket/key?partNumber=2&uploadId=u1");
    }

    #[test]
    fn content_hash_policy() {
        let creds = Credentials::new("ak", "sk");
        let body = Bytes::from_static(b"payload");

        let plain = config("http://localhost:9000");
        assert_eq!(
            content_hash_value(&plain, Some(&creds), &body).unwrap(),
            sha256_hex(b"payload")
        );

        let tls = config("https://storage.example.com");
        assert_eq!(
            content_hash_value(&tls, Some(&creds), &body).as_deref(),
            Some(UNSIGNED_PAYLOAD)
        );

        assert!(content_hash_value(&plain, None, &body).is_none());
    }

    #[test]
    fn signature_is_redacted_in_traces() {
        let auth = "AWS4-HMAC-SHA256 Credential=AKID/20240501/us-east-1/s3/aws4_request, \
                    SignedHeaders=host, Signature=deadbeef";
        let redacted = redact_signature(auth);
        assert!(redacted.ends_with("Signature=*REDACTED*"));
        assert!(!redacted.contains("deadbeef"));
        assert!(redacted.contains("Credential=AKID"));
    }
}
