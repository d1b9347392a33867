//! SigV4 signature computation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::encode::canonical_query_string;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const TERMINATOR: &str = "aws4_request";

type HmacSha256 = Hmac<Sha256>;

/// Everything the signer needs to produce an `Authorization` header value.
///
/// `headers` must contain every header participating in the signature, with
/// lowercase names; the S3 protocol requires at least `host`, `x-amz-date`,
/// and `x-amz-content-sha256` to be present.
#[derive(Debug)]
pub struct SigningContext<'a> {
    /// HTTP method, uppercase.
    pub method: &'a str,
    /// Request path, percent-encoded exactly as it appears on the wire.
    pub path: &'a str,
    /// Query parameters, unencoded.
    pub query: &'a [(String, String)],
    /// Headers to sign, lowercase names.
    pub headers: &'a BTreeMap<String, String>,
    /// Hex SHA-256 of the payload, or a sentinel such as `UNSIGNED-PAYLOAD`.
    pub content_sha256: &'a str,
    /// Request timestamp; also drives the credential scope date.
    pub timestamp: DateTime<Utc>,
    /// Region of the credential scope.
    pub region: &'a str,
    /// Access key id.
    pub access_key: &'a str,
    /// Secret access key.
    pub secret_key: &'a str,
}

/// Compute the SigV4 `Authorization` header value for a request.
pub fn sign_v4(ctx: &SigningContext<'_>) -> String {
    let scope = format!(
        "{}/{}/{SERVICE}/{TERMINATOR}",
        scope_date(ctx.timestamp),
        ctx.region
    );

    let signed_headers = ctx
        .headers
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = build_canonical_request(ctx, &signed_headers);
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        amz_date(ctx.timestamp),
        sha256_hex(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        ctx.secret_key,
        &scope_date(ctx.timestamp),
        ctx.region,
        SERVICE,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        ctx.access_key
    )
}

/// Request timestamp in the `YYYYMMDD'T'HHMMSS'Z'` form used by `x-amz-date`.
pub fn amz_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Date component of the credential scope, `YYYYMMDD`.
pub fn scope_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d").to_string()
}

/// Hex-encoded SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn build_canonical_request(ctx: &SigningContext<'_>, signed_headers: &str) -> String {
    let canonical_headers: String = ctx
        .headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();

    // The path arrives already encoded; encoding it again would corrupt
    // any existing %XX escapes.
    format!(
        "{}\n{}\n{}\n{canonical_headers}\n{signed_headers}\n{}",
        ctx.method,
        ctx.path,
        canonical_query_string(ctx.query),
        ctx.content_sha256
    )
}

/// Derive the signing key via the HMAC-SHA256 chain:
///
/// ```text
/// DateKey              = HMAC("AWS4" + secret, date)
/// DateRegionKey        = HMAC(DateKey, region)
/// DateRegionServiceKey = HMAC(DateRegionKey, service)
/// SigningKey           = HMAC(DateRegionServiceKey, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let date_key = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let region_key = hmac_sha256(&date_key, region.as_bytes());
    let service_key = hmac_sha256(&region_key, service.as_bytes());
    hmac_sha256(&service_key, TERMINATOR.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context<'a>(
        headers: &'a BTreeMap<String, String>,
        query: &'a [(String, String)],
        region: &'a str,
    ) -> SigningContext<'a> {
        SigningContext {
            method: "GET",
            path: "/bucket/object",
            query,
            headers,
            content_sha256: crate::EMPTY_PAYLOAD_SHA256,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            region,
            access_key: "AKIDEXAMPLE",
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
        }
    }

    fn base_headers() -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), "s3.example.com".to_string());
        headers.insert("x-amz-date".to_string(), "20240501T120000Z".to_string());
        headers.insert(
            "x-amz-content-sha256".to_string(),
            crate::EMPTY_PAYLOAD_SHA256.to_string(),
        );
        headers
    }

    #[test]
    fn signing_key_derivation_matches_reference_vector() {
        // Reference vector from the AWS signature documentation.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn authorization_header_shape() {
        let headers = base_headers();
        let auth = sign_v4(&context(&headers, &[], "us-east-1"));

        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));

        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signing_is_deterministic() {
        let headers = base_headers();
        let query = vec![("uploads".to_string(), String::new())];
        let a = sign_v4(&context(&headers, &query, "us-east-1"));
        let b = sign_v4(&context(&headers, &query, "us-east-1"));
        assert_eq!(a, b);
    }

    #[test]
    fn signature_depends_on_region() {
        let headers = base_headers();
        let a = sign_v4(&context(&headers, &[], "us-east-1"));
        let b = sign_v4(&context(&headers, &[], "eu-west-1"));
        assert_ne!(a, b);
    }

    #[test]
    fn signature_depends_on_content_hash() {
        let headers = base_headers();
        let mut ctx = context(&headers, &[], "us-east-1");
        let a = sign_v4(&ctx);
        ctx.content_sha256 = crate::UNSIGNED_PAYLOAD;
        let b = sign_v4(&ctx);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_payload_constant_is_sha256_of_nothing() {
        assert_eq!(sha256_hex(b""), crate::EMPTY_PAYLOAD_SHA256);
    }
}
