//! # skiff-signer
//!
//! AWS Signature Version 4 request signing, as consumed by the
//! `skiff-client` crate.
//!
//! This crate produces the `Authorization` header value for an S3 request:
//!
//! 1. Build the canonical request from method, path, query string, and the
//!    headers participating in the signature.
//! 2. Build the string to sign from the timestamp, credential scope, and the
//!    canonical request hash.
//! 3. Derive the signing key via the HMAC-SHA256 chain over secret key,
//!    date, region, and service.
//! 4. Compute the final signature and assemble the header value.
//!
//! The main entry point is [`sign_v4`]. Encoding helpers used both for
//! signing and for building request URLs live in [`encode`].

mod encode;
mod sigv4;

pub use encode::{canonical_query_string, uri_encode};
pub use sigv4::{amz_date, scope_date, sha256_hex, sign_v4, SigningContext};

/// Sentinel content hash for payloads excluded from the signature.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Hex SHA-256 of the empty payload.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
