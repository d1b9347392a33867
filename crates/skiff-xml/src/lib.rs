//! # skiff-xml
//!
//! XML codec for the S3-compatible wire protocol, as consumed by the
//! `skiff-client` crate.
//!
//! The S3 REST API exchanges request and response bodies as XML documents
//! following the `http://s3.amazonaws.com/doc/2006-03-01/` namespace. This
//! crate provides:
//!
//! - Typed parsers for the responses the client core needs
//!   ([`parse_bucket_region`], [`parse_initiate_multipart`],
//!   [`parse_list_multipart_uploads`], [`parse_list_parts`],
//!   [`parse_complete_multipart`], [`parse_error_envelope`]), each returning
//!   a typed struct or an [`XmlError`].
//! - Builders for the request bodies the client sends
//!   ([`build_complete_multipart_xml`], [`build_location_constraint_xml`]).
//!
//! Parsing is event-driven via `quick-xml`; unknown elements are skipped so
//! that servers may extend responses without breaking the client.

mod build;
mod error;
mod parse;
mod types;

pub use build::{build_complete_multipart_xml, build_location_constraint_xml};
pub use error::XmlError;
pub use parse::{
    parse_bucket_region, parse_complete_multipart, parse_error_envelope,
    parse_initiate_multipart, parse_list_multipart_uploads, parse_list_parts,
};
pub use types::{
    CompleteMultipartResult, CompleteOutcome, CompletedPart, ErrorEnvelope,
    InitiateMultipartResult, ListMultipartUploadsPage, ListPartsPage, MultipartUploadEntry,
    PartEntry,
};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";
