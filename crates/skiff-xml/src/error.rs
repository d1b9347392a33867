//! Codec error types

use thiserror::Error;

/// Errors raised while encoding or decoding S3 XML documents.
#[derive(Error, Debug)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// A required element is absent from the document.
    #[error("missing XML element: {0}")]
    MissingElement(String),

    /// The document structure does not match the expected response shape.
    #[error("unexpected XML content: {0}")]
    Unexpected(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(err: quick_xml::Error) -> Self {
        XmlError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for XmlError {
    fn from(err: std::io::Error) -> Self {
        XmlError::Parse(err.to_string())
    }
}
