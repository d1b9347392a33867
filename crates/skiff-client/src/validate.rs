//! Bucket and object naming rules, checked before any I/O

use crate::error::{Error, Result};

/// Validate a bucket name against the common S3 naming rules.
pub(crate) fn check_bucket_name(bucket: &str) -> Result<()> {
    let fail = |reason: &str| {
        Err(Error::InvalidBucketName {
            bucket: bucket.to_string(),
            reason: reason.to_string(),
        })
    };

    if bucket.len() < 3 || bucket.len() > 63 {
        return fail("length must be between 3 and 63 characters");
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return fail("only lowercase letters, digits, dots and hyphens are allowed");
    }
    let first = bucket.chars().next().unwrap();
    let last = bucket.chars().last().unwrap();
    if !first.is_ascii_alphanumeric() || !last.is_ascii_alphanumeric() {
        return fail("must start and end with a letter or digit");
    }
    if bucket.contains("..") || bucket.contains(".-") || bucket.contains("-.") {
        return fail("dots must not be adjacent to other separators");
    }

    Ok(())
}

/// Validate an object key.
pub(crate) fn check_object_name(object: &str) -> Result<()> {
    if object.is_empty() {
        return Err(Error::InvalidObjectName(
            "object name cannot be empty".to_string(),
        ));
    }
    if object.len() > 1024 {
        return Err(Error::InvalidObjectName(
            "object name longer than 1024 bytes".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_bucket_names() {
        for name in ["abc", "my-bucket", "my.bucket.2024", "0numeric0"] {
            assert!(check_bucket_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_bucket_names() {
        for name in [
            "ab",
            "UPPER",
            "under_score",
            "-leading",
            "trailing-",
            "double..dot",
            ".leading-dot",
            &"x".repeat(64),
        ] {
            assert!(check_bucket_name(name).is_err(), "{name} should be invalid");
        }
    }

    #[test]
    fn object_names_must_be_non_empty_and_bounded() {
        assert!(check_object_name("a/b/c.txt").is_ok());
        assert!(check_object_name("").is_err());
        assert!(check_object_name(&"k".repeat(1025)).is_err());
    }
}
