//! Builders for the XML request bodies the client sends.

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;

use crate::types::CompletedPart;
use crate::S3_NAMESPACE;

/// Build the `CompleteMultipartUpload` request body.
///
/// The part manifest must list parts in ascending part-number order; the
/// caller is responsible for ordering.
pub fn build_complete_multipart_xml(parts: &[CompletedPart]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + parts.len() * 96);
    let mut writer = Writer::new(&mut buf);

    write_decl(&mut writer);
    writer
        .create_element("CompleteMultipartUpload")
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| {
            for part in parts {
                w.create_element("Part").write_inner_content(|w| {
                    write_text_element(w, "PartNumber", &part.part_number.to_string())?;
                    write_text_element(w, "ETag", &part.etag)?;
                    Ok(())
                })?;
            }
            Ok(())
        })
        .expect("writing to Vec cannot fail");

    buf
}

/// Build the `CreateBucketConfiguration` body carrying a location constraint.
pub fn build_location_constraint_xml(region: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(192);
    let mut writer = Writer::new(&mut buf);

    write_decl(&mut writer);
    writer
        .create_element("CreateBucketConfiguration")
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| write_text_element(w, "LocationConstraint", region))
        .expect("writing to Vec cannot fail");

    buf
}

fn write_decl<W: Write>(writer: &mut Writer<W>) {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("writing to Vec cannot fail");
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    text: &str,
) -> std::io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_complete_multipart;

    #[test]
    fn complete_manifest_lists_parts_in_given_order() {
        let parts = vec![
            CompletedPart {
                part_number: 1,
                etag: "etag1".to_string(),
            },
            CompletedPart {
                part_number: 2,
                etag: "etag2".to_string(),
            },
        ];

        let xml = String::from_utf8(build_complete_multipart_xml(&parts)).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Part><PartNumber>1</PartNumber><ETag>etag1</ETag></Part>"));
        assert!(xml.contains("<Part><PartNumber>2</PartNumber><ETag>etag2</ETag></Part>"));
        assert!(xml.find("etag1").unwrap() < xml.find("etag2").unwrap());
    }

    #[test]
    fn escapes_xml_significant_characters() {
        let parts = vec![CompletedPart {
            part_number: 1,
            etag: "a<b&c".to_string(),
        }];

        let xml = String::from_utf8(build_complete_multipart_xml(&parts)).unwrap();
        assert!(xml.contains("a&lt;b&amp;c"));
    }

    #[test]
    fn location_constraint_body() {
        let xml = String::from_utf8(build_location_constraint_xml("eu-central-1")).unwrap();
        assert!(xml.contains("<LocationConstraint>eu-central-1</LocationConstraint>"));
        assert!(xml.contains("CreateBucketConfiguration"));
    }

    #[test]
    fn built_manifest_is_not_a_complete_response() {
        // Sanity: the builder output is a request body; parsing it as a
        // completion response must be rejected.
        let xml = String::from_utf8(build_complete_multipart_xml(&[])).unwrap();
        assert!(parse_complete_multipart(&xml).is_err());
    }
}
