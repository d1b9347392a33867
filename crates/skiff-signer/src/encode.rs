//! Percent-encoding rules shared by URL building and canonicalization.
//!
//! SigV4 uses a stricter encoding than generic URL encoding: only unreserved
//! characters (`A-Z a-z 0-9 - _ . ~`) pass through, everything else becomes
//! uppercase `%XX` escapes over the UTF-8 bytes. Path segments keep `/`
//! unencoded; query keys and values do not.

/// Percent-encode a string per the SigV4 canonicalization rules.
///
/// `encode_slash` controls whether `/` is escaped; pass `false` when
/// encoding a path so segment separators survive.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            b'/' if !encode_slash => out.push('/'),
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Build the canonical query string: pairs sorted by encoded key then
/// encoded value, joined with `&`.
pub fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreserved_characters_pass_through() {
        assert_eq!(uri_encode("AZaz09-_.~", true), "AZaz09-_.~");
    }

    #[test]
    fn slash_handling_depends_on_mode() {
        assert_eq!(uri_encode("a/b", false), "a/b");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
    }

    #[test]
    fn non_ascii_is_utf8_percent_encoded() {
        assert_eq!(uri_encode("é", true), "%C3%A9");
        assert_eq!(uri_encode("a b", true), "a%20b");
        assert_eq!(uri_encode("a+b", true), "a%2Bb");
    }

    #[test]
    fn query_pairs_are_sorted() {
        let query = vec![
            ("uploadId".to_string(), "abc".to_string()),
            ("partNumber".to_string(), "3".to_string()),
        ];
        assert_eq!(canonical_query_string(&query), "partNumber=3&uploadId=abc");
    }

    #[test]
    fn empty_values_keep_their_equals_sign() {
        let query = vec![("uploads".to_string(), String::new())];
        assert_eq!(canonical_query_string(&query), "uploads=");
    }
}
