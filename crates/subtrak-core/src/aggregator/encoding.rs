//! Percent-encoding for aggregator request and response bodies
//!
//! The aggregator wraps JSON in URL encoding in both directions. Requests are
//! encoded like a URL path component (only unreserved characters and `/` kept);
//! responses are decoded form-style, where `+` means a space.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything but `A-Z a-z 0-9 - _ . ~ /`
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Percent-encode every byte outside `A-Z a-z 0-9 - _ . ~ /`
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Decode `%XX` escapes and `+` as space.
///
/// Malformed escapes are kept literally; invalid UTF-8 is replaced.
pub fn decode_form(input: &str) -> String {
    let spaced = input.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_json() {
        assert_eq!(
            encode_component(r#"{"a": "b c"}"#),
            "%7B%22a%22%3A%20%22b%20c%22%7D"
        );
        assert_eq!(encode_component("a/b-c_d.e~"), "a/b-c_d.e~");
    }

    #[test]
    fn test_encode_utf8() {
        assert_eq!(encode_component("승인"), "%EC%8A%B9%EC%9D%B8");
    }

    #[test]
    fn test_decode_form() {
        assert_eq!(decode_form("%7B%22a%22%3A+1%7D"), r#"{"a": 1}"#);
        assert_eq!(decode_form("%EC%8A%B9%EC%9D%B8"), "승인");
    }

    #[test]
    fn test_decode_keeps_malformed_escapes() {
        assert_eq!(decode_form("100%"), "100%");
        assert_eq!(decode_form("%zz"), "%zz");
        assert_eq!(decode_form("%4"), "%4");
    }

    #[test]
    fn test_decode_inverts_encode() {
        let json = r#"{"connectedId":"abc+/=","startDate":"20240101","name":"넷플릭스"}"#;
        assert_eq!(decode_form(&encode_component(json)), json);
    }
}
