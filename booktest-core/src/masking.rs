//! Sensitive data masking for reported HTTP narration.
//!
//! Header values carrying credentials are never written to a report in
//! full: long values keep their first and last four characters, short
//! ones are masked completely.

use http::header::{HeaderMap, HeaderValue};

/// Replacement for values too short to partially reveal.
const FULL_MASK: &str = "********";

/// Substrings marking a header name as sensitive (case-insensitive).
const SENSITIVE_MARKERS: &[&str] = &["auth", "token", "password", "secret", "cookie"];

/// Whether a header name refers to a credential-bearing header.
pub fn is_sensitive(name: &str) -> bool {
    let name = name.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Masks a sensitive value: first four characters, an ellipsis, and the
/// last four. Values of 8 characters or fewer are fully masked.
pub fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return FULL_MASK.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Masks sensitive header values in a HeaderMap. Non-sensitive entries
/// pass through untouched; a sensitive value that is not valid UTF-8 is
/// fully masked.
pub fn mask_headers(headers: &HeaderMap) -> HeaderMap {
    let mut masked = HeaderMap::new();

    for (name, value) in headers.iter() {
        let masked_value = if is_sensitive(name.as_str()) {
            let display = match value.to_str() {
                Ok(text) => mask_value(text),
                Err(_) => FULL_MASK.to_string(),
            };
            HeaderValue::from_str(&display).unwrap_or(HeaderValue::from_static(FULL_MASK))
        } else {
            value.clone()
        };
        masked.append(name.clone(), masked_value);
    }

    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Authorization"; "authorization")]
    #[test_case("Cookie"; "cookie")]
    #[test_case("X-Auth-Token"; "custom auth token")]
    #[test_case("X-Api-Secret"; "secret")]
    #[test_case("proxy-password"; "password")]
    fn sensitive_names_are_detected(name: &str) {
        assert!(is_sensitive(name));
    }

    #[test_case("Content-Type"; "content type")]
    #[test_case("Accept"; "accept")]
    #[test_case("X-Request-Id"; "request id")]
    fn ordinary_names_pass(name: &str) {
        assert!(!is_sensitive(name));
    }

    #[test]
    fn long_value_keeps_edges() {
        assert_eq!(mask_value("abcdefgh12345678"), "abcd...5678");
    }

    #[test]
    fn short_value_is_fully_masked() {
        assert_eq!(mask_value("short"), "********");
    }

    #[test]
    fn eight_char_value_is_fully_masked() {
        assert_eq!(mask_value("12345678"), "********");
    }

    #[test]
    fn nine_char_value_is_partially_masked() {
        assert_eq!(mask_value("123456789"), "1234...6789");
    }

    #[test]
    fn mask_headers_touches_only_sensitive_entries() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "abcdefgh12345678".parse().unwrap());
        headers.insert("x-api-secret", "short".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        let masked = mask_headers(&headers);
        assert_eq!(masked.get("authorization").unwrap(), "abcd...5678");
        assert_eq!(masked.get("x-api-secret").unwrap(), "********");
        assert_eq!(masked.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn mask_headers_preserves_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", "token=abcdefgh1234".parse().unwrap());
        headers.append("set-cookie", "theme=dark".parse().unwrap());

        let masked = mask_headers(&headers);
        let values: Vec<_> = masked.get_all("set-cookie").iter().collect();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], "toke...1234");
        assert_eq!(values[1], "them...dark");
    }

    #[test]
    fn mask_headers_empty() {
        let masked = mask_headers(&HeaderMap::new());
        assert!(masked.is_empty());
    }
}
