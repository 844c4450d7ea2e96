use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::record::{ClientAddress, ParsedFields, ResponseSize};

/// Combined access log line, anchored at both ends:
///
/// ```text
/// 203.0.113.5 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html?id=42 HTTP/1.1" 200 512
/// ```
pub const ACCESS_LOG_PATTERN: &str = concat!(
    r#"^(?P<ip>[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+|\bNULL\b)"#,
    r#" - - \[(?P<timestamp>[^\]]+)\]"#,
    r#" "(?P<method>\w+) (?P<url>\S+) HTTP/[^"]+""#,
    r#" (?P<status>[0-9]{3}) (?P<size>[0-9]+|-)$"#,
);

static ACCESS_LOG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(ACCESS_LOG_PATTERN).expect("access log pattern must compile"));

/// Line parser for the access log grammar.
///
/// A line either matches in full and yields every field, or yields nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogParser;

impl AccessLogParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a single line (without its line terminator)
    pub fn parse_line(&self, line: &str) -> Option<ParsedFields> {
        let captures = ACCESS_LOG_REGEX.captures(line)?;
        Self::fields_from_captures(&captures)
    }

    fn fields_from_captures(captures: &Captures) -> Option<ParsedFields> {
        let (path, query_parameters) = split_target(&captures["url"]);

        // Exactly three ASCII digits always fit
        let status_code = captures["status"].parse::<u16>().ok()?;
        // Any digit run parses; very long runs lose precision or become infinite
        let response_size = match &captures["size"] {
            "-" => ResponseSize::NoBody,
            digits => ResponseSize::Bytes(digits.parse::<f64>().ok()?),
        };

        Some(ParsedFields {
            client_address: ClientAddress::from_token(&captures["ip"]),
            timestamp: captures["timestamp"].to_string(),
            method: captures["method"].to_string(),
            path: path.to_string(),
            query_parameters: query_parameters.to_string(),
            status_code,
            response_size,
        })
    }
}

/// Split a request target at the first `?` into path and raw query string
pub fn split_target(target: &str) -> (&str, &str) {
    target.split_once('?').unwrap_or((target, ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"203.0.113.5 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html?id=42 HTTP/1.1" 200 512"#;

    #[test]
    fn test_pattern_compiles() {
        assert!(Regex::new(ACCESS_LOG_PATTERN).is_ok());
    }

    #[test]
    fn test_sample_line() {
        let fields = AccessLogParser::new().parse_line(SAMPLE).unwrap();
        assert_eq!(fields.client_address.as_str(), "203.0.113.5");
        assert_eq!(fields.timestamp, "10/Oct/2023:13:55:36 +0000");
        assert_eq!(fields.method, "GET");
        assert_eq!(fields.path, "/index.html");
        assert_eq!(fields.query_parameters, "id=42");
        assert_eq!(fields.status_code, 200);
        assert_eq!(fields.response_size, ResponseSize::Bytes(512.0));
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("/a"), ("/a", ""));
        assert_eq!(split_target("/a?"), ("/a", ""));
        assert_eq!(split_target("/a?x=1?y=2"), ("/a", "x=1?y=2"));
        assert_eq!(split_target("?q"), ("", "q"));
    }

    #[test]
    fn test_null_and_dash() {
        let line = r#"NULL - - [10/Oct/2023:13:55:36 +0000] "POST /api HTTP/2.0" 204 -"#;
        let fields = AccessLogParser::new().parse_line(line).unwrap();
        assert!(fields.client_address.is_missing());
        assert_eq!(fields.response_size, ResponseSize::NoBody);
        assert_eq!(fields.query_parameters, "");
    }

    #[test]
    fn test_timestamp_text_is_not_validated_here() {
        let line = r#"1.2.3.4 - - [whenever] "GET / HTTP/1.1" 200 1"#;
        let fields = AccessLogParser::new().parse_line(line).unwrap();
        assert_eq!(fields.timestamp, "whenever");
    }

    #[test]
    fn test_rejects_malformed() {
        let parser = AccessLogParser::new();
        let bad = [
            r#"- - - [bad] "BAD" -"#,
            "",
            r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 20 512"#,
            r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 2000 512"#,
            r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1 200 512"#,
            r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 512 "-" "curl/8.0""#,
            r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET /" 200 512"#,
            r#"1.2.3 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 512"#,
            r#"NULLX - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 512"#,
            r#"1.2.3.4 - - [] "GET / HTTP/1.1" 200 512"#,
            r#" 1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 512"#,
        ];
        for line in bad {
            assert!(parser.parse_line(line).is_none(), "should not match: {}", line);
        }
    }

    #[test]
    fn test_oversized_size_still_matches() {
        let line = r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 99999999999999999999999"#;
        let fields = AccessLogParser::new().parse_line(line).unwrap();
        assert_eq!(fields.response_size, ResponseSize::Bytes(1e23));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let parser = AccessLogParser::new();
        assert_eq!(parser.parse_line(SAMPLE), parser.parse_line(SAMPLE));
    }
}
