use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};
use std::fmt;

/// Column names of the row set, in output order
pub const COLUMNS: [&str; 7] = [
    "ip",
    "timestamp",
    "method",
    "url",
    "status",
    "size",
    "query_parameters",
];

/// Layout of the bracketed timestamp, e.g. `10/Oct/2023:13:55:36 +0000`
pub const TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Client address as it appears at the start of a log line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientAddress {
    /// Dotted-quad literal. Octets are not range-checked.
    Dotted(String),
    /// The literal `NULL` marker
    Missing,
}

impl ClientAddress {
    pub fn from_token(token: &str) -> Self {
        if token == "NULL" {
            ClientAddress::Missing
        } else {
            ClientAddress::Dotted(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClientAddress::Dotted(addr) => addr,
            ClientAddress::Missing => "NULL",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ClientAddress::Missing)
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClientAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Response size field before coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseSize {
    Bytes(f64),
    /// The `-` marker (no body sent)
    NoBody,
}

impl ResponseSize {
    /// Missing sizes count as zero bytes
    pub fn bytes(&self) -> f64 {
        match self {
            ResponseSize::Bytes(n) => *n,
            ResponseSize::NoBody => 0.0,
        }
    }
}

/// Fields extracted from one matching line, timestamp still as text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFields {
    pub client_address: ClientAddress,
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub query_parameters: String,
    pub status_code: u16,
    pub response_size: ResponseSize,
}

/// One row of the row set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRecord {
    pub ip: ClientAddress,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub url: String,
    pub status: u16,
    /// Byte count as a floating value, `-` coerced to `0.0`
    pub size: f64,
    pub query_parameters: String,
}

impl AccessRecord {
    /// Coerce parsed fields into a typed row. Fails only on the timestamp.
    pub fn from_fields(fields: ParsedFields) -> Result<Self, chrono::ParseError> {
        let timestamp = parse_timestamp(&fields.timestamp)?;
        Ok(AccessRecord {
            ip: fields.client_address,
            timestamp,
            method: fields.method,
            url: fields.path,
            status: fields.status_code,
            size: fields.response_size.bytes(),
            query_parameters: fields.query_parameters,
        })
    }

    /// Render one column as text, as it appears in CSV/TSV output
    pub fn column_text(&self, column: &str) -> Option<String> {
        match column {
            "ip" => Some(self.ip.to_string()),
            "timestamp" => Some(self.timestamp.to_rfc3339()),
            "method" => Some(self.method.clone()),
            "url" => Some(self.url.clone()),
            "status" => Some(self.status.to_string()),
            // Always carries a fractional part, e.g. `512.0`
            "size" => Some(format!("{:?}", self.size)),
            "query_parameters" => Some(self.query_parameters.clone()),
            _ => None,
        }
    }

    /// Render one column as a JSON value
    pub fn column_value(&self, column: &str) -> Option<serde_json::Value> {
        match column {
            "status" => Some(serde_json::Value::from(self.status)),
            "size" => Some(serde_json::Value::from(self.size)),
            other => self.column_text(other).map(serde_json::Value::String),
        }
    }
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(text, TIMESTAMP_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(timestamp: &str, size: ResponseSize) -> ParsedFields {
        ParsedFields {
            client_address: ClientAddress::from_token("10.0.0.1"),
            timestamp: timestamp.to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            query_parameters: String::new(),
            status_code: 200,
            response_size: size,
        }
    }

    #[test]
    fn test_null_address_marker() {
        assert!(ClientAddress::from_token("NULL").is_missing());
        assert_eq!(ClientAddress::Missing.to_string(), "NULL");
        assert_eq!(ClientAddress::from_token("1.2.3.4").as_str(), "1.2.3.4");
    }

    #[test]
    fn test_no_body_coerces_to_zero() {
        let record =
            AccessRecord::from_fields(fields("10/Oct/2023:13:55:36 +0000", ResponseSize::NoBody))
                .unwrap();
        assert_eq!(record.size, 0.0);
    }

    #[test]
    fn test_timestamp_keeps_offset() {
        let record = AccessRecord::from_fields(fields(
            "01/Jan/2024:23:59:59 -0700",
            ResponseSize::Bytes(10.0),
        ))
        .unwrap();
        assert_eq!(record.timestamp.to_rfc3339(), "2024-01-01T23:59:59-07:00");
        assert_eq!(record.timestamp.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn test_bad_timestamp_is_error() {
        assert!(AccessRecord::from_fields(fields("bad", ResponseSize::NoBody)).is_err());
        assert!(
            AccessRecord::from_fields(fields("2023-10-10T13:55:36Z", ResponseSize::NoBody))
                .is_err()
        );
    }

    #[test]
    fn test_column_text_covers_all_columns() {
        let record =
            AccessRecord::from_fields(fields("10/Oct/2023:13:55:36 +0000", ResponseSize::Bytes(512.0)))
                .unwrap();
        for column in COLUMNS {
            assert!(record.column_text(column).is_some(), "missing {}", column);
        }
        assert_eq!(record.column_text("nope"), None);
        assert_eq!(record.column_text("size").as_deref(), Some("512.0"));
        assert_eq!(record.column_value("size"), Some(serde_json::json!(512.0)));
    }
}
