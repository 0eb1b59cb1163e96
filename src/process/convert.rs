use std::fmt;

use thiserror::Error;

/// The typed fields of an observation that are parsed from text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Latitude,
    Longitude,
    ObservedOn,
    Value,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::ObservedOn => "observedOn",
            Field::Value => "value",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field that could not be parsed and was replaced by its default.
///
/// `row` and `column` index into the fetched document, header included.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("row {row} column {column}: cannot parse {field} from {raw:?}")]
pub struct FieldParseError {
    pub row: usize,
    pub column: usize,
    pub field: Field,
    pub raw: String,
}

/// Trimmed, finite decimal degrees.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trimmed whole-number count.
pub fn parse_count(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates() {
        assert_eq!(parse_coordinate("30.9"), Some(30.9));
        assert_eq!(parse_coordinate(" -68.2385 "), Some(-68.2385));
        assert_eq!(parse_coordinate(""), None);
        assert_eq!(parse_coordinate("NaN"), None);
        assert_eq!(parse_coordinate("inf"), None);
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count("17"), Some(17));
        assert_eq!(parse_count(" 0"), Some(0));
        assert_eq!(parse_count("1.0"), None);
        assert_eq!(parse_count(""), None);
    }

    #[test]
    fn error_message_names_the_field() {
        let err = FieldParseError {
            row: 3,
            column: 2,
            field: Field::Latitude,
            raw: "n/a".into(),
        };
        assert_eq!(
            err.to_string(),
            r#"row 3 column 2: cannot parse latitude from "n/a""#
        );
    }
}
