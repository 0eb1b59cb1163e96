use csv::ReaderBuilder;

use super::{FetchError, RawRow};

/// Split a comma-delimited body into rows.
///
/// Every record must carry the same number of fields as the first one; a
/// ragged record or non-UTF-8 text is reported as `MalformedDocument`.
pub fn parse_document(body: &[u8]) -> Result<Vec<RawRow>, FetchError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .delimiter(b',')
        .from_reader(body);

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| FetchError::MalformedDocument {
            record: idx,
            source,
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let body = b"Province/State,Country/Region,Lat,Long,1/22/20\n\"Bonaire, Sint Eustatius and Saba\",Netherlands,12.18,-68.23,0\n";
        let rows = parse_document(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "Bonaire, Sint Eustatius and Saba");
        assert_eq!(rows[1].len(), 5);
    }

    #[test]
    fn crlf_line_endings() {
        let rows = parse_document(b"a,b,c,d,1/22/20\r\nx,y,1,2,3\r\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][4], "3");
    }

    #[test]
    fn bare_quote_in_unquoted_field_is_kept() {
        let rows = parse_document(b"a,b,c,d,1/22/20\nx,y\"z,1,2,3\n").unwrap();
        assert_eq!(rows[1][1], "y\"z");
    }

    #[test]
    fn empty_body_has_no_rows() {
        assert!(parse_document(b"").unwrap().is_empty());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = parse_document(b"a,b,c,d,e\nx,\xff\xfe,1,2,3\n").unwrap_err();
        assert!(matches!(err, FetchError::MalformedDocument { record: 1, .. }));
    }
}
