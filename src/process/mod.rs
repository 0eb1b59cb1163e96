// src/process/mod.rs
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fetch::RawRow;

pub mod convert;
pub mod date_parser;

pub use convert::{Field, FieldParseError};

/// Columns 0..4 are sub-region, region, latitude, longitude; dates start here.
pub const FIRST_DATE_COLUMN: usize = 4;

const SUB_REGION_COLUMN: usize = 0;
const REGION_COLUMN: usize = 1;
const LATITUDE_COLUMN: usize = 2;
const LONGITUDE_COLUMN: usize = 3;

/// One (region, date) pair from the wide table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub sub_region: String,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub observed_on: NaiveDate,
    pub value: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("document has {rows} row(s); need a header and at least one data row")]
    EmptyInput { rows: usize },
}

/// Reshape output plus every field that fell back to its default.
#[derive(Debug, Default)]
pub struct Reshaped {
    pub observations: Vec<Observation>,
    pub field_errors: Vec<FieldParseError>,
}

/// Stand-in for a date label that does not parse.
pub fn unparsed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default()
}

/// Turn the wide table into one `Observation` per (data row, date column).
///
/// Unparsable fields are defaulted and summarised in the log; use
/// [`reshape_with_diagnostics`] to inspect them.
pub fn reshape(rows: &[RawRow]) -> Result<Vec<Observation>, TransformError> {
    let Reshaped {
        observations,
        field_errors,
    } = reshape_with_diagnostics(rows)?;

    if !field_errors.is_empty() {
        let mut per_field = [0usize; 4];
        for e in &field_errors {
            per_field[e.field as usize] += 1;
        }
        warn!(
            defaulted = field_errors.len(),
            latitude = per_field[Field::Latitude as usize],
            longitude = per_field[Field::Longitude as usize],
            observed_on = per_field[Field::ObservedOn as usize],
            value = per_field[Field::Value as usize],
            first = %field_errors[0],
            "fields defaulted during reshape"
        );
    }
    Ok(observations)
}

/// Same as [`reshape`] but hands back the per-field parse failures.
#[tracing::instrument(level = "info", skip(rows), fields(rows = rows.len()))]
pub fn reshape_with_diagnostics(rows: &[RawRow]) -> Result<Reshaped, TransformError> {
    let (header, data) = match rows {
        [header, data @ ..] if !data.is_empty() => (header, data),
        _ => return Err(TransformError::EmptyInput { rows: rows.len() }),
    };

    let mut field_errors = Vec::new();

    // Header labels are parsed once and joined to data cells by column index.
    let dates: Vec<Option<NaiveDate>> = header
        .iter()
        .enumerate()
        .skip(FIRST_DATE_COLUMN)
        .map(|(column, label)| {
            let parsed = date_parser::parse_date_label(label);
            if parsed.is_none() {
                field_errors.push(FieldParseError {
                    row: 0,
                    column,
                    field: Field::ObservedOn,
                    raw: label.clone(),
                });
            }
            parsed
        })
        .collect();

    let per_row: Vec<Reshaped> = data
        .par_iter()
        .enumerate()
        .map(|(i, row)| reshape_row(i + 1, row, &dates))
        .collect();

    let total: usize = per_row.iter().map(|r| r.observations.len()).sum();
    let mut observations = Vec::with_capacity(total);
    for mut r in per_row {
        observations.append(&mut r.observations);
        field_errors.append(&mut r.field_errors);
    }

    info!(
        data_rows = data.len(),
        date_columns = dates.len(),
        observations = observations.len(),
        defaulted = field_errors.len(),
        "reshaped"
    );
    Ok(Reshaped {
        observations,
        field_errors,
    })
}

fn reshape_row(row_idx: usize, row: &RawRow, dates: &[Option<NaiveDate>]) -> Reshaped {
    let mut out = Reshaped::default();
    let cell = |column: usize| row.get(column).map(String::as_str).unwrap_or("");

    let mut coordinate = |column: usize, field: Field| {
        let raw = cell(column);
        convert::parse_coordinate(raw).unwrap_or_else(|| {
            out.field_errors.push(FieldParseError {
                row: row_idx,
                column,
                field,
                raw: raw.to_string(),
            });
            0.0
        })
    };
    let latitude = coordinate(LATITUDE_COLUMN, Field::Latitude);
    let longitude = coordinate(LONGITUDE_COLUMN, Field::Longitude);

    let sub_region = cell(SUB_REGION_COLUMN).to_string();
    let region = cell(REGION_COLUMN).to_string();

    for (column, raw) in row.iter().enumerate().skip(FIRST_DATE_COLUMN) {
        let observed_on = match dates.get(column - FIRST_DATE_COLUMN) {
            Some(Some(date)) => *date,
            // bad header label, already reported against row 0
            Some(None) => unparsed_date(),
            None => {
                out.field_errors.push(FieldParseError {
                    row: row_idx,
                    column,
                    field: Field::ObservedOn,
                    raw: String::new(),
                });
                unparsed_date()
            }
        };

        let value = convert::parse_count(raw).unwrap_or_else(|| {
            out.field_errors.push(FieldParseError {
                row: row_idx,
                column,
                field: Field::Value,
                raw: raw.clone(),
            });
            0
        });

        out.observations.push(Observation {
            sub_region: sub_region.clone(),
            region: region.clone(),
            latitude,
            longitude,
            observed_on,
            value,
        });
    }

    if !out.field_errors.is_empty() {
        debug!(row = row_idx, region = %region, defaulted = out.field_errors.len(), "row had unparsable fields");
    }
    out
}
