//! Delimited table reader shared by matrix, presence/absence and
//! metadata ingestion.
//!
//! Layout: the first row holds column identifiers (its first cell is a
//! corner label and is ignored), the first column holds row identifiers.
//! Tab or comma delimited; the delimiter is sniffed from the header line.

use csv::ReaderBuilder;
use hashbrown::HashSet;

use crate::{Error, Result};

/// A parsed table with its identifier row and column split off.
#[derive(Debug, Clone)]
pub(crate) struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

pub(crate) fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    if header.contains(&b'\t') { b'\t' } else { b',' }
}

pub(crate) fn read_table(origin: &str, bytes: &[u8]) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(bytes))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Err(format_error(origin, "table is empty")),
    };
    if header.len() < 2 {
        return Err(format_error(origin, "header row has no data columns"));
    }
    let columns: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for (line, record) in records.enumerate() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != columns.len() + 1 {
            return Err(format_error(
                origin,
                format!(
                    "row {} has {} cells, expected {}",
                    line + 2,
                    record.len(),
                    columns.len() + 1
                ),
            ));
        }
        let id = record[0].to_string();
        let cells = record.iter().skip(1).map(str::to_string).collect();
        rows.push((id, cells));
    }

    Ok(RawTable { columns, rows })
}

/// Parse a numeric cell; empty cells and `NA`/`NaN` become NaN.
pub(crate) fn parse_cell(origin: &str, row: &str, column: &str, cell: &str) -> Result<f64> {
    match cell {
        "" | "NA" | "na" | "NaN" | "nan" => Ok(f64::NAN),
        _ => cell.parse::<f64>().map_err(|_| {
            format_error(origin, format!("non-numeric value '{cell}' at ({row}, {column})"))
        }),
    }
}

pub(crate) fn ensure_unique(origin: &str, what: &str, ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(format_error(origin, format!("duplicate {what} identifier '{id}'")));
        }
    }
    Ok(())
}

pub(crate) fn format_error(origin: &str, message: impl Into<String>) -> Error {
    Error::FormatError { origin: origin.to_string(), message: message.into() }
}
