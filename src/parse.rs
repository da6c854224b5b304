//! Parsing of columnar tool output (`lscss`, `znetconf`).
//!
//! A layout pairs a header regex with a value regex that has the same
//! number of capture groups. The header's captured texts become the
//! column names, and each matching line becomes a [`Row`].

use std::collections::BTreeMap;

use regex::{Captures, Regex, RegexBuilder};

use crate::errors::{Code, Params, Result, S390Error};

pub type Row = BTreeMap<String, String>;

/// Read access to named columns of a parsed (possibly transformed) row
pub trait Columns {
    fn column(&self, name: &str) -> Option<String>;
}

impl Columns for Row {
    fn column(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    header: Regex,
    value: Regex,
    header_index: usize,
    value_start: usize,
}

/// Patterns are case-insensitive and multi-line
pub fn pattern(re: &str) -> Result<Regex> {
    RegexBuilder::new(re)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|err| S390Error::ParseFailed {
            code: Code::BadPattern,
            params: Params::from([("pattern", re.to_string()), ("err", err.to_string())]),
        })
}

impl Layout {
    /// Header on line 0, values from line 2 (line 1 is the ruler)
    pub fn new(header: &str, value: &str) -> Result<Self> {
        Ok(Self {
            header: pattern(header)?,
            value: pattern(value)?,
            header_index: 0,
            value_start: 2,
        })
    }

    pub fn at(mut self, header_index: usize, value_start: usize) -> Self {
        self.header_index = header_index;
        self.value_start = value_start;
        self
    }
}

fn header_not_found(header: &Regex) -> S390Error {
    S390Error::ParseFailed {
        code: Code::HeaderNotFound,
        params: Params::from([("header", header.as_str().to_string())]),
    }
}

/// Pairs header captures with value captures. Returns `None` when the
/// value line is the header itself or the group counts differ.
fn zip_row(header: &Captures, value: &Captures) -> Option<Row> {
    if header.get(0)?.as_str() == value.get(0)?.as_str() {
        return None;
    }

    if header.len() != value.len() {
        return None;
    }

    let row = header
        .iter()
        .zip(value.iter())
        .skip(1)
        .map(|(h, v)| {
            let h = h.map_or("", |m| m.as_str());
            let v = v.map_or("", |m| m.as_str());
            (h.to_string(), v.to_string())
        })
        .collect();

    Some(row)
}

/// First row of `output` matching `value`, keyed by the texts captured
/// by `header`. Empty when no value row matches.
pub fn get_row_data(output: &str, header: &Regex, value: &Regex) -> Result<Row> {
    let header_caps = header
        .captures(output)
        .ok_or_else(|| header_not_found(header))?;

    let row = value
        .captures(output)
        .and_then(|value_caps| zip_row(&header_caps, &value_caps));

    Ok(row.unwrap_or_default())
}

/// Every row from the layout's value start, in output order
pub fn get_rows_info(output: &str, layout: &Layout) -> Result<Vec<Row>> {
    let lines: Vec<&str> = output.trim().lines().collect();
    if layout.header_index >= lines.len() || layout.value_start >= lines.len() {
        return Ok(Vec::new());
    }

    let header_caps = layout
        .header
        .captures(lines[layout.header_index])
        .ok_or_else(|| header_not_found(&layout.header))?;

    let rows = lines[layout.value_start..]
        .iter()
        .filter_map(|line| layout.value.captures(line))
        .filter_map(|value_caps| zip_row(&header_caps, &value_caps))
        .collect();

    Ok(rows)
}

/// Like [`get_rows_info`] but transformed and keyed by `unique_col`.
/// The key is taken from the raw row, falling back to the transformed
/// record when the raw row lacks it. Rows with no key are dropped.
pub fn get_rows_keyed<T, F>(
    output: &str,
    layout: &Layout,
    unique_col: &str,
    transform: F,
) -> Result<BTreeMap<String, T>>
where
    T: Columns,
    F: Fn(&Row) -> Result<T>,
{
    let mut keyed = BTreeMap::new();

    for row in get_rows_info(output, layout)? {
        let record = transform(&row)?;
        let key = row.column(unique_col).or_else(|| record.column(unique_col));

        if let Some(key) = key {
            keyed.insert(key, record);
        }
    }

    Ok(keyed)
}
