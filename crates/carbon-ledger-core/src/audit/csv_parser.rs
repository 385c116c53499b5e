use tracing::{debug, instrument, trace};

use super::{AuditRow, ParseError, ParseOutcome};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Positions of the three required columns within the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub sku: usize,
    pub supplier: usize,
    pub emissions: usize,
}

impl ColumnMap {
    /// Resolve required columns from header names, case-insensitively.
    ///
    /// `SKU` and `Supplier` must match exactly; the emissions column only needs
    /// to start with `emissions` so unit suffixes such as `(kg CO₂e)` are accepted.
    /// The first matching header wins.
    pub fn resolve<S: AsRef<str>>(headers: &[S]) -> Option<Self> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.as_ref().to_lowercase())
            .collect();
        let sku = normalized.iter().position(|h| h == "sku")?;
        let supplier = normalized.iter().position(|h| h == "supplier")?;
        let emissions = normalized
            .iter()
            .position(|h| h.starts_with("emissions"))?;
        Some(Self {
            sku,
            supplier,
            emissions,
        })
    }

    /// Minimum number of fields a data line needs to cover every column.
    pub fn min_width(&self) -> usize {
        self.sku.max(self.supplier).max(self.emissions) + 1
    }
}

/// Parse CSV text into validated audit rows.
///
/// Blank lines and lines too short to reach every required column are skipped.
/// An unparseable emissions value aborts the whole parse; no partial rows are returned.
#[instrument(name = "parse_csv", skip_all, fields(input_len = text.len()))]
pub fn parse(text: &str) -> ParseOutcome {
    let lines: Vec<&str> = text
        .trim_start_matches(BYTE_ORDER_MARK)
        .trim()
        .split('\n')
        .collect();
    if lines.len() < 2 {
        return Err(ParseError::MissingDataRows);
    }

    let headers = split_header(lines[0]);
    let columns = ColumnMap::resolve(&headers).ok_or(ParseError::MissingColumns)?;
    trace!(?columns, "resolved required columns");

    let mut rows = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line_number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < columns.min_width() {
            trace!(line = line_number, width = fields.len(), "skipping short row");
            continue;
        }
        let raw = fields[columns.emissions];
        let emissions = parse_emissions(raw).ok_or_else(|| ParseError::InvalidEmission {
            line: line_number,
            raw: raw.to_string(),
        })?;
        rows.push(AuditRow::new(
            fields[columns.sku],
            fields[columns.supplier],
            emissions,
        ));
    }

    if rows.is_empty() {
        return Err(ParseError::NoValidRows);
    }
    debug!(rows = rows.len(), lines = lines.len(), "parsed csv");
    Ok(rows)
}

fn split_header(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| {
            field
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        })
        .collect()
}

/// Read the longest leading decimal number, ignoring any trailing text
/// (`"2100kg"` reads as 2100, `"1.5.2"` as 1.5). Fails without a leading digit.
fn parse_emissions(raw: &str) -> Option<f64> {
    let prefix = &raw[..numeric_prefix_len(raw)?];
    prefix.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Byte length of `[+-]digits[.digits][(e|E)[+-]digits]` at the start of `raw`.
fn numeric_prefix_len(raw: &str) -> Option<usize> {
    let bytes = raw.as_bytes();
    let digits_from = |mut idx: usize| {
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        idx
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        has_digits |= frac_end > end + 1;
        end = frac_end;
    }
    if !has_digits {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    Some(end)
}
