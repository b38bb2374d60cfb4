//! Comma-separated tables with a header row.
//!
//! Each persisted table has a [`Schema`]: the current column set plus any
//! older layouts it can be migrated from. A table whose header matches
//! neither, or a row whose width disagrees with its header, is rejected
//! rather than guessed at.

use std::fmt::Write as _;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table is not valid UTF-8")]
    Encoding,

    #[error("table has no header row")]
    MissingHeader,

    #[error("unrecognised header: {0}")]
    UnknownHeader(String),

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote { line: usize },

    #[error("line {line}: {reason}")]
    InvalidValue { line: usize, reason: String },
}

/// An older column layout and how to bring its rows up to date.
pub struct LegacyLayout {
    pub columns: &'static [&'static str],
    pub upgrade: fn(Vec<String>) -> Vec<String>,
}

pub struct Schema {
    pub columns: &'static [&'static str],
    pub legacy: &'static [LegacyLayout],
}

/// Rows decoded against a schema, always in the current column layout.
#[derive(Debug, Default)]
pub struct DecodedTable {
    /// `(source line number, fields)`
    pub rows: Vec<(usize, Vec<String>)>,
    /// Set when the rows were upgraded from an older layout.
    pub migrated_from: Option<&'static [&'static str]>,
}

impl Schema {
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedTable, TableError> {
        let text = std::str::from_utf8(bytes).map_err(|_| TableError::Encoding)?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut records = parse_records(text)?.into_iter();
        let (_, header) = records.next().ok_or(TableError::MissingHeader)?;
        let header: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

        let (expected, upgrade, migrated_from) = if same_columns(&header, self.columns) {
            (self.columns.len(), None, None)
        } else if let Some(layout) = self
            .legacy
            .iter()
            .find(|layout| same_columns(&header, layout.columns))
        {
            (layout.columns.len(), Some(layout.upgrade), Some(layout.columns))
        } else {
            return Err(TableError::UnknownHeader(header.join(",")));
        };

        let mut rows = Vec::new();
        for (line, fields) in records {
            if fields.len() != expected {
                return Err(TableError::FieldCount {
                    line,
                    expected,
                    found: fields.len(),
                });
            }
            let fields = match upgrade {
                Some(upgrade) => upgrade(fields),
                None => fields,
            };
            rows.push((line, fields));
        }

        Ok(DecodedTable {
            rows,
            migrated_from,
        })
    }

    /// Renders rows in the current layout, header first.
    #[must_use]
    pub fn encode<I, R>(&self, rows: I) -> Vec<u8>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[String]>,
    {
        let mut out = self.columns.join(",");
        out.push('\n');
        for row in rows {
            let line = row
                .as_ref()
                .iter()
                .map(|field| quote(field))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(out, "{line}");
        }
        out.into_bytes()
    }
}

fn same_columns(header: &[String], columns: &[&str]) -> bool {
    header.len() == columns.len() && header.iter().zip(columns).all(|(h, c)| h == c)
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Splits text into records of fields, honouring `"quoted, ""fields"""`.
/// Blank lines are skipped. Each record carries its 1-based starting line.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, TableError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                if !(fields.len() == 1 && fields[0].is_empty()) {
                    records.push((record_line, std::mem::take(&mut fields)));
                }
                fields.clear();
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::UnterminatedQuote { line: record_line });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }

    Ok(records)
}
