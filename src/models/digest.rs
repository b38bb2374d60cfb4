//! Daily press digests and their file names.
//!
//! A digest is stored as `<prefix><YYYY.MM.DD>.pdf` (for example
//! `rassegna_2025.01.31.pdf`); the date in the name is its identity.

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

const NAME_DATE_FORMAT: &str = "%Y.%m.%d";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Digest {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
}

/// Builds and recognises digest file names for one configured prefix.
#[derive(Debug, Clone)]
pub struct DigestNaming {
    prefix: String,
}

impl DigestNaming {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}{}.pdf", self.prefix, date.format(NAME_DATE_FORMAT))
    }

    /// Returns the date encoded in `name`, or `None` when it is not a digest.
    #[must_use]
    pub fn parse(&self, name: &str) -> Option<NaiveDate> {
        let rest = name.strip_prefix(&self.prefix)?;
        let caps = date_regex().captures(rest)?;
        let year = caps.name("year")?.as_str().parse().ok()?;
        let month = caps.name("month")?.as_str().parse().ok()?;
        let day = caps.name("day")?.as_str().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<year>\d{4})\.(?P<month>\d{2})\.(?P<day>\d{2})\.pdf$")
            .expect("Invalid regex pattern defined in code")
    })
}

/// Parses a date given by a user: `2025-01-31` or `2025.01.31`.
pub fn parse_user_date(input: &str) -> Result<NaiveDate, String> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, NAME_DATE_FORMAT))
        .map_err(|_| format!("Invalid date '{input}', expected YYYY-MM-DD"))
}

/// Uploaded digests must at least look like a PDF.
#[must_use]
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn formats_and_parses_names() {
        let naming = DigestNaming::new("rassegna_");
        let name = naming.file_name(date(2025, 1, 31));
        assert_eq!(name, "rassegna_2025.01.31.pdf");
        assert_eq!(naming.parse(&name), Some(date(2025, 1, 31)));
    }

    #[test]
    fn rejects_foreign_names() {
        let naming = DigestNaming::new("rassegna_");
        assert_eq!(naming.parse("users.csv"), None);
        assert_eq!(naming.parse("rassegna_2025.13.01.pdf"), None);
        assert_eq!(naming.parse("rassegna_2025.01.01.pdf.bak"), None);
        assert_eq!(naming.parse("other_2025.01.01.pdf"), None);
    }

    #[test]
    fn empty_prefix_matches_bare_dates() {
        let naming = DigestNaming::new("");
        assert_eq!(naming.parse("2025.01.01.pdf"), Some(date(2025, 1, 1)));
    }

    #[test]
    fn user_dates() {
        assert_eq!(parse_user_date("2025-02-03").unwrap(), date(2025, 2, 3));
        assert_eq!(parse_user_date("2025.02.03").unwrap(), date(2025, 2, 3));
        assert!(parse_user_date("03/02/2025").is_err());
    }

    #[test]
    fn pdf_magic() {
        assert!(looks_like_pdf(b"%PDF-1.7\n..."));
        assert!(!looks_like_pdf(b"<html>"));
    }
}
