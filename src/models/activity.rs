use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

/// One "user opened a digest" event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ViewEntry {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub username: String,
    pub resource_name: String,
}

impl ViewEntry {
    /// Builds an entry at whole-second precision, which is all the table keeps.
    #[must_use]
    pub fn new(username: &str, resource_name: &str, when: NaiveDateTime) -> Self {
        let time = when.time().with_nanosecond(0).unwrap_or_else(|| when.time());
        Self {
            date: when.date(),
            time,
            username: username.to_string(),
            resource_name: resource_name.to_string(),
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_subsecond_precision() {
        let when = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_milli_opt(8, 30, 12, 750)
            .unwrap();
        let entry = ViewEntry::new("bob", "rassegna_2025.01.01.pdf", when);
        assert_eq!(entry.time, NaiveTime::from_hms_opt(8, 30, 12).unwrap());
        assert_eq!(entry.timestamp().date(), when.date());
    }
}
