//! Read-side aggregates over the activity log.
//!
//! Everything here is a pure function of a slice of entries; nothing is
//! cached. Input order is not assumed to be meaningful.

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::ViewEntry;

/// Four fixed slices of the local wall-clock day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBand {
    /// 00:00 to 05:59
    Night,
    /// 06:00 to 11:59
    Morning,
    /// 12:00 to 17:59
    Afternoon,
    /// 18:00 to 23:59
    Evening,
}

impl TimeBand {
    pub const ALL: [Self; 4] = [Self::Night, Self::Morning, Self::Afternoon, Self::Evening];

    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            0..6 => Self::Night,
            6..12 => Self::Morning,
            12..18 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

/// Rows are Monday..Sunday, columns follow [`TimeBand::ALL`].
pub type WeekdayBandMatrix = [[u64; 4]; 7];

#[must_use]
pub fn count_by_user(entries: &[ViewEntry]) -> HashMap<String, u64> {
    count_by(entries, |e| &e.username)
}

#[must_use]
pub fn count_by_resource(entries: &[ViewEntry]) -> HashMap<String, u64> {
    count_by(entries, |e| &e.resource_name)
}

fn count_by<F>(entries: &[ViewEntry], key: F) -> HashMap<String, u64>
where
    F: Fn(&ViewEntry) -> &String,
{
    let mut counts = HashMap::new();
    for entry in entries {
        *counts.entry(key(entry).clone()).or_insert(0) += 1;
    }
    counts
}

/// Highest counts first; ties broken by key so the result is deterministic.
#[must_use]
pub fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// First day of the `days`-long window ending on `today`.
///
/// `None` when `days == 0`. A window reaching past the earliest
/// representable date starts at [`NaiveDate::MIN`].
#[must_use]
pub fn window_start(today: NaiveDate, days: u32) -> Option<NaiveDate> {
    let span = days.checked_sub(1)?;
    Some(
        today
            .checked_sub_signed(Duration::days(i64::from(span)))
            .unwrap_or(NaiveDate::MIN),
    )
}

/// Entries dated within the `days` calendar days ending on `today`,
/// both ends inclusive. `days == 0` selects nothing.
#[must_use]
pub fn within_trailing_days(entries: &[ViewEntry], today: NaiveDate, days: u32) -> Vec<ViewEntry> {
    let Some(start) = window_start(today, days) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter(|e| e.date >= start && e.date <= today)
        .cloned()
        .collect()
}

/// Oldest first. Stable, so same-second entries keep their stored order.
#[must_use]
pub fn sort_by_timestamp(entries: &[ViewEntry]) -> Vec<ViewEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(ViewEntry::timestamp);
    sorted
}

#[must_use]
pub fn daily_counts(entries: &[ViewEntry]) -> BTreeMap<NaiveDate, u64> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.date).or_insert(0) += 1;
    }
    counts
}

#[must_use]
pub fn weekday_band_matrix(entries: &[ViewEntry]) -> WeekdayBandMatrix {
    let mut matrix = [[0; 4]; 7];
    for entry in entries {
        let day = entry.date.weekday().num_days_from_monday() as usize;
        let band = TimeBand::from_hour(entry.time.hour()).index();
        matrix[day][band] += 1;
    }
    matrix
}

#[must_use]
pub fn unique_users(entries: &[ViewEntry]) -> BTreeSet<String> {
    entries.iter().map(|e| e.username.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn entry(date: NaiveDate, hour: u32, user: &str, resource: &str) -> ViewEntry {
        ViewEntry {
            date,
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            username: user.to_string(),
            resource_name: resource.to_string(),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(TimeBand::from_hour(0), TimeBand::Night);
        assert_eq!(TimeBand::from_hour(5), TimeBand::Night);
        assert_eq!(TimeBand::from_hour(6), TimeBand::Morning);
        assert_eq!(TimeBand::from_hour(11), TimeBand::Morning);
        assert_eq!(TimeBand::from_hour(12), TimeBand::Afternoon);
        assert_eq!(TimeBand::from_hour(17), TimeBand::Afternoon);
        assert_eq!(TimeBand::from_hour(18), TimeBand::Evening);
        assert_eq!(TimeBand::from_hour(23), TimeBand::Evening);
    }

    #[test]
    fn thirty_day_window() {
        let today = day(2025, 3, 31);
        let entries = vec![
            entry(today, 9, "a", "x.pdf"),
            entry(today - Duration::days(29), 9, "b", "x.pdf"),
            entry(today - Duration::days(31), 9, "c", "x.pdf"),
            entry(today + Duration::days(1), 9, "d", "x.pdf"),
        ];

        let users: Vec<String> = within_trailing_days(&entries, today, 30)
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(users, vec!["a", "b"]);
        assert!(within_trailing_days(&entries, today, 0).is_empty());
    }

    #[test]
    fn huge_window_keeps_everything_up_to_today() {
        let today = day(2025, 3, 31);
        let entries = vec![
            entry(day(1970, 1, 1), 9, "old", "x.pdf"),
            entry(today, 9, "new", "x.pdf"),
            entry(today + Duration::days(1), 9, "future", "x.pdf"),
        ];

        assert_eq!(window_start(today, u32::MAX), Some(NaiveDate::MIN));
        let users: Vec<String> = within_trailing_days(&entries, today, u32::MAX)
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(users, vec!["old", "new"]);
    }

    #[test]
    fn top_resources() {
        let entries = vec![
            entry(day(2025, 1, 1), 8, "bob", "2025.01.01.pdf"),
            entry(day(2025, 1, 2), 8, "bob", "2025.01.02.pdf"),
            entry(day(2025, 1, 2), 9, "amy", "2025.01.02.pdf"),
            entry(day(2025, 1, 3), 9, "amy", "2025.01.03.pdf"),
        ];
        let top = top_n(&count_by_resource(&entries), 2);
        assert_eq!(
            top,
            vec![
                ("2025.01.02.pdf".to_string(), 2),
                ("2025.01.01.pdf".to_string(), 1)
            ]
        );
        assert_eq!(count_by_user(&entries)["amy"], 2);
        assert_eq!(unique_users(&entries).len(), 2);
    }

    #[test]
    fn matrix_and_daily_counts() {
        // 2025-01-06 is a Monday, 2025-01-12 a Sunday.
        let entries = vec![
            entry(day(2025, 1, 6), 7, "a", "x"),
            entry(day(2025, 1, 6), 19, "a", "x"),
            entry(day(2025, 1, 12), 2, "b", "x"),
        ];
        let matrix = weekday_band_matrix(&entries);
        assert_eq!(matrix[0][TimeBand::Morning.index()], 1);
        assert_eq!(matrix[0][TimeBand::Evening.index()], 1);
        assert_eq!(matrix[6][TimeBand::Night.index()], 1);
        assert_eq!(matrix.iter().flatten().sum::<u64>(), 3);

        let daily = daily_counts(&entries);
        assert_eq!(daily[&day(2025, 1, 6)], 2);
        assert_eq!(daily.len(), 2);
    }

    #[test]
    fn sorts_unordered_input() {
        let entries = vec![
            entry(day(2025, 1, 2), 8, "late", "x"),
            entry(day(2025, 1, 1), 22, "early", "x"),
        ];
        let sorted = sort_by_timestamp(&entries);
        assert_eq!(sorted[0].username, "early");
    }
}
