//! Usage statistics over the activity log.
//!
//! The log is advisory: when it cannot be read the figures come back empty
//! with `data_available = false` instead of failing the request.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::models::ViewEntry;
use crate::services::auth_service::Session;
use crate::stats::{self, TimeBand};
use crate::store::ActivityLogStore;

const TOP_N: usize = 10;
/// Longest accepted window, about ten years.
pub const MAX_STATS_DAYS: u32 = 3650;
const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Administrator rights required")]
    Forbidden,

    #[error("Validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RankedCount {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekdayBands {
    pub weekday: &'static str,
    pub night: u64,
    pub morning: u64,
    pub afternoon: u64,
    pub evening: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub days: u32,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub data_available: bool,
    pub total_views: usize,
    pub unique_users: usize,
    pub top_users: Vec<RankedCount>,
    pub top_resources: Vec<RankedCount>,
    pub daily: Vec<DailyCount>,
    pub weekday_bands: Vec<WeekdayBands>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentActivity {
    pub data_available: bool,
    pub total: usize,
    pub entries: Vec<ViewEntry>,
}

pub struct StatsService {
    activity: Arc<ActivityLogStore>,
}

impl StatsService {
    #[must_use]
    pub const fn new(activity: Arc<ActivityLogStore>) -> Self {
        Self { activity }
    }

    /// Aggregates over the `days` calendar days ending today.
    pub async fn summary(&self, session: &Session, days: u32) -> Result<StatsSummary, StatsError> {
        self.summary_at(session, days, Local::now().date_naive())
            .await
    }

    pub async fn summary_at(
        &self,
        session: &Session,
        days: u32,
        today: NaiveDate,
    ) -> Result<StatsSummary, StatsError> {
        require_admin(session)?;
        if days == 0 || days > MAX_STATS_DAYS {
            return Err(StatsError::Validation(format!(
                "days must be between 1 and {MAX_STATS_DAYS}"
            )));
        }

        let (entries, data_available) = self.entries().await;
        let window = stats::within_trailing_days(&entries, today, days);
        Ok(summarize(&window, days, today, data_available))
    }

    /// Newest entries first.
    pub async fn recent(&self, session: &Session, limit: usize) -> Result<RecentActivity, StatsError> {
        require_admin(session)?;
        let (entries, data_available) = self.entries().await;

        let total = entries.len();
        let mut sorted = stats::sort_by_timestamp(&entries);
        sorted.reverse();
        sorted.truncate(limit);

        Ok(RecentActivity {
            data_available,
            total,
            entries: sorted,
        })
    }

    async fn entries(&self) -> (Vec<ViewEntry>, bool) {
        match self.activity.read_all().await {
            Ok(entries) => (entries, true),
            Err(e) => {
                warn!(error = %e, "Activity log unavailable, reporting no data");
                (Vec::new(), false)
            }
        }
    }
}

const fn require_admin(session: &Session) -> Result<(), StatsError> {
    if session.is_administrator {
        Ok(())
    } else {
        Err(StatsError::Forbidden)
    }
}

fn ranked(counts: &std::collections::HashMap<String, u64>) -> Vec<RankedCount> {
    stats::top_n(counts, TOP_N)
        .into_iter()
        .map(|(key, count)| RankedCount { key, count })
        .collect()
}

fn summarize(window: &[ViewEntry], days: u32, today: NaiveDate, data_available: bool) -> StatsSummary {
    let from = stats::window_start(today, days).unwrap_or(today);

    let daily = stats::daily_counts(window)
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect();

    let weekday_bands = stats::weekday_band_matrix(window)
        .iter()
        .zip(WEEKDAYS)
        .map(|(row, weekday)| WeekdayBands {
            weekday,
            night: row[TimeBand::Night.index()],
            morning: row[TimeBand::Morning.index()],
            afternoon: row[TimeBand::Afternoon.index()],
            evening: row[TimeBand::Evening.index()],
        })
        .collect();

    StatsSummary {
        days,
        from,
        to: today,
        data_available,
        total_views: window.len(),
        unique_users: stats::unique_users(window).len(),
        top_users: ranked(&stats::count_by_user(window)),
        top_resources: ranked(&stats::count_by_resource(window)),
        daily,
        weekday_bands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobRepository;
    use chrono::Duration;

    fn admin() -> Session {
        Session::new("admin", "admin")
    }

    fn service() -> (Arc<MemoryBlobRepository>, Arc<ActivityLogStore>, StatsService) {
        let repo = Arc::new(MemoryBlobRepository::new("test"));
        let store = Arc::new(ActivityLogStore::new(repo.clone(), "views.csv"));
        (repo, store.clone(), StatsService::new(store))
    }

    #[tokio::test]
    async fn summary_over_window() {
        let (_, store, service) = service();
        let today = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let at = |d: NaiveDate, h| d.and_hms_opt(h, 0, 0).unwrap();

        store.append("bob", "rassegna_2025.01.31.pdf", at(today, 8)).await.unwrap();
        store.append("amy", "rassegna_2025.01.31.pdf", at(today, 20)).await.unwrap();
        store
            .append("bob", "rassegna_2024.12.01.pdf", at(today - Duration::days(40), 8))
            .await
            .unwrap();

        let summary = service.summary_at(&admin(), 30, today).await.unwrap();
        assert!(summary.data_available);
        assert_eq!(summary.total_views, 2);
        assert_eq!(summary.unique_users, 2);
        assert_eq!(summary.from, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(
            summary.top_resources,
            vec![RankedCount {
                key: "rassegna_2025.01.31.pdf".to_string(),
                count: 2
            }]
        );
        // 2025-01-31 is a Friday.
        assert_eq!(summary.weekday_bands[4].morning, 1);
        assert_eq!(summary.weekday_bands[4].evening, 1);
    }

    #[tokio::test]
    async fn unreadable_log_degrades_to_no_data() {
        let (repo, _, service) = service();
        repo.set_online(false);

        let summary = service.summary(&admin(), 7).await.unwrap();
        assert!(!summary.data_available);
        assert_eq!(summary.total_views, 0);

        let recent = service.recent(&admin(), 5).await.unwrap();
        assert!(!recent.data_available);
    }

    #[tokio::test]
    async fn rejects_out_of_range_windows() {
        let (_, _, service) = service();
        let today = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();

        for days in [0, MAX_STATS_DAYS + 1, u32::MAX] {
            assert!(matches!(
                service.summary_at(&admin(), days, today).await,
                Err(StatsError::Validation(_))
            ));
        }

        let widest = service
            .summary_at(&admin(), MAX_STATS_DAYS, today)
            .await
            .unwrap();
        assert_eq!(widest.to, today);
        assert_eq!(widest.from, today - Duration::days(i64::from(MAX_STATS_DAYS) - 1));
    }

    #[tokio::test]
    async fn requires_administrator() {
        let (_, _, service) = service();
        let user = Session::new("bob", "admin");
        assert!(matches!(
            service.summary(&user, 7).await,
            Err(StatsError::Forbidden)
        ));
    }
}
