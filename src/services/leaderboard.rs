//! Rolling daily, weekly and monthly score tables.
//!
//! Every scoring event lands in three rows at once, one per period type,
//! keyed by the window that contains "now" in the reference time zone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::db::operations::ranking::{self, RankingRow};
use crate::db::DatabaseProxy;
use crate::services::models::{Level, UnknownVariant};
use crate::services::{EngineError, EngineResult};

pub const POINTS_PER_CORRECT_ANSWER: i64 = 1;
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub const ALL: [PeriodType; 3] = [PeriodType::Daily, PeriodType::Weekly, PeriodType::Monthly];

    pub const fn as_str(self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }
}

impl FromStr for PeriodType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PeriodType::ALL
            .into_iter()
            .find(|p| p.as_str() == value.trim().to_ascii_lowercase())
            .ok_or_else(|| UnknownVariant {
                kind: "period type",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock bounds of one period in the reference zone, both inclusive,
/// the end at 23:59:59 of the last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodWindow {
    pub period_type: PeriodType,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl PeriodWindow {
    pub fn containing(period_type: PeriodType, now: DateTime<Utc>, zone: FixedOffset) -> Self {
        let today = now.with_timezone(&zone).date_naive();
        let (first, last) = match period_type {
            PeriodType::Daily => (today, today),
            PeriodType::Weekly => {
                let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(6))
            }
            PeriodType::Monthly => {
                let first = first_of_month(today);
                let next_first = first_of_month(first + Duration::days(32));
                (first, next_first - Duration::days(1))
            }
        };

        Self {
            period_type,
            start: first.and_time(NaiveTime::MIN),
            end: (last + Duration::days(1)).and_time(NaiveTime::MIN) - Duration::seconds(1),
        }
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub level: Level,
    pub score: i64,
    pub rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardOverview {
    pub daily: Vec<LeaderboardEntry>,
    pub weekly: Vec<LeaderboardEntry>,
    pub monthly: Vec<LeaderboardEntry>,
}

/// Standard competition ranking over scores sorted best first:
/// `[50, 50, 30]` ranks as `[1, 1, 3]`.
pub fn competition_ranks(scores: &[i64]) -> Vec<i64> {
    let mut ranks = Vec::with_capacity(scores.len());
    for (position, score) in scores.iter().enumerate() {
        let rank = match (position, ranks.last()) {
            (p, Some(&previous_rank)) if scores[p - 1] == *score => previous_rank,
            (p, _) => p as i64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

pub async fn award_points(
    proxy: &DatabaseProxy,
    zone: FixedOffset,
    user_id: i64,
    amount: i64,
) -> EngineResult<()> {
    let mut tx = proxy.pool().begin().await?;
    award_points_in(&mut tx, zone, user_id, amount, Utc::now()).await?;
    tx.commit().await?;
    Ok(())
}

pub(crate) async fn award_points_in(
    conn: &mut SqliteConnection,
    zone: FixedOffset,
    user_id: i64,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    for period_type in PeriodType::ALL {
        let window = PeriodWindow::containing(period_type, now, zone);
        ranking::increment_score(&mut *conn, user_id, &window, amount).await?;
    }
    tracing::debug!(user_id, amount, "ranking updated");
    Ok(())
}

pub async fn get_leaderboard(
    proxy: &DatabaseProxy,
    zone: FixedOffset,
    period_type: PeriodType,
    limit: i64,
) -> EngineResult<Vec<LeaderboardEntry>> {
    get_leaderboard_at(proxy, zone, period_type, limit, Utc::now()).await
}

pub async fn get_leaderboard_at(
    proxy: &DatabaseProxy,
    zone: FixedOffset,
    period_type: PeriodType,
    limit: i64,
    now: DateTime<Utc>,
) -> EngineResult<Vec<LeaderboardEntry>> {
    if limit <= 0 {
        return Err(EngineError::validation("limit must be positive"));
    }
    let limit = limit.min(MAX_LEADERBOARD_LIMIT);

    let window = PeriodWindow::containing(period_type, now, zone);
    // Every row scoring above a listed row is itself listed, so ranks
    // computed over the truncated list are the ranks over the whole board.
    let rows = ranking::top_scores(proxy, &window, limit).await?;
    Ok(rank_rows(rows))
}

pub async fn get_leaderboards(
    proxy: &DatabaseProxy,
    zone: FixedOffset,
    limit: i64,
) -> EngineResult<LeaderboardOverview> {
    let now = Utc::now();
    Ok(LeaderboardOverview {
        daily: get_leaderboard_at(proxy, zone, PeriodType::Daily, limit, now).await?,
        weekly: get_leaderboard_at(proxy, zone, PeriodType::Weekly, limit, now).await?,
        monthly: get_leaderboard_at(proxy, zone, PeriodType::Monthly, limit, now).await?,
    })
}

fn rank_rows(rows: Vec<RankingRow>) -> Vec<LeaderboardEntry> {
    let scores: Vec<i64> = rows.iter().map(|r| r.score).collect();
    rows.into_iter()
        .zip(competition_ranks(&scores))
        .map(|(row, rank)| LeaderboardEntry {
            user_id: row.external_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            level: row.level,
            score: row.score,
            rank,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn ties_share_rank_and_skip() {
        assert_eq!(competition_ranks(&[50, 50, 30]), vec![1, 1, 3]);
        assert_eq!(competition_ranks(&[9, 7, 7, 7, 2]), vec![1, 2, 2, 2, 5]);
        assert_eq!(competition_ranks(&[4, 4, 4]), vec![1, 1, 1]);
        assert!(competition_ranks(&[]).is_empty());
    }

    #[test]
    fn daily_window_covers_the_local_day() {
        let window = PeriodWindow::containing(PeriodType::Daily, utc(2026, 10, 21, 15, 4), FixedOffset::east_opt(0).unwrap());
        assert_eq!(window.start, naive(2026, 10, 21, 0, 0, 0));
        assert_eq!(window.end, naive(2026, 10, 21, 23, 59, 59));
    }

    #[test]
    fn weekly_window_runs_monday_to_sunday() {
        let zone = FixedOffset::east_opt(0).unwrap();
        let thursday = PeriodWindow::containing(PeriodType::Weekly, utc(2024, 2, 29, 8, 0), zone);
        assert_eq!(thursday.start, naive(2024, 2, 26, 0, 0, 0));
        assert_eq!(thursday.end, naive(2024, 3, 3, 23, 59, 59));

        let sunday = PeriodWindow::containing(PeriodType::Weekly, utc(2026, 3, 1, 23, 0), zone);
        assert_eq!(sunday.start, naive(2026, 2, 23, 0, 0, 0));
        assert_eq!(sunday.end, naive(2026, 3, 1, 23, 59, 59));

        let monday = PeriodWindow::containing(PeriodType::Weekly, utc(2026, 10, 19, 0, 0), zone);
        assert_eq!(monday.start, naive(2026, 10, 19, 0, 0, 0));
    }

    #[test]
    fn monthly_window_spans_calendar_month() {
        let zone = FixedOffset::east_opt(0).unwrap();
        let leap = PeriodWindow::containing(PeriodType::Monthly, utc(2024, 2, 10, 12, 0), zone);
        assert_eq!(leap.start, naive(2024, 2, 1, 0, 0, 0));
        assert_eq!(leap.end, naive(2024, 2, 29, 23, 59, 59));

        let december = PeriodWindow::containing(PeriodType::Monthly, utc(2026, 12, 31, 23, 59), zone);
        assert_eq!(december.start, naive(2026, 12, 1, 0, 0, 0));
        assert_eq!(december.end, naive(2026, 12, 31, 23, 59, 59));
    }

    #[test]
    fn windows_follow_the_reference_zone() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let window = PeriodWindow::containing(PeriodType::Daily, utc(2026, 10, 18, 22, 30), tokyo);
        assert_eq!(window.start, naive(2026, 10, 19, 0, 0, 0));

        let month = PeriodWindow::containing(PeriodType::Monthly, utc(2026, 9, 30, 20, 0), tokyo);
        assert_eq!(month.start, naive(2026, 10, 1, 0, 0, 0));
    }

    #[test]
    fn period_type_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<PeriodType>().unwrap(), PeriodType::Weekly);
        assert!("yearly".parse::<PeriodType>().is_err());
    }
}
