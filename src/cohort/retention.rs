//! Retention Analysis
//!
//! 登録日時と最終ログイン日時から、登録週ごとの継続率と継続日数の分布を計算します。
//!
//! 継続日数は登録から最終ログインまでの丸一日の数です。最終ログイン日時が無い記録と、
//! 継続日数が負になる記録は対象外です。

use chrono::{Datelike, NaiveDate};
use log::debug;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{median, ratio, UserRecord};

/// 既定で集計する継続日数（D1、D7、D30）
pub const RETENTION_DAYS: [u32; 3] = [1, 7, 30];

impl UserRecord {
    /// 登録から最終ログインまでの経過日数（丸一日単位、負の値は切り下げ）
    fn retention_whole_days(&self) -> Option<i64> {
        let last = self.last_login_at?;
        Some((last - self.registered_at).num_seconds().div_euclid(86_400))
    }
}

/// `days`日以上継続したユーザーの数と割合
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionRate {
    pub days: u32,
    pub retained: usize,
    pub rate: f64,
}

/// 登録週（ISO週）ごとの継続率
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRetention {
    /// `2025-W26`形式の週ラベル
    pub week: String,
    /// 週内で最初の登録日
    pub first_registration: NaiveDate,
    /// 週内で最後の登録日
    pub last_registration: NaiveDate,
    pub registrations: usize,
    pub rates: Vec<RetentionRate>,
}

/// 継続日数の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RetentionBucket {
    #[serde(rename = "当天")]
    SameDay,
    #[serde(rename = "次日")]
    NextDay,
    #[serde(rename = "2-7天")]
    Days2To7,
    #[serde(rename = "8-30天")]
    Days8To30,
    #[serde(rename = "30天以上")]
    Over30,
}

impl RetentionBucket {
    /// 表示順
    pub const ALL: [RetentionBucket; 5] = [
        RetentionBucket::SameDay,
        RetentionBucket::NextDay,
        RetentionBucket::Days2To7,
        RetentionBucket::Days8To30,
        RetentionBucket::Over30,
    ];

    fn of(days: i64) -> Self {
        match days {
            i64::MIN..=0 => RetentionBucket::SameDay,
            1 => RetentionBucket::NextDay,
            2..=7 => RetentionBucket::Days2To7,
            8..=30 => RetentionBucket::Days8To30,
            _ => RetentionBucket::Over30,
        }
    }
}

/// 区分ごとの人数と割合
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketCount {
    pub bucket: RetentionBucket,
    pub users: usize,
    pub share: f64,
}

/// 継続率の分析結果一式
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetentionSummary {
    /// 対象ユーザー数
    pub registrations: usize,
    /// 週ごとの継続率（週の昇順）
    pub weeks: Vec<WeeklyRetention>,
    /// 全体の継続率
    pub overall: Vec<RetentionRate>,
    /// 継続日数の区分ごとの人数（`RetentionBucket::ALL`の順、0人の区分も含む）
    pub buckets: Vec<BucketCount>,
    pub mean_days: Option<f64>,
    pub median_days: Option<f64>,
}

/// 継続日数が求まる記録と、その日数
fn eligible(records: &[UserRecord]) -> Vec<(&UserRecord, i64)> {
    records
        .iter()
        .filter_map(|record| {
            record
                .retention_whole_days()
                .filter(|days| *days >= 0)
                .map(|days| (record, days))
        })
        .collect()
}

fn rates(retention: &[i64], days: &[u32]) -> Vec<RetentionRate> {
    days.iter()
        .map(|&d| {
            let retained = retention.iter().filter(|&&r| r >= i64::from(d)).count();
            RetentionRate {
                days: d,
                retained,
                rate: ratio(retained, retention.len()),
            }
        })
        .collect()
}

/// 登録週（ISO週）ごとに、`days`日以上継続したユーザーの割合を計算する
///
/// # 引数
///
/// * `records` - ユーザーの記録
/// * `days` - 集計する継続日数（出力の`rates`はこの順序）
pub fn retention_by_week(records: &[UserRecord], days: &[u32]) -> Vec<WeeklyRetention> {
    let mut weeks: BTreeMap<(i32, u32), Vec<(NaiveDate, i64)>> = BTreeMap::new();
    for (record, retention) in eligible(records) {
        let date = record.registered_at.date();
        let iso = date.iso_week();
        weeks
            .entry((iso.year(), iso.week()))
            .or_default()
            .push((date, retention));
    }

    let mut result: Vec<((i32, u32), WeeklyRetention)> = weeks
        .into_par_iter()
        .filter_map(|((year, week), members)| {
            let first_registration = members.iter().map(|(date, _)| *date).min()?;
            let last_registration = members.iter().map(|(date, _)| *date).max()?;
            let retention: Vec<i64> = members.iter().map(|(_, r)| *r).collect();

            Some((
                (year, week),
                WeeklyRetention {
                    week: format!("{}-W{:02}", year, week),
                    first_registration,
                    last_registration,
                    registrations: retention.len(),
                    rates: rates(&retention, days),
                },
            ))
        })
        .collect();
    result.sort_by_key(|(key, _)| *key);

    result.into_iter().map(|(_, week)| week).collect()
}

/// 継続日数を区分ごとに数える
pub fn retention_buckets(records: &[UserRecord]) -> Vec<BucketCount> {
    let retention: Vec<i64> = eligible(records).into_iter().map(|(_, r)| r).collect();

    RetentionBucket::ALL
        .iter()
        .map(|&bucket| {
            let users = retention
                .iter()
                .filter(|&&r| RetentionBucket::of(r) == bucket)
                .count();
            BucketCount {
                bucket,
                users,
                share: ratio(users, retention.len()),
            }
        })
        .collect()
}

/// 週ごとの継続率、全体の継続率、継続日数の分布をまとめて計算する
pub fn retention_summary(records: &[UserRecord], days: &[u32]) -> RetentionSummary {
    let retention: Vec<i64> = eligible(records).into_iter().map(|(_, r)| r).collect();

    let mean_days = if retention.is_empty() {
        None
    } else {
        Some(retention.iter().sum::<i64>() as f64 / retention.len() as f64)
    };

    let summary = RetentionSummary {
        registrations: retention.len(),
        weeks: retention_by_week(records, days),
        overall: rates(&retention, days),
        buckets: retention_buckets(records),
        mean_days,
        median_days: median(retention.iter().map(|&r| r as f64).collect()),
    };

    debug!(
        "computed retention for {} users over {} weeks",
        summary.registrations,
        summary.weeks.len()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M").unwrap()
    }

    fn user(registered: &str, last_login: Option<&str>) -> UserRecord {
        UserRecord {
            registered_at: at(registered),
            first_paid_at: None,
            last_login_at: last_login.map(at),
        }
    }

    fn fixture() -> Vec<UserRecord> {
        vec![
            // 2025-W26（06-23〜06-29）
            user("2025-06-23 10:00", Some("2025-06-23 18:00")), // 0日
            user("2025-06-24 10:00", Some("2025-06-25 11:00")), // 1日
            user("2025-06-25 10:00", Some("2025-07-03 10:00")), // 8日
            user("2025-06-29 10:00", Some("2025-08-10 10:00")), // 42日
            user("2025-06-26 10:00", None),                      // 対象外
            // 2025-W27
            user("2025-06-30 10:00", Some("2025-07-02 09:00")), // 1日（47時間）
            user("2025-07-01 10:00", Some("2025-07-01 09:00")), // 負、対象外
        ]
    }

    #[test]
    fn test_retention_whole_days() {
        assert_eq!(fixture()[5].retention_whole_days(), Some(1));
        assert_eq!(fixture()[6].retention_whole_days(), Some(-1));
        assert_eq!(fixture()[4].retention_whole_days(), None);
    }

    #[test]
    fn test_retention_by_week() {
        let weeks = retention_by_week(&fixture(), &RETENTION_DAYS);

        assert_eq!(weeks.len(), 2);
        let first = &weeks[0];
        assert_eq!(first.week, "2025-W26");
        assert_eq!(first.registrations, 4);
        assert_eq!(first.first_registration, NaiveDate::from_ymd_opt(2025, 6, 23).unwrap());
        assert_eq!(first.last_registration, NaiveDate::from_ymd_opt(2025, 6, 29).unwrap());

        let retained: Vec<usize> = first.rates.iter().map(|r| r.retained).collect();
        assert_eq!(retained, vec![3, 2, 1]);
        assert_eq!(first.rates[0].rate, 0.75);
        assert_eq!(first.rates[2].days, 30);
        assert_eq!(first.rates[2].rate, 0.25);

        let second = &weeks[1];
        assert_eq!(second.week, "2025-W27");
        assert_eq!(second.registrations, 1);
        assert_eq!(second.rates[0].rate, 1.0);
        assert_eq!(second.rates[1].rate, 0.0);
    }

    #[test]
    fn test_iso_week_crosses_year() {
        // 2024-12-30 は 2025-W01
        let records = vec![user("2024-12-30 10:00", Some("2025-01-02 10:00"))];
        let weeks = retention_by_week(&records, &[1]);
        assert_eq!(weeks[0].week, "2025-W01");
    }

    #[test]
    fn test_retention_buckets() {
        let buckets = retention_buckets(&fixture());

        // 0日, 1日, 8日, 42日, 1日
        let users: Vec<usize> = buckets.iter().map(|b| b.users).collect();
        assert_eq!(users, vec![1, 2, 0, 1, 1]);
        assert_eq!(buckets[1].bucket, RetentionBucket::NextDay);
        assert_eq!(buckets[1].share, 0.4);
        assert_eq!(buckets[2].share, 0.0);
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(RetentionBucket::of(0), RetentionBucket::SameDay);
        assert_eq!(RetentionBucket::of(2), RetentionBucket::Days2To7);
        assert_eq!(RetentionBucket::of(7), RetentionBucket::Days2To7);
        assert_eq!(RetentionBucket::of(8), RetentionBucket::Days8To30);
        assert_eq!(RetentionBucket::of(30), RetentionBucket::Days8To30);
        assert_eq!(RetentionBucket::of(31), RetentionBucket::Over30);
    }

    #[test]
    fn test_retention_summary() {
        let summary = retention_summary(&fixture(), &RETENTION_DAYS);

        assert_eq!(summary.registrations, 5);
        let overall: Vec<usize> = summary.overall.iter().map(|r| r.retained).collect();
        assert_eq!(overall, vec![4, 2, 1]);
        assert_eq!(summary.mean_days, Some(52.0 / 5.0));
        assert_eq!(summary.median_days, Some(1.0));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["buckets"][0]["bucket"], "当天");
        assert_eq!(json["buckets"][4]["bucket"], "30天以上");
    }

    #[test]
    fn test_retention_summary_without_logins() {
        let summary = retention_summary(&[user("2025-06-23 10:00", None)], &RETENTION_DAYS);
        assert_eq!(summary.registrations, 0);
        assert!(summary.weeks.is_empty());
        assert_eq!(summary.overall[0].rate, 0.0);
        assert_eq!(summary.mean_days, None);
        assert_eq!(summary.median_days, None);
    }
}
