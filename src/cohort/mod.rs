//! Cohort Conversion Module
//!
//! ユーザー単位の登録・初回課金の記録から、登録日ごとのコホート転換率を計算します。
//!
//! - 時間単位の期間（12h、24h）は経過時間を小数の時間で比較します
//! - 日単位の期間（D7、D14、D30、D90）は経過した丸一日の数で比較します
//!
//! いずれも、遅延が`[0, 期間]`に収まるユーザーを転換済みとして数えます。
//!
//! 最終ログイン日時がある記録からは、登録週ごとの継続率も計算できます（`retention`）。

mod records;
pub mod retention;

pub use records::{load_user_records, CohortColumns};
pub use retention::{retention_summary, RetentionSummary};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use log::debug;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::FunnelError;

/// 1ユーザーの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// 登録日時
    pub registered_at: NaiveDateTime,

    /// 初回課金日時（未課金の場合は`None`）
    pub first_paid_at: Option<NaiveDateTime>,

    /// 最終ログイン日時（列が無い、または空の場合は`None`）
    pub last_login_at: Option<NaiveDateTime>,
}

impl UserRecord {
    /// 登録から初回課金までの経過時間（時間、小数）
    fn delay_hours(&self) -> Option<f64> {
        let paid = self.first_paid_at?;
        Some((paid - self.registered_at).num_milliseconds() as f64 / 3_600_000.0)
    }

    /// 登録から初回課金までの経過日数（丸一日単位、負の値は切り下げ）
    fn delay_whole_days(&self) -> Option<i64> {
        let paid = self.first_paid_at?;
        Some((paid - self.registered_at).num_seconds().div_euclid(86_400))
    }

    /// 登録日から初回課金日までの暦日数
    fn delay_calendar_days(&self) -> Option<i64> {
        let paid = self.first_paid_at?;
        Some((paid.date() - self.registered_at.date()).num_days())
    }
}

/// 転換とみなす最大の課金遅延
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Hours(u32),
    Days(u32),
}

impl Window {
    /// 12h、24h、D7、D14、D30、D90
    pub const DEFAULT: [Window; 6] = [
        Window::Hours(12),
        Window::Hours(24),
        Window::Days(7),
        Window::Days(14),
        Window::Days(30),
        Window::Days(90),
    ];

    /// ユーザーがこの期間内に課金したかどうか
    pub fn contains(&self, record: &UserRecord) -> bool {
        match *self {
            Window::Hours(hours) => record
                .delay_hours()
                .is_some_and(|delay| (0.0..=f64::from(hours)).contains(&delay)),
            Window::Days(days) => record
                .delay_whole_days()
                .is_some_and(|delay| (0..=i64::from(days)).contains(&delay)),
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Hours(hours) => write!(f, "{}h", hours),
            Window::Days(days) => write!(f, "D{}", days),
        }
    }
}

impl Serialize for Window {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 1つの期間における転換数と転換率
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowConversion {
    pub window: Window,
    pub paid: usize,
    pub rate: f64,
}

/// 登録日ごとの転換
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayConversion {
    pub date: NaiveDate,
    pub registrations: usize,
    pub windows: Vec<WindowConversion>,
}

/// 全期間を通した転換
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallConversion {
    pub registrations: usize,
    pub windows: Vec<WindowConversion>,
}

/// 中央値を集計する日付範囲（両端を含む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CohortPeriod {
    /// `MMDD-MMDD`形式のラベルから日付範囲を生成する
    ///
    /// 終了日が開始日より前になる場合（年をまたぐ週）は、終了日を翌年として扱います。
    ///
    /// # 発生し得るエラー
    ///
    /// * `FunnelError::Config(String)`: ラベルが`MMDD-MMDD`形式でない、または存在しない日付の場合
    pub fn from_label(label: &str, year: i32) -> Result<Self, FunnelError> {
        let invalid = || FunnelError::Config(format!("Invalid period label '{}'", label));

        let (from, to) = label.split_once('-').ok_or_else(invalid)?;
        let parse_mmdd = |mmdd: &str, year: i32| -> Option<NaiveDate> {
            if mmdd.len() != 4 || !mmdd.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            NaiveDate::from_ymd_opt(year, mmdd[0..2].parse().ok()?, mmdd[2..4].parse().ok()?)
        };

        let start = parse_mmdd(from, year).ok_or_else(invalid)?;
        let mut end = parse_mmdd(to, year).ok_or_else(invalid)?;
        if end < start {
            end = parse_mmdd(to, year + 1).ok_or_else(invalid)?;
        }

        Ok(Self {
            label: label.to_string(),
            start,
            end,
        })
    }

    fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// 期間ごとの日次転換率の中央値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodMedian {
    pub label: String,
    pub medians: Vec<WindowMedian>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowMedian {
    pub window: Window,
    /// 範囲内に登録日が1日も無い場合は`None`
    pub median: Option<f64>,
}

/// 課金までの日数の分布
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayDelayDistribution {
    /// `counts[d]`は、登録日から`d`日後に初回課金したユーザー数
    pub counts: Vec<usize>,

    /// 平均日数（課金ユーザーがいない場合は`None`）
    pub mean_days: Option<f64>,

    /// 登録週ごとの中央値（週の昇順）
    pub weekly_medians: Vec<WeeklyDelayMedian>,

    /// 24時間以内に課金したユーザーの時間別の人数（24区間）
    pub hourly_within_day: Vec<usize>,
}

fn ratio(paid: usize, registrations: usize) -> f64 {
    if registrations > 0 {
        paid as f64 / registrations as f64
    } else {
        0.0
    }
}

fn count_windows(records: &[&UserRecord], windows: &[Window]) -> Vec<WindowConversion> {
    windows
        .iter()
        .map(|window| {
            let paid = records.iter().filter(|r| window.contains(r)).count();
            WindowConversion {
                window: *window,
                paid,
                rate: ratio(paid, records.len()),
            }
        })
        .collect()
}

/// 登録日ごとの転換を計算する
///
/// # 引数
///
/// * `records` - ユーザーの記録
/// * `windows` - 集計する期間（出力の`windows`はこの順序）
///
/// # 戻り値
///
/// 登録日の昇順に並んだ日ごとの結果
pub fn conversion_by_day(records: &[UserRecord], windows: &[Window]) -> Vec<DayConversion> {
    let mut cohorts: BTreeMap<NaiveDate, Vec<&UserRecord>> = BTreeMap::new();
    for record in records {
        cohorts
            .entry(record.registered_at.date())
            .or_default()
            .push(record);
    }

    let mut days: Vec<DayConversion> = cohorts
        .into_par_iter()
        .map(|(date, members)| DayConversion {
            date,
            registrations: members.len(),
            windows: count_windows(&members, windows),
        })
        .collect();
    days.sort_by_key(|day| day.date);

    debug!(
        "computed conversion for {} registration days ({} users)",
        days.len(),
        records.len()
    );
    days
}

/// 日ごとの結果を合算した全体の転換を計算する
pub fn overall(days: &[DayConversion]) -> OverallConversion {
    let registrations: usize = days.iter().map(|day| day.registrations).sum();

    let windows = days
        .first()
        .map(|day| {
            day.windows
                .iter()
                .enumerate()
                .map(|(idx, first)| {
                    let paid = days.iter().map(|day| day.windows[idx].paid).sum();
                    WindowConversion {
                        window: first.window,
                        paid,
                        rate: ratio(paid, registrations),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    OverallConversion {
        registrations,
        windows,
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// 日ごとの結果に含まれる期間（先頭の日の順序）
fn window_order(days: &[DayConversion]) -> Vec<Window> {
    days.first()
        .map(|day| day.windows.iter().map(|w| w.window).collect())
        .unwrap_or_default()
}

/// 指定された日付範囲ごとに、日次転換率の中央値を計算する
///
/// 出力は`periods`と同じ順序です。
pub fn period_medians(days: &[DayConversion], periods: &[CohortPeriod]) -> Vec<PeriodMedian> {
    let windows = window_order(days);

    periods
        .iter()
        .map(|period| {
            let in_range: Vec<&DayConversion> =
                days.iter().filter(|day| period.contains(day.date)).collect();

            let medians = windows
                .iter()
                .enumerate()
                .map(|(idx, window)| WindowMedian {
                    window: *window,
                    median: median(in_range.iter().map(|day| day.windows[idx].rate).collect()),
                })
                .collect();

            PeriodMedian {
                label: period.label.clone(),
                medians,
            }
        })
        .collect()
}

const RATE_BINS: usize = 10;

/// 転換率の区間（10%刻み）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateBin {
    /// `0-10%`、`10-20%`、…、`90-100%`
    pub label: String,
    /// 転換率がこの区間に入った登録日の数
    pub count: usize,
    /// 全登録日に対する割合
    pub frequency: f64,
}

/// 1つの期間における日次転換率の度数分布
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateDistribution {
    pub window: Window,
    pub bins: Vec<RateBin>,
}

/// 転換率が入る区間の番号
///
/// 最初の区間は`[0, 0.1]`、以降は`(0.1, 0.2]`のように上端を含みます。
fn rate_bin(rate: f64) -> Option<usize> {
    if !(0.0..=1.0).contains(&rate) {
        return None;
    }
    (1..=RATE_BINS)
        .find(|&k| rate <= k as f64 / RATE_BINS as f64)
        .map(|k| k - 1)
}

/// 期間ごとに、日次転換率の度数分布を計算する
///
/// 出力は`days`に含まれる期間の順序です。
pub fn rate_distribution(days: &[DayConversion]) -> Vec<RateDistribution> {
    window_order(days)
        .into_iter()
        .enumerate()
        .map(|(idx, window)| {
            let mut counts = [0usize; RATE_BINS];
            for bin in days.iter().filter_map(|day| rate_bin(day.windows[idx].rate)) {
                counts[bin] += 1;
            }
            let total: usize = counts.iter().sum();

            let bins = counts
                .iter()
                .enumerate()
                .map(|(k, &count)| RateBin {
                    label: format!("{}-{}%", k * 10, (k + 1) * 10),
                    count,
                    frequency: ratio(count, total),
                })
                .collect();

            RateDistribution { window, bins }
        })
        .collect()
}

/// 登録週ごとの課金日数の中央値
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyDelayMedian {
    /// 週の開始日（月曜日）
    pub week_start: NaiveDate,
    /// その週に登録した課金ユーザー数
    pub paid_users: usize,
    /// 登録日から初回課金日までの日数の中央値
    pub median_days: f64,
}

/// 日付を含む週の月曜日
fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// 登録週（月曜始まり）ごとに、課金日数の中央値を計算する
///
/// 日数は`pay_delay_distribution`と同じく暦日で数え、負の値は除外します。
pub fn weekly_pay_delay_medians(records: &[UserRecord]) -> Vec<WeeklyDelayMedian> {
    let mut weeks: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(days) = record.delay_calendar_days().filter(|days| *days >= 0) {
            weeks
                .entry(week_start(record.registered_at.date()))
                .or_default()
                .push(days as f64);
        }
    }

    let mut medians: Vec<WeeklyDelayMedian> = weeks
        .into_par_iter()
        .filter_map(|(week_start, delays)| {
            let paid_users = delays.len();
            median(delays).map(|median_days| WeeklyDelayMedian {
                week_start,
                paid_users,
                median_days,
            })
        })
        .collect();
    medians.sort_by_key(|week| week.week_start);
    medians
}

/// 登録から24時間以内に課金したユーザーの、1時間刻みの分布
///
/// `counts[h]`は`[h, h+1)`時間後に課金したユーザー数です。
/// ちょうど24時間後の課金は最後の区間に含めます。
pub fn pay_hours_within_day(records: &[UserRecord]) -> Vec<usize> {
    let mut counts = vec![0usize; 24];
    for hours in records.iter().filter_map(UserRecord::delay_hours) {
        if (0.0..=24.0).contains(&hours) {
            counts[(hours.floor() as usize).min(23)] += 1;
        }
    }
    counts
}

/// 課金ユーザーについて、登録日から初回課金日までの日数の分布を計算する
///
/// 初回課金日が登録日より前の記録は除外します。
/// 登録週ごとの中央値と、24時間以内の時間別分布も合わせて計算します。
pub fn pay_delay_distribution(records: &[UserRecord]) -> PayDelayDistribution {
    let delays: Vec<usize> = records
        .iter()
        .filter_map(UserRecord::delay_calendar_days)
        .filter_map(|days| usize::try_from(days).ok())
        .collect();

    let mut counts = vec![0usize; delays.iter().max().map_or(0, |max| max + 1)];
    for &days in &delays {
        counts[days] += 1;
    }

    let mean_days = if delays.is_empty() {
        None
    } else {
        Some(delays.iter().sum::<usize>() as f64 / delays.len() as f64)
    };

    PayDelayDistribution {
        counts,
        mean_days,
        weekly_medians: weekly_pay_delay_medians(records),
        hourly_within_day: pay_hours_within_day(records),
    }
}

/// コホート分析の結果一式
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub days: Vec<DayConversion>,
    pub overall: OverallConversion,
    pub period_medians: Vec<PeriodMedian>,
    pub rate_distribution: Vec<RateDistribution>,
    pub pay_delay: PayDelayDistribution,
    pub retention: RetentionSummary,
}

/// コホート分析の結果をまとめて計算する
///
/// 日次転換、全体転換、期間ごとの中央値、転換率の度数分布、課金遅延の分布、
/// および既定の継続日数（`retention::RETENTION_DAYS`）での継続率を含みます。
pub fn summarize(
    records: &[UserRecord],
    windows: &[Window],
    periods: &[CohortPeriod],
) -> CohortSummary {
    let days = conversion_by_day(records, windows);
    let overall = overall(&days);
    let period_medians = period_medians(&days, periods);
    let rate_distribution = rate_distribution(&days);

    CohortSummary {
        days,
        overall,
        period_medians,
        rate_distribution,
        pay_delay: pay_delay_distribution(records),
        retention: retention_summary(records, &retention::RETENTION_DAYS),
    }
}
