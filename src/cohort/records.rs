//! User Record Loader
//!
//! 1行1ユーザーのシートから`UserRecord`を読み込みます。
//! ヘッダー行で列名を探し、登録日時と初回課金日時の列を特定します。

use calamine::Data;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, warn};

use crate::cohort::UserRecord;
use crate::error::FunnelError;
use crate::parser::{excel_serial_to_datetime, WorkbookSource};

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// 記録シートの列名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortColumns {
    /// 登録日時の列名
    pub registered_at: String,
    /// 初回課金日時の列名
    pub first_paid_at: String,
    /// 最終ログイン日時の列名（この列は無くてもよい）
    pub last_login_at: String,
}

impl Default for CohortColumns {
    fn default() -> Self {
        Self {
            registered_at: "注册时间".to_string(),
            first_paid_at: "首次付费时间".to_string(),
            last_login_at: "最后登录时间".to_string(),
        }
    }
}

/// 最初のシートからユーザーの記録を読み込む
///
/// # 読み込み規則
///
/// - 1行目をヘッダーとし、列名はトリムして完全一致で比較します
/// - 登録日時が空の行はスキップします
/// - 登録日時を日時として解釈できない行はエラーになります
/// - 初回課金日時を解釈できない場合は未課金として扱います
/// - 最終ログイン日時の列は任意です。列が無い、または解釈できない場合は`None`になります
///
/// # 戻り値
///
/// * `Ok(Vec<UserRecord>)` - シートの行順の記録
/// * `Err(FunnelError::Record)` - 列が見つからない、または登録日時が読めない場合
pub fn load_user_records(
    source: &mut WorkbookSource,
    columns: &CohortColumns,
) -> Result<Vec<UserRecord>, FunnelError> {
    let range = source.first_sheet_range()?;
    let first_row = range.start().map_or(0, |(row, _)| row as usize);

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| FunnelError::EmptySource("record sheet has no header row".to_string()))?;

    let position = |name: &str| {
        header
            .iter()
            .position(|cell| matches!(cell, Data::String(s) if s.trim() == name))
    };
    let find_column = |name: &str| -> Result<usize, FunnelError> {
        position(name).ok_or_else(|| FunnelError::Record {
            row: first_row + 1,
            message: format!("column '{}' not found in header", name),
        })
    };
    let registered_col = find_column(&columns.registered_at)?;
    let paid_col = find_column(&columns.first_paid_at)?;
    let login_col = position(&columns.last_login_at);
    if login_col.is_none() {
        debug!("column '{}' not found, retention is not available", columns.last_login_at);
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, row) in rows.enumerate() {
        let row_number = first_row + idx + 2;
        let registered = row.get(registered_col).unwrap_or(&Data::Empty);
        if is_blank(registered) {
            skipped += 1;
            continue;
        }

        let registered_at = data_to_datetime(registered).ok_or_else(|| FunnelError::Record {
            row: row_number,
            message: format!("unreadable registration time: {}", registered),
        })?;

        let paid = row.get(paid_col).unwrap_or(&Data::Empty);
        let first_paid_at = optional_datetime(paid, row_number, "first payment time");
        let last_login_at = login_col.and_then(|col| {
            optional_datetime(row.get(col).unwrap_or(&Data::Empty), row_number, "last login time")
        });

        records.push(UserRecord {
            registered_at,
            first_paid_at,
            last_login_at,
        });
    }

    debug!(
        "loaded {} user records ({} rows without registration time)",
        records.len(),
        skipped
    );
    Ok(records)
}

/// 空でなければ日時として解釈する（解釈できない場合は警告して`None`）
fn optional_datetime(data: &Data, row_number: usize, what: &str) -> Option<NaiveDateTime> {
    if is_blank(data) {
        return None;
    }
    let parsed = data_to_datetime(data);
    if parsed.is_none() {
        warn!("row {}: unreadable {} '{}', ignored", row_number, what, data);
    }
    parsed
}

fn is_blank(data: &Data) -> bool {
    match data {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// セル値を日時として解釈
fn data_to_datetime(data: &Data) -> Option<NaiveDateTime> {
    match data {
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64()),
        Data::Float(f) => excel_serial_to_datetime(*f),
        Data::Int(i) => excel_serial_to_datetime(*i as f64),
        Data::String(s) | Data::DateTimeIso(s) => parse_datetime_text(s.trim()),
        _ => None,
    }
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
