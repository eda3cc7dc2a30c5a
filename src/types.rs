//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 生のグリッドに含まれるセルの値
///
/// スプレッドシートの最初のシートから取り出された、型付け前の値です。
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// 空セル
    Empty,

    /// 数値（f64）
    Number(f64),

    /// 文字列（パーセント表記やプレースホルダーを含む）
    Text(String),
}

impl Cell {
    /// 値が空かどうかを判定
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// ラベル（指標名・期間名）として使用する文字列に変換
    ///
    /// 数値は`10`や`1.5`のように最短表記で出力されます。空セルは空文字列です。
    pub fn to_label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

/// 正規化済みのセル値
///
/// JSONでは数値・`null`・文字列として表現されます。
/// `Text`は数値として解釈できなかった残余の値で、空文字列になることはありません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    /// 数値（パーセントは小数に変換済み: `12%` → `0.12`）
    Number(f64),

    /// 数値として解釈できなかったテキスト
    Text(String),

    /// 欠損（空セル・プレースホルダー）
    Missing,
}

impl NormalizedValue {
    /// 欠損値かどうかを判定
    pub fn is_missing(&self) -> bool {
        matches!(self, NormalizedValue::Missing)
    }

    /// 数値として取得（`Number`の場合のみ）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            NormalizedValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// 期間ラベル（例: `0623-0629`、`2025-06-23`）
///
/// 不透明な文字列として扱われ、比較は文字列の等価性のみで行います。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Period(String);

impl Period {
    /// 新しい期間ラベルを生成
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// ラベル文字列を取得
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 表示順の並べ替えに使う日付キーを計算
    ///
    /// # 対応形式
    ///
    /// - `MMDD-MMDD`（週範囲）: 指定された年における開始日
    /// - `YYYY-MM-DD`: その日付
    ///
    /// それ以外の形式、または存在しない日付の場合は`None`を返します。
    /// `None`は並べ替えで最も前に置かれます。
    ///
    /// # 引数
    ///
    /// * `year` - 週範囲形式に補う年
    pub fn sort_key(&self, year: i32) -> Option<NaiveDate> {
        let label = self.0.as_str();
        let bytes = label.as_bytes();

        // MMDD-MMDD
        if bytes.len() == 9
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit)
        {
            let month: u32 = label[0..2].parse().ok()?;
            let day: u32 = label[2..4].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day);
        }

        // YYYY-MM-DD
        if bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
            return NaiveDate::parse_from_str(label, "%Y-%m-%d").ok();
        }

        None
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Period {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Period {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 系列の1点（期間と値のペア）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// 対応する期間
    ///
    /// 値セルが期間ラベルより多い行では、超過分が`None`になります。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,

    /// 正規化済みの値
    pub value: NormalizedValue,
}

/// 名前付きの指標と、その時系列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    /// 指標名（行の先頭セル）
    pub name: String,

    /// 期間ごとの値（行の値セルと同じ順序・同じ長さ）
    pub series: Vec<SeriesPoint>,
}

impl Indicator {
    /// 指定された期間の最初の点を検索
    pub fn point_at(&self, period: &Period) -> Option<&SeriesPoint> {
        self.series
            .iter()
            .find(|point| point.period.as_ref() == Some(period))
    }
}

/// 1回の解析結果である正規化済みモデル
///
/// `periods`は元の列順のままで、並べ替えは行いません。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedModel {
    /// 期間ラベルのリスト（ヘッダー行の2列目以降）
    pub periods: Vec<Period>,

    /// 指標のリスト（元の行順）
    pub indicators: Vec<Indicator>,
}
