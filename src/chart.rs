//! Chart Series Module
//!
//! 複数の指標を1つのグラフに重ねて描画するための系列を、期間の日付順に組み立てます。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{NormalizedModel, Period};

/// 1つのグラフにまとめる指標のグループ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartGroup {
    /// グラフのタイトル
    pub title: String,

    /// 重ねて描画する指標名
    pub indicators: Vec<String>,
}

impl ChartGroup {
    pub fn new<I, S>(title: impl Into<String>, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            indicators: indicators.into_iter().map(Into::into).collect(),
        }
    }
}

/// グラフの1点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub period: Period,
    pub value: f64,
    pub indicator: String,
}

impl NormalizedModel {
    /// 期間を日付キーの順に並べ替えたリスト
    ///
    /// 並べ替えは安定で、日付として解釈できない期間は先頭に元の順序のまま残ります。
    ///
    /// # 引数
    ///
    /// * `year` - `MMDD-MMDD`形式の期間に補う年
    pub fn sorted_periods(&self, year: i32) -> Vec<Period> {
        let mut periods = self.periods.clone();
        periods.sort_by_cached_key(|period| period.sort_key(year));
        periods
    }
}

/// グループ内の指標を1つの系列にまとめる
///
/// 数値（有限値）かつ期間リストに含まれる点のみを残し、期間の日付キー順に並べます。
/// 同じ期間の点は、グループに指定された指標の順に並びます。
/// 同名の指標が複数ある場合は、すべての行の点が含まれます。
///
/// # 引数
///
/// * `model` - 正規化済みモデル
/// * `group` - まとめる指標のグループ
/// * `year` - 期間の日付キーを計算する年
pub fn chart_series(model: &NormalizedModel, group: &ChartGroup, year: i32) -> Vec<ChartPoint> {
    let known: HashSet<&Period> = model.periods.iter().collect();

    let mut points: Vec<ChartPoint> = group
        .indicators
        .iter()
        .flat_map(|name| {
            model
                .indicators
                .iter()
                .filter(move |indicator| &indicator.name == name)
        })
        .flat_map(|indicator| {
            indicator.series.iter().filter_map(|point| {
                let period = point.period.as_ref().filter(|p| known.contains(p))?;
                let value = point.value.as_number().filter(|n| n.is_finite())?;
                Some(ChartPoint {
                    period: period.clone(),
                    value,
                    indicator: indicator.name.clone(),
                })
            })
        })
        .collect();

    points.sort_by_cached_key(|point| point.period.sort_key(year));
    points
}
