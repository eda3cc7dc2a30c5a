//! Funnel Derivation
//!
//! 正規化済みモデルから、対象期間におけるファネル各ステージの値と
//! 直前ステージに対する転換率を計算するモジュール。

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::funnel::config::{FunnelConfig, FunnelStageSpec};
use crate::normalize::parse_number;
use crate::types::{Indicator, NormalizedModel, NormalizedValue, Period};

/// 1ステージの計算結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStageResult {
    /// ステージの表示名
    pub stage: String,

    /// 対象期間における値（データが無い場合は0）
    pub value: f64,

    /// 直前ステージに対する転換率（先頭は1、直前が0の場合は0）
    pub rate: f64,
}

/// 既存ユーザーが課金ユーザー全体に占める割合
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturningShare {
    /// 参照した指標名
    pub indicator: String,

    /// 既存ユーザーの人数
    pub returning: f64,

    /// `returning / (returning + 最終ステージの値)`
    pub share: f64,
}

/// ファネルの導出結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    /// 対象期間
    pub period: Period,

    /// ステージごとの結果（宣言順）
    pub stages: Vec<FunnelStageResult>,

    /// 既存ユーザーの割合（計算できない場合は省略）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning_share: Option<ReturningShare>,
}

/// 指標名から系列への索引
///
/// 同名の指標が複数ある場合は、後に出現したものが優先されます。
pub(crate) struct IndicatorLookup<'a> {
    by_name: HashMap<&'a str, &'a Indicator>,
}

impl<'a> IndicatorLookup<'a> {
    pub fn new(model: &'a NormalizedModel) -> Self {
        let mut by_name = HashMap::with_capacity(model.indicators.len());
        for indicator in &model.indicators {
            if by_name.insert(indicator.name.as_str(), indicator).is_some() {
                warn!(
                    "indicator '{}' appears more than once; the last row wins",
                    indicator.name
                );
            }
        }
        Self { by_name }
    }

    /// 指定された指標・期間の値
    pub fn value_at(&self, name: &str, period: &Period) -> Option<&'a NormalizedValue> {
        let indicator = match self.by_name.get(name) {
            Some(indicator) => indicator,
            None => {
                warn!("indicator '{}' not found", name);
                return None;
            }
        };

        let point = indicator.point_at(period);
        if point.is_none() {
            debug!("indicator '{}' has no value for period '{}'", name, period);
        }
        point.map(|p| &p.value)
    }

    /// ステージの値として加算する量（数値でなければ0）
    pub fn contribution(&self, name: &str, period: &Period) -> f64 {
        self.value_at(name, period)
            .map(stage_contribution)
            .unwrap_or(0.0)
    }
}

/// 正規化済みの値をステージの値へ変換
///
/// 数値、または数値として読めるテキストはその値、それ以外は0です。
/// NaNや無限大はグラフに描画できないため0として扱います。
fn stage_contribution(value: &NormalizedValue) -> f64 {
    let n = match value {
        NormalizedValue::Number(n) => *n,
        NormalizedValue::Text(text) => parse_number(text).unwrap_or(0.0),
        NormalizedValue::Missing => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// ステージの値の列から転換率を計算
fn with_rates(values: Vec<(String, f64)>) -> Vec<FunnelStageResult> {
    let mut results: Vec<FunnelStageResult> = Vec::with_capacity(values.len());

    for (stage, value) in values {
        let rate = match results.last() {
            None => 1.0,
            Some(previous) if previous.value != 0.0 => {
                let rate = value / previous.value;
                if rate.is_finite() {
                    rate
                } else {
                    0.0
                }
            }
            Some(_) => 0.0,
        };
        results.push(FunnelStageResult { stage, value, rate });
    }

    results
}

/// ファネルを導出する
///
/// # 引数
///
/// * `model` - 正規化済みモデル
/// * `stages` - ステージの定義（宣言順）
/// * `target_period` - 対象期間
///
/// # 戻り値
///
/// ステージ数と同じ長さの結果。データが欠けているステージは値0になります。
///
/// ```rust
/// use funnelzero::{derive_funnel, parse, Cell, FunnelStageSpec, Period};
///
/// let grid = vec![
///     vec![Cell::Empty, Cell::from("P1")],
///     vec![Cell::from("A"), Cell::from("10")],
///     vec![Cell::from("B"), Cell::from("4")],
/// ];
/// let model = parse(&grid).unwrap();
/// let stages = [FunnelStageSpec::simple("S1", "A"), FunnelStageSpec::simple("S2", "B")];
///
/// let results = derive_funnel(&model, &stages, &Period::from("P1"));
/// assert_eq!(results[1].rate, 0.4);
/// ```
pub fn derive_funnel(
    model: &NormalizedModel,
    stages: &[FunnelStageSpec],
    target_period: &Period,
) -> Vec<FunnelStageResult> {
    let lookup = IndicatorLookup::new(model);
    derive_with_lookup(&lookup, stages, target_period)
}

fn derive_with_lookup(
    lookup: &IndicatorLookup<'_>,
    stages: &[FunnelStageSpec],
    target_period: &Period,
) -> Vec<FunnelStageResult> {
    let values = stages
        .iter()
        .map(|stage| {
            let value = stage
                .source
                .indicator_names()
                .iter()
                .map(|name| lookup.contribution(name, target_period))
                .sum();
            (stage.name.clone(), value)
        })
        .collect();

    with_rates(values)
}

/// 既存ユーザーの割合を計算
///
/// 既存ユーザーの値が数値でない場合、または分母が正でない場合は`None`です。
fn returning_share(
    lookup: &IndicatorLookup<'_>,
    indicator: &str,
    target_period: &Period,
    stages: &[FunnelStageResult],
) -> Option<ReturningShare> {
    let newest = stages.last()?.value;
    let returning = lookup
        .value_at(indicator, target_period)?
        .as_number()
        .filter(|n| n.is_finite())?;

    let denominator = returning + newest;
    if denominator > 0.0 {
        Some(ReturningShare {
            indicator: indicator.to_string(),
            returning,
            share: returning / denominator,
        })
    } else {
        None
    }
}

/// ファネル導出のファサード
///
/// `FunnelBuilder`または`FunnelConfig`から構築し、任意の数のモデルに適用できます。
#[derive(Debug, Clone)]
pub struct FunnelDeriver {
    config: FunnelConfig,
}

impl FunnelDeriver {
    pub(crate) fn new(config: FunnelConfig) -> Self {
        Self { config }
    }

    /// 使用している設定
    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    /// モデルからファネルのレポートを導出する
    pub fn derive(&self, model: &NormalizedModel) -> FunnelReport {
        let lookup = IndicatorLookup::new(model);
        let period = &self.config.target_period;

        let stages = derive_with_lookup(&lookup, &self.config.stages, period);
        let returning_share = self
            .config
            .returning_indicator
            .as_deref()
            .and_then(|name| returning_share(&lookup, name, period, &stages));

        debug!(
            "derived {} funnel stages for period '{}'",
            stages.len(),
            period
        );

        FunnelReport {
            period: period.clone(),
            stages,
            returning_share,
        }
    }
}
