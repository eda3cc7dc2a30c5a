//! Funnel Configuration
//!
//! ファネルのステージ定義と対象期間を、コードではなくデータとして扱うための
//! 設定型とビルダーを定義するモジュール。

use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::error::FunnelError;
use crate::funnel::derive::FunnelDeriver;
use crate::types::Period;

/// ステージの値の取得元
///
/// JSONでは`"key": "指標名"`（単一）または`"keys": ["指標名", ...]`（合成）として
/// 表現されます。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageSource {
    /// 単一の指標
    #[serde(rename = "key")]
    Simple(String),

    /// 複数の指標の合計（空であってはならない）
    #[serde(rename = "keys")]
    Composite(Vec<String>),
}

impl StageSource {
    /// 参照する指標名の一覧
    pub fn indicator_names(&self) -> &[String] {
        match self {
            StageSource::Simple(name) => std::slice::from_ref(name),
            StageSource::Composite(names) => names,
        }
    }
}

/// ファネルの1ステージの定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStageSpec {
    /// 表示名
    pub name: String,

    /// 値の取得元
    #[serde(flatten)]
    pub source: StageSource,
}

impl FunnelStageSpec {
    /// 単一の指標を参照するステージを生成
    pub fn simple(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: StageSource::Simple(key.into()),
        }
    }

    /// 複数の指標の合計を値とするステージを生成
    pub fn composite<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            source: StageSource::Composite(keys.into_iter().map(Into::into).collect()),
        }
    }
}

/// ファネル導出の設定
///
/// ステージの並び順が表示順であり、転換率を計算する際の「直前のステージ」を決めます。
///
/// # JSON形式
///
/// ```json
/// {
///   "target_period": "0623-0629",
///   "returning_indicator": "老用户付费人数",
///   "stages": [
///     { "name": "访问", "key": "新用户访问人数" },
///     { "name": "点击付费", "keys": ["报告页末尾", "点击付费按钮人数（新用户）"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelConfig {
    /// ステージの定義（宣言順）
    pub stages: Vec<FunnelStageSpec>,

    /// 対象期間
    ///
    /// JSONでは省略可能です（省略時は空）。空のままでは`validate`が失敗するため、
    /// `FunnelBuilder::with_target_period`で後から指定します。
    #[serde(default)]
    pub target_period: Period,

    /// 既存ユーザー（リピーター）の人数を表す指標名
    ///
    /// 指定されている場合、最終ステージとの比率を補足値として計算します。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning_indicator: Option<String>,
}

impl FunnelConfig {
    /// 設定を検証する
    ///
    /// # 発生し得るエラー
    ///
    /// * `FunnelError::Config(String)`:
    ///   * 対象期間が空
    ///   * ステージ名が空
    ///   * 合成ステージの取得元が空
    pub fn validate(&self) -> Result<(), FunnelError> {
        if self.target_period.as_str().trim().is_empty() {
            return Err(FunnelError::Config("Target period is not set".to_string()));
        }
        self.validate_stages()
    }

    /// ステージ定義のみを検証する（対象期間は検証しない）
    fn validate_stages(&self) -> Result<(), FunnelError> {
        for (idx, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(FunnelError::Config(format!(
                    "Stage #{} has an empty name",
                    idx + 1
                )));
            }
            if let StageSource::Composite(keys) = &stage.source {
                if keys.is_empty() {
                    return Err(FunnelError::Config(format!(
                        "Composite stage '{}' has no source indicators",
                        stage.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// JSONから設定を読み込み、ステージ定義を検証する
    ///
    /// `target_period`が省略されていても読み込めます。対象期間は
    /// `FunnelBuilder::build`の時点で検証されます。
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, FunnelError> {
        let config: FunnelConfig = serde_json::from_reader(reader)?;
        config.validate_stages()?;
        Ok(config)
    }

    /// 新規ユーザーの6段階転換ファネル
    ///
    /// 訪問 → 登録 → 履歴書アップロード → レポート閲覧 → 課金ボタン → 課金 の順で、
    /// 課金ボタンの段は2つの指標の合計です。既存ユーザーの課金人数を補足値に使います。
    pub fn new_user_conversion(target_period: impl Into<Period>) -> Self {
        Self {
            stages: vec![
                FunnelStageSpec::simple("新用户访问人数", "新用户访问人数"),
                FunnelStageSpec::simple("新用户注册人数", "新用户注册人数"),
                FunnelStageSpec::simple("上传简历人数（新用户）", "上传简历人数（新用户）"),
                FunnelStageSpec::simple("进入报告页人数（新用户）", "进入报告页人数（新用户）"),
                FunnelStageSpec::composite(
                    "报告页末尾-点击付费按钮人数（新用户）",
                    ["报告页末尾", "点击付费按钮人数（新用户）"],
                ),
                FunnelStageSpec::simple("新用户付费人数", "新用户付费人数"),
            ],
            target_period: target_period.into(),
            returning_indicator: Some("老用户付费人数".to_string()),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// # 使用例
///
/// ```rust,no_run
/// use funnelzero::FunnelBuilder;
///
/// # fn main() -> Result<(), funnelzero::FunnelError> {
/// let deriver = FunnelBuilder::new()
///     .with_stage("Visit", "visitors")
///     .with_stage("Signup", "signups")
///     .with_composite_stage("Checkout", ["checkout_web", "checkout_app"])
///     .with_target_period("0623-0629")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct FunnelBuilder {
    stages: Vec<FunnelStageSpec>,
    target_period: Option<Period>,
    returning_indicator: Option<String>,
}

impl FunnelBuilder {
    /// 空のビルダーを生成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 既存の設定から開始する
    pub fn from_config(config: FunnelConfig) -> Self {
        Self {
            stages: config.stages,
            target_period: Some(config.target_period),
            returning_indicator: config.returning_indicator,
        }
    }

    /// 単一の指標を参照するステージを追加する
    pub fn with_stage(mut self, name: impl Into<String>, key: impl Into<String>) -> Self {
        self.stages.push(FunnelStageSpec::simple(name, key));
        self
    }

    /// 複数の指標の合計を値とするステージを追加する
    pub fn with_composite_stage<I, S>(mut self, name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages.push(FunnelStageSpec::composite(name, keys));
        self
    }

    /// 対象期間を指定する
    pub fn with_target_period(mut self, period: impl Into<Period>) -> Self {
        self.target_period = Some(period.into());
        self
    }

    /// 既存ユーザーの人数を表す指標を指定する
    pub fn with_returning_indicator(mut self, name: impl Into<String>) -> Self {
        self.returning_indicator = Some(name.into());
        self
    }

    /// 設定を検証し、`FunnelDeriver`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `FunnelError::Config(String)`: 対象期間が未指定、または`FunnelConfig::validate`が失敗した場合
    pub fn build(self) -> Result<FunnelDeriver, FunnelError> {
        let target_period = self
            .target_period
            .ok_or_else(|| FunnelError::Config("Target period is not set".to_string()))?;

        let config = FunnelConfig {
            stages: self.stages,
            target_period,
            returning_indicator: self.returning_indicator,
        };
        config.validate()?;

        Ok(FunnelDeriver::new(config))
    }
}
