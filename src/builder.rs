//! Builder Module
//!
//! Fluent Builder APIを提供し、`IndicatorParser`インスタンスを段階的に構築する。

use crate::error::FunnelError;
use crate::normalize::DEFAULT_PLACEHOLDERS;
use crate::parser::{parse_indicator_grid, WorkbookSource};
use crate::security::SourceLimits;
use crate::types::{Cell, NormalizedModel};
use std::io::Read;

/// 解析処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ParseConfig {
    /// 欠損として扱うトークン（トリム後のテキストと完全一致で比較）
    pub placeholders: Vec<String>,

    /// 入力サイズの制限
    pub limits: SourceLimits,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            placeholders: DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
            limits: SourceLimits::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `IndicatorParser`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use funnelzero::{ParserBuilder, SourceLimits};
///
/// # fn main() -> Result<(), funnelzero::FunnelError> {
/// let parser = ParserBuilder::new()
///     .with_placeholders(["/", "", "-", "N/A"])
///     .with_limits(SourceLimits { max_rows: 10_000, ..SourceLimits::default() })
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ParserBuilder {
    /// 内部設定（構築中）
    config: ParseConfig,
}

impl ParserBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - プレースホルダー: `/`、空文字列、`-`
    /// - 入力サイズ制限: `SourceLimits::default()`
    pub fn new() -> Self {
        Self::default()
    }

    /// 欠損として扱うプレースホルダーを指定する
    ///
    /// 既定の集合を置き換えます。空文字列を含めなくても、空のテキストセルは
    /// 常に欠損として扱われます。
    pub fn with_placeholders<I, S>(mut self, placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.placeholders = placeholders.into_iter().map(Into::into).collect();
        self
    }

    /// 入力サイズの制限を指定する
    pub fn with_limits(mut self, limits: SourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// 設定を検証し、`IndicatorParser`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `FunnelError::Config(String)`: 設定の検証に失敗した場合
    ///   * プレースホルダーの前後に空白がある（トリム後のテキストとは一致しない）
    ///   * プレースホルダーが`%`で終わる（パーセント判定が先に行われるため到達しない）
    ///   * 制限値が0
    pub fn build(self) -> Result<IndicatorParser, FunnelError> {
        for token in &self.config.placeholders {
            if token.trim() != token {
                return Err(FunnelError::Config(format!(
                    "Placeholder '{}' has surrounding whitespace",
                    token
                )));
            }
            if token.ends_with('%') {
                return Err(FunnelError::Config(format!(
                    "Placeholder '{}' ends with '%' and would be read as a percentage",
                    token
                )));
            }
        }

        let limits = &self.config.limits;
        if limits.max_input_bytes == 0 || limits.max_rows == 0 || limits.max_cols == 0 {
            return Err(FunnelError::Config(
                "Source limits must be greater than zero".to_string(),
            ));
        }

        Ok(IndicatorParser {
            config: self.config,
        })
    }
}

/// 指標解析のファサード
///
/// 生のグリッド、またはワークブックのバイト列から`NormalizedModel`を生成します。
/// 解析は毎回独立しており、状態やキャッシュを持ちません。
///
/// # 使用例
///
/// ```rust,no_run
/// use funnelzero::ParserBuilder;
/// use std::fs::File;
///
/// # fn main() -> Result<(), funnelzero::FunnelError> {
/// let parser = ParserBuilder::new().build()?;
/// let model = parser.parse_workbook(File::open("data.xlsx")?)?;
/// println!("{} indicators", model.indicators.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndicatorParser {
    /// 解析設定
    config: ParseConfig,
}

impl IndicatorParser {
    /// グリッドを解析する
    ///
    /// # 引数
    ///
    /// * `grid` - 1行目が期間ラベル、2行目以降が`[指標名, 値...]`のセル配列
    ///
    /// # 戻り値
    ///
    /// * `Ok(NormalizedModel)` - 解析結果
    /// * `Err(FunnelError::EmptySource)` - ヘッダー行が存在しない場合
    pub fn parse_grid(&self, grid: &[Vec<Cell>]) -> Result<NormalizedModel, FunnelError> {
        parse_indicator_grid(grid, &self.config.placeholders)
    }

    /// ワークブックの最初のシートを解析する
    ///
    /// # 引数
    ///
    /// * `input` - XLSX / XLS / ODS ファイルを読み込むためのリーダー
    ///
    /// # 戻り値
    ///
    /// * `Ok(NormalizedModel)` - 解析結果
    /// * `Err(FunnelError)` - ワークブックを読み込めない場合（解析全体が失敗します）
    pub fn parse_workbook<R: Read>(&self, input: R) -> Result<NormalizedModel, FunnelError> {
        let mut source = WorkbookSource::open(input, self.config.limits)?;
        let grid = source.first_sheet_grid()?;
        self.parse_grid(&grid)
    }
}

/// デフォルト設定でグリッドを解析する
///
/// `IndicatorParser::default().parse_grid(grid)`と同じです。
///
/// ```rust
/// use funnelzero::{parse, Cell, NormalizedValue};
///
/// let grid = vec![
///     vec![Cell::Empty, Cell::from("P1")],
///     vec![Cell::from("Signups"), Cell::from("12%")],
/// ];
/// let model = parse(&grid).unwrap();
/// assert_eq!(model.indicators[0].series[0].value, NormalizedValue::Number(0.12));
/// ```
pub fn parse(grid: &[Vec<Cell>]) -> Result<NormalizedModel, FunnelError> {
    IndicatorParser::default().parse_grid(grid)
}
