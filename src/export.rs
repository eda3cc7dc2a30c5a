//! JSON Export Module
//!
//! 解析結果とファネルのレポートを、他のツールから読めるJSONとして出力します。

use serde::Serialize;
use std::io::Write;

use crate::cohort::CohortSummary;
use crate::error::FunnelError;
use crate::funnel::FunnelReport;
use crate::types::NormalizedModel;

/// 値を整形済みJSONとして書き出す（末尾に改行を付けてフラッシュする）
fn write_pretty<W: Write, T: Serialize + ?Sized>(
    value: &T,
    mut writer: W,
) -> Result<(), FunnelError> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// 正規化済みモデルを書き出す
///
/// # 出力形式
///
/// ```json
/// {
///   "periods": ["P1", "P2"],
///   "indicators": [
///     { "name": "A", "series": [{ "period": "P1", "value": 10.0 }, { "period": "P2", "value": null }] }
///   ]
/// }
/// ```
///
/// 欠損値は`null`、期間を持たない超過値は`period`キーが省略されます。
pub fn write_model_json<W: Write>(model: &NormalizedModel, writer: W) -> Result<(), FunnelError> {
    write_pretty(model, writer)
}

/// ファネルのレポートを書き出す
pub fn write_report_json<W: Write>(report: &FunnelReport, writer: W) -> Result<(), FunnelError> {
    write_pretty(report, writer)
}

/// コホート分析の結果を書き出す
pub fn write_cohort_json<W: Write>(summary: &CohortSummary, writer: W) -> Result<(), FunnelError> {
    write_pretty(summary, writer)
}
