//! Security Module
//!
//! 入力ワークブックに対するサイズ制限を実装するモジュール。
//! 巨大なファイルや極端に大きなシートによるリソース枯渇を防ぎます。

use crate::error::FunnelError;

/// 入力サイズの制限
///
/// ワークブック読み込み時のセキュリティ制限を定義します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLimits {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_input_bytes: u64,
    /// シートの最大行数
    /// デフォルト: 1,048,576（Excelの上限）
    pub max_rows: usize,
    /// シートの最大列数
    /// デフォルト: 16,384（Excelの上限）
    pub max_cols: usize,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 268_435_456, // 256MB
            max_rows: 1_048_576,
            max_cols: 16_384,
        }
    }
}

impl SourceLimits {
    /// デフォルトの制限を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 入力バイト数を検証
    pub(crate) fn check_input_size(&self, bytes_read: u64) -> Result<(), FunnelError> {
        if bytes_read > self.max_input_bytes {
            return Err(FunnelError::LimitExceeded(format!(
                "Input size exceeds maximum: {} bytes (max: {} bytes)",
                bytes_read, self.max_input_bytes
            )));
        }
        Ok(())
    }

    /// シートの大きさ（使用範囲の行数・列数）を検証
    pub(crate) fn check_sheet_shape(&self, rows: usize, cols: usize) -> Result<(), FunnelError> {
        if rows > self.max_rows {
            return Err(FunnelError::LimitExceeded(format!(
                "Sheet has too many rows: {} (max: {})",
                rows, self.max_rows
            )));
        }
        if cols > self.max_cols {
            return Err(FunnelError::LimitExceeded(format!(
                "Sheet has too many columns: {} (max: {})",
                cols, self.max_cols
            )));
        }
        Ok(())
    }
}
