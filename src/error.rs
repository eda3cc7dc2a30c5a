//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// funnelzeroクレート全体で使用するエラー型
///
/// 指標スプレッドシートの読み込み、設定の検証、JSON出力の各段階で発生する
/// エラーを統一的に扱うために使用されます。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー（ファイル読み込み失敗など）
/// - `Workbook`: ワークブックの解析中に発生したエラー（calamine由来）
/// - `Json`: JSONのシリアライズ・デシリアライズ中に発生したエラー
/// - `Config`: 設定の検証に失敗したエラー（空の合成ステージなど）
/// - `EmptySource`: シートやヘッダー行が存在しない
/// - `LimitExceeded`: 入力サイズの上限を超えた
/// - `Record`: コホート分析用のレコードを解釈できない
///
/// 個々の行やセルの異常はエラーになりません。短すぎる行はスキップされ、
/// 解釈できないセルは「欠損」または生のテキストとして扱われます。
///
/// # 使用例
///
/// ```rust,no_run
/// use funnelzero::FunnelError;
/// use std::fs::File;
///
/// fn open_source(path: &str) -> Result<(), FunnelError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     // ... 処理 ...
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum FunnelError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ワークブックの解析中に発生したエラー
    ///
    /// ファイル形式が不正、破損したファイル、サポートされていない形式などが
    /// 原因となります。グリッドそのものを取得できないため、解析全体が失敗します。
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    /// JSONの変換エラー
    ///
    /// ステージ設定ファイルの読み込みや、モデル・レポートの出力時に発生します。
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// `FunnelBuilder::build()`や`ParserBuilder::build()`時に設定を検証し、
    /// 無効な設定が検出された場合に発生します。
    ///
    /// # 例
    ///
    /// ```rust,no_run
    /// use funnelzero::{FunnelBuilder, FunnelError};
    ///
    /// let result = FunnelBuilder::new()
    ///     .with_composite_stage("Checkout", Vec::<String>::new())  // 空の合成ステージ
    ///     .with_target_period("0623-0629")
    ///     .build();
    ///
    /// match result {
    ///     Err(FunnelError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// 入力にシートまたはヘッダー行が存在しない
    #[error("Empty source: {0}")]
    EmptySource(String),

    /// 入力サイズの上限を超えた
    ///
    /// `SourceLimits`で指定したバイト数・行数・列数の上限に違反した場合に
    /// 発生します。
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// コホート分析用レコードの解釈に失敗したエラー
    ///
    /// `row`は1始まりのシート上の行番号です（Excelの行番号と一致します）。
    #[error("Invalid record at row {row}: {message}")]
    Record {
        /// エラーが発生した行（1始まり）
        row: usize,
        /// エラーの詳細メッセージ
        message: String,
    },
}
