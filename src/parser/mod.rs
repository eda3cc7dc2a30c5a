//! Parser Module
//!
//! 指標スプレッドシートの読み込みと正規化の実装。
//! calamineでワークブックから生のグリッドを取り出し、時系列モデルへ変換します。

mod indicators;
mod workbook;

pub(crate) use indicators::parse_indicator_grid;
pub(crate) use workbook::excel_serial_to_datetime;
pub use workbook::WorkbookSource;
