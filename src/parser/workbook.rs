//! Workbook Source
//!
//! calamineを使用してワークブックを開き、最初のシートを生のグリッドとして
//! 取り出します。XLSX / XLS / ODS の各形式に対応します。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use log::debug;
use std::io::{Cursor, Read};

use crate::error::FunnelError;
use crate::security::SourceLimits;
use crate::types::Cell;

/// ワークブックの読み込み元
///
/// 入力全体をメモリに読み込み、サイズ制限を検証してから calamine に渡します。
pub struct WorkbookSource {
    /// calamineのワークブック（形式は自動判定）
    sheets: Sheets<Cursor<Vec<u8>>>,
    /// 入力サイズの制限
    limits: SourceLimits,
}

impl WorkbookSource {
    /// ワークブックを開く
    ///
    /// # 引数
    ///
    /// * `reader` - ワークブックのバイト列を読み込むリーダー
    /// * `limits` - 入力サイズの制限
    ///
    /// # 戻り値
    ///
    /// * `Ok(WorkbookSource)` - 読み込みに成功した場合
    /// * `Err(FunnelError::LimitExceeded)` - 入力サイズが上限を超えた場合
    /// * `Err(FunnelError::Workbook)` - ワークブックとして解釈できない場合
    pub fn open<R: Read>(mut reader: R, limits: SourceLimits) -> Result<Self, FunnelError> {
        let mut buffer = Vec::new();
        let bytes_read = reader.read_to_end(&mut buffer)?;
        limits.check_input_size(bytes_read as u64)?;

        let sheets = open_workbook_auto_from_rs(Cursor::new(buffer))?;

        Ok(Self { sheets, limits })
    }

    /// すべてのシート名を取得
    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names().to_vec()
    }

    /// 最初のシートのセル範囲を取得
    pub(crate) fn first_sheet_range(&mut self) -> Result<Range<Data>, FunnelError> {
        let first = self
            .sheet_names()
            .into_iter()
            .next()
            .ok_or_else(|| FunnelError::EmptySource("workbook has no sheets".to_string()))?;

        let range = self.sheets.worksheet_range(&first)?;
        let (rows, cols) = range.get_size();
        self.limits.check_sheet_shape(rows, cols)?;

        debug!("reading sheet '{}' ({} rows x {} cols)", first, rows, cols);
        Ok(range)
    }

    /// 最初のシートを生のグリッドとして取得
    ///
    /// # グリッドの形
    ///
    /// - 使用範囲の左上セルを起点とします（使用範囲より前の空行・空列は含みません）
    /// - 各行の末尾の空セルは除去されます（空行は長さ0になります）
    pub fn first_sheet_grid(&mut self) -> Result<Vec<Vec<Cell>>, FunnelError> {
        let range = self.first_sheet_range()?;
        Ok(range_to_grid(&range))
    }
}

/// セル範囲を使用範囲の左上起点のグリッドに変換
///
/// 表がC3から始まる場合でも、C3がグリッドの`[0][0]`になります。
pub(crate) fn range_to_grid(range: &Range<Data>) -> Vec<Vec<Cell>> {
    range
        .rows()
        .map(|row| {
            let mut cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
            while matches!(cells.last(), Some(Cell::Empty)) {
                cells.pop();
            }
            cells
        })
        .collect()
}

/// calamineのセル値を`Cell`に変換
pub(crate) fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(datetime) => Cell::Text(format_datetime(datetime)),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}

/// Excelのシリアル値（1900年システム）を日時に変換
///
/// 1899年12月30日を起点とします。1900年3月1日以降の日付で正確です。
pub(crate) fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 9999-12-31 = 2958465
    if !serial.is_finite() || !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.floor() as i64;
    let seconds = ((serial - serial.floor()) * 86_400.0).round() as i64;

    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::seconds(seconds))
}

/// 時刻部分が0なら日付のみ、そうでなければ日時として出力
fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.time().num_seconds_from_midnight() == 0 {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_serial_to_datetime() {
        let datetime = excel_serial_to_datetime(45831.0).unwrap();
        assert_eq!(datetime.format("%Y-%m-%d").to_string(), "2025-06-23");

        let noon = excel_serial_to_datetime(45831.5).unwrap();
        assert_eq!(noon.format("%H:%M:%S").to_string(), "12:00:00");

        assert!(excel_serial_to_datetime(-1.0).is_none());
        assert!(excel_serial_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_format_datetime() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 23).unwrap();
        assert_eq!(format_datetime(date.and_hms_opt(0, 0, 0).unwrap()), "2025-06-23");
        assert_eq!(
            format_datetime(date.and_hms_opt(9, 30, 0).unwrap()),
            "2025-06-23 09:30:00"
        );
    }

    #[test]
    fn test_data_to_cell() {
        assert_eq!(data_to_cell(&Data::Empty), Cell::Empty);
        assert_eq!(data_to_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(data_to_cell(&Data::Float(0.5)), Cell::Number(0.5));
        assert_eq!(
            data_to_cell(&Data::String("12%".to_string())),
            Cell::from("12%")
        );
        assert_eq!(data_to_cell(&Data::Bool(true)), Cell::from("true"));
    }

    #[test]
    fn test_range_to_grid_starts_at_used_range_and_trims() {
        // B2:C3 の範囲（A列と1行目は空）
        let mut range: Range<Data> = Range::new((1, 1), (2, 2));
        range.set_value((1, 2), Data::String("P1".to_string()));
        range.set_value((2, 1), Data::String("A".to_string()));
        range.set_value((2, 2), Data::Float(4.0));

        let grid = range_to_grid(&range);

        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0], vec![Cell::Empty, Cell::from("P1")]);
        assert_eq!(grid[1], vec![Cell::from("A"), Cell::Number(4.0)]);
    }

    #[test]
    fn test_range_to_grid_keeps_blank_rows_inside_range() {
        let mut range: Range<Data> = Range::new((4, 0), (6, 1));
        range.set_value((4, 1), Data::String("P1".to_string()));
        range.set_value((6, 0), Data::String("A".to_string()));

        let grid = range_to_grid(&range);

        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec![Cell::Empty, Cell::from("P1")]);
        assert!(grid[1].is_empty());
        assert_eq!(grid[2], vec![Cell::from("A")]);
    }

    #[test]
    fn test_range_to_grid_empty_range() {
        let range: Range<Data> = Range::empty();
        assert!(range_to_grid(&range).is_empty());
    }

    #[test]
    fn test_open_rejects_oversized_input() {
        let limits = SourceLimits {
            max_input_bytes: 4,
            ..SourceLimits::default()
        };
        let result = WorkbookSource::open(Cursor::new(vec![0u8; 16]), limits);
        assert!(matches!(result, Err(FunnelError::LimitExceeded(_))));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let result = WorkbookSource::open(Cursor::new(b"not a workbook".to_vec()), SourceLimits::default());
        assert!(result.is_err());
    }
}
