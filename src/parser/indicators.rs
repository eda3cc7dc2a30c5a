//! Indicator Grid Parser
//!
//! 生のグリッド（1行目が期間ラベル、2行目以降が1行1指標）を
//! `NormalizedModel`へ変換します。

use log::debug;

use crate::error::FunnelError;
use crate::normalize::normalize_cell;
use crate::types::{Cell, Indicator, NormalizedModel, Period, SeriesPoint};

/// グリッドを解析して正規化済みモデルを生成
///
/// # 引数
///
/// * `grid` - 最初のシートから取り出した2次元のセル配列
/// * `placeholders` - 欠損として扱うトークン
///
/// # 戻り値
///
/// * `Ok(NormalizedModel)` - 解析結果
/// * `Err(FunnelError::EmptySource)` - ヘッダー行が存在しない場合
///
/// # 行の扱い
///
/// - 1行目の2列目以降が期間ラベルになります（1列目は指標名の列）
/// - セルが2つ未満の行はスキップされます（エラーにはなりません）
/// - 値セルが期間ラベルより多い場合、超過分の期間は`None`になります
pub(crate) fn parse_indicator_grid(
    grid: &[Vec<Cell>],
    placeholders: &[String],
) -> Result<NormalizedModel, FunnelError> {
    let header = grid
        .first()
        .ok_or_else(|| FunnelError::EmptySource("grid has no header row".to_string()))?;

    let periods: Vec<Period> = header
        .iter()
        .skip(1)
        .map(|cell| Period::new(cell.to_label()))
        .collect();

    let mut indicators = Vec::new();
    let mut skipped = 0usize;

    for row in &grid[1..] {
        if row.len() < 2 {
            skipped += 1;
            continue;
        }

        let series = row[1..]
            .iter()
            .enumerate()
            .map(|(idx, cell)| SeriesPoint {
                period: periods.get(idx).cloned(),
                value: normalize_cell(cell, placeholders),
            })
            .collect();

        indicators.push(Indicator {
            name: row[0].to_label(),
            series,
        });
    }

    debug!(
        "parsed {} periods, {} indicators ({} short rows skipped)",
        periods.len(),
        indicators.len(),
        skipped
    );

    Ok(NormalizedModel {
        periods,
        indicators,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DEFAULT_PLACEHOLDERS;
    use crate::types::NormalizedValue;

    fn defaults() -> Vec<String> {
        DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect()
    }

    fn text_grid(rows: &[&[&str]]) -> Vec<Vec<Cell>> {
        rows.iter()
            .map(|row| row.iter().map(|s| Cell::from(*s)).collect())
            .collect()
    }

    #[test]
    fn test_scenario_grid() {
        let grid = text_grid(&[&["", "P1", "P2"], &["A", "10", "20"], &["B", "5%", "/"]]);
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();

        assert_eq!(model.periods, vec![Period::from("P1"), Period::from("P2")]);
        assert_eq!(model.indicators.len(), 2);

        let a = &model.indicators[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.series[0].period, Some(Period::from("P1")));
        assert_eq!(a.series[0].value, NormalizedValue::Number(10.0));
        assert_eq!(a.series[1].value, NormalizedValue::Number(20.0));

        let b = &model.indicators[1];
        assert_eq!(b.name, "B");
        assert_eq!(b.series[0].value, NormalizedValue::Number(0.05));
        assert_eq!(b.series[1].period, Some(Period::from("P2")));
        assert_eq!(b.series[1].value, NormalizedValue::Missing);
    }

    #[test]
    fn test_empty_grid_is_error() {
        let result = parse_indicator_grid(&[], &defaults());
        assert!(matches!(result, Err(FunnelError::EmptySource(_))));
    }

    #[test]
    fn test_header_only() {
        let grid = text_grid(&[&["", "P1"]]);
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        assert_eq!(model.periods.len(), 1);
        assert!(model.indicators.is_empty());
    }

    #[test]
    fn test_empty_header_row_has_no_periods() {
        let grid = vec![vec![], vec![Cell::from("A"), Cell::from("1")]];
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        assert!(model.periods.is_empty());
        assert_eq!(model.indicators[0].series[0].period, None);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let grid = vec![
            vec![Cell::Empty, Cell::from("P1")],
            vec![],
            vec![Cell::from("OnlyName")],
            vec![Cell::from("A"), Cell::Number(3.0)],
        ];
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        assert_eq!(model.indicators.len(), 1);
        assert_eq!(model.indicators[0].name, "A");
    }

    #[test]
    fn test_excess_values_have_no_period() {
        let grid = text_grid(&[&["", "P1"], &["A", "1", "2", "3"]]);
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        let series = &model.indicators[0].series;

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].period, Some(Period::from("P1")));
        assert_eq!(series[1].period, None);
        assert_eq!(series[2].period, None);
        assert_eq!(series[2].value, NormalizedValue::Number(3.0));
    }

    #[test]
    fn test_series_is_not_padded_to_periods() {
        let grid = text_grid(&[&["", "P1", "P2", "P3"], &["A", "1"]]);
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        assert_eq!(model.indicators[0].series.len(), 1);
    }

    #[test]
    fn test_numeric_labels_and_names() {
        let grid = vec![
            vec![Cell::Empty, Cell::Number(2024.0), Cell::from("P2")],
            vec![Cell::Number(7.0), Cell::Number(1.5), Cell::Empty],
        ];
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();

        assert_eq!(model.periods[0], Period::from("2024"));
        assert_eq!(model.indicators[0].name, "7");
        assert_eq!(model.indicators[0].series[1].value, NormalizedValue::Missing);
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let grid = text_grid(&[&["", "P1"], &["A", "1"], &["A", "2"]]);
        let model = parse_indicator_grid(&grid, &defaults()).unwrap();
        assert_eq!(model.indicators.len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn cell_strategy() -> impl Strategy<Value = Cell> {
            prop_oneof![
                Just(Cell::Empty),
                (-1.0e6f64..1.0e6f64).prop_map(Cell::Number),
                "[ -/%0-9a-z]{0,6}".prop_map(Cell::Text),
            ]
        }

        fn grid_strategy() -> impl Strategy<Value = Vec<Vec<Cell>>> {
            prop::collection::vec(prop::collection::vec(cell_strategy(), 0..8), 1..12)
        }

        proptest! {
            #[test]
            fn test_period_count_matches_header(grid in grid_strategy()) {
                let model = parse_indicator_grid(&grid, &defaults()).unwrap();
                prop_assert_eq!(model.periods.len(), grid[0].len().saturating_sub(1));
            }

            #[test]
            fn test_only_rows_with_two_cells_are_kept(grid in grid_strategy()) {
                let model = parse_indicator_grid(&grid, &defaults()).unwrap();
                let kept: Vec<&Vec<Cell>> = grid[1..].iter().filter(|row| row.len() >= 2).collect();

                prop_assert_eq!(model.indicators.len(), kept.len());
                for (indicator, row) in model.indicators.iter().zip(kept) {
                    prop_assert_eq!(indicator.series.len(), row.len() - 1);
                }
            }

            #[test]
            fn test_numeric_rows_round_trip(values in prop::collection::vec(-1.0e9f64..1.0e9f64, 1..10)) {
                let mut header = vec![Cell::Empty];
                header.extend((0..values.len()).map(|i| Cell::from(format!("P{}", i))));
                let mut row = vec![Cell::from("Metric")];
                row.extend(values.iter().map(|v| Cell::from(v.to_string())));

                let model = parse_indicator_grid(&[header, row], &defaults()).unwrap();
                let series = &model.indicators[0].series;
                for (point, expected) in series.iter().zip(&values) {
                    let actual = point.value.as_number().unwrap();
                    prop_assert!((actual - expected).abs() <= 1e-9 * expected.abs().max(1.0));
                }
            }
        }
    }
}
