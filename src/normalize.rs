//! Cell Normalization Module
//!
//! 生のセル値を`NormalizedValue`へ変換するモジュール。
//!
//! テキストセルは次の優先順位で解釈されます（`TextReading`の各バリアントに対応）:
//!
//! 1. `%`で終わる → パーセント（100で割った小数）
//! 2. プレースホルダー（既定: `/`、空文字列、`-`） → 欠損
//! 3. 全体が数値として解釈できる → 数値
//! 4. それ以外 → トリム済みテキストをそのまま保持

use crate::types::{Cell, NormalizedValue};

/// 既定のプレースホルダー（「データなし」を表すトークン）
pub const DEFAULT_PLACEHOLDERS: [&str; 3] = ["/", "", "-"];

/// トリム済みテキストの解釈結果
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TextReading<'a> {
    /// パーセント表記（既に100で割った値。解釈に失敗した場合はNaN）
    Percent(f64),

    /// 欠損を表すプレースホルダー
    Placeholder,

    /// 数値
    Numeric(f64),

    /// 数値として解釈できないテキスト
    Raw(&'a str),
}

/// トリム済みテキストを分類する
///
/// # 引数
///
/// * `trimmed` - 前後の空白を除去したテキスト
/// * `placeholders` - 欠損として扱うトークン
pub(crate) fn classify_text<'a>(trimmed: &'a str, placeholders: &[String]) -> TextReading<'a> {
    if trimmed.ends_with('%') {
        // 最初の`%`のみを除去し、残りを寛容に解釈する
        let without_sign = trimmed.replacen('%', "", 1);
        return TextReading::Percent(parse_float_prefix(&without_sign) / 100.0);
    }

    if placeholders.iter().any(|token| token == trimmed) {
        return TextReading::Placeholder;
    }

    match parse_number(trimmed) {
        Some(n) => TextReading::Numeric(n),
        None => TextReading::Raw(trimmed),
    }
}

/// 1つのセルを正規化する
///
/// 数値セルはそのまま、空セルは欠損になります。テキストセルは
/// `classify_text`の結果に従い、最終的に空文字列が残った場合は欠損に変換します。
pub(crate) fn normalize_cell(cell: &Cell, placeholders: &[String]) -> NormalizedValue {
    match cell {
        Cell::Empty => NormalizedValue::Missing,
        Cell::Number(n) => NormalizedValue::Number(*n),
        Cell::Text(text) => match classify_text(text.trim(), placeholders) {
            TextReading::Percent(n) | TextReading::Numeric(n) => NormalizedValue::Number(n),
            TextReading::Placeholder => NormalizedValue::Missing,
            TextReading::Raw("") => NormalizedValue::Missing,
            TextReading::Raw(raw) => NormalizedValue::Text(raw.to_string()),
        },
    }
}

/// テキスト全体を数値として解釈する
///
/// 10進数（符号・小数点・指数）、`Infinity`、`0x`/`0o`/`0b`接頭辞付きの整数を
/// 受け付けます。`inf`や`NaN`のような綴りは数値として扱いません。
///
/// # 戻り値
///
/// * `Some(f64)` - テキスト全体が数値だった場合
/// * `None` - 空文字列、または数値でない場合
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let s = text.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(value) = parse_radix_literal(s) {
        return Some(value);
    }

    let unsigned = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    if unsigned == "Infinity" {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    if !unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }

    s.parse::<f64>().ok()
}

/// `0x1F`、`0o17`、`0b101`形式の整数（符号なし）
///
/// 桁数に上限は無く、u64を超える値もf64の近似値になります。
fn parse_radix_literal(s: &str) -> Option<f64> {
    let prefix = s.get(..2)?;
    let radix = match prefix {
        "0x" | "0X" => 16,
        "0o" | "0O" => 8,
        "0b" | "0B" => 2,
        _ => return None,
    };

    let digits = &s[2..];
    if digits.is_empty() {
        return None;
    }

    digits.chars().try_fold(0.0f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc * f64::from(radix) + f64::from(d))
    })
}

/// テキスト先頭の数値部分を寛容に解釈する
///
/// 先頭の空白を読み飛ばし、可能な限り長い10進数の接頭辞を数値とします
/// （`12abc` → 12）。数字が1つも無い場合はNaNを返します。
pub(crate) fn parse_float_prefix(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    if s[end..].starts_with("Infinity") {
        return if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while end < len && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < len && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            end = j;
        }
    }

    if digits == 0 {
        return f64::NAN;
    }

    if end < len && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect()
    }

    fn normalize_text(text: &str) -> NormalizedValue {
        normalize_cell(&Cell::from(text), &defaults())
    }

    #[test]
    fn test_percent_cells() {
        assert_eq!(normalize_text("12%"), NormalizedValue::Number(0.12));
        assert_eq!(normalize_text("0%"), NormalizedValue::Number(0.0));
        assert_eq!(normalize_text(" 5% "), NormalizedValue::Number(0.05));
        assert_eq!(normalize_text("-2.5%"), NormalizedValue::Number(-0.025));
    }

    #[test]
    fn test_percent_with_trailing_garbage_uses_prefix() {
        assert_eq!(normalize_text("12abc%"), NormalizedValue::Number(0.12));
    }

    #[test]
    fn test_malformed_percent_is_nan_not_missing() {
        match normalize_text("abc%") {
            NormalizedValue::Number(n) => assert!(n.is_nan()),
            other => panic!("Expected NaN number, got {:?}", other),
        }
        match normalize_text("%") {
            NormalizedValue::Number(n) => assert!(n.is_nan()),
            other => panic!("Expected NaN number, got {:?}", other),
        }
    }

    #[test]
    fn test_placeholders_are_missing() {
        assert_eq!(normalize_text("/"), NormalizedValue::Missing);
        assert_eq!(normalize_text(""), NormalizedValue::Missing);
        assert_eq!(normalize_text("-"), NormalizedValue::Missing);
        assert_eq!(normalize_text("   "), NormalizedValue::Missing);
        assert_eq!(normalize_text(" / "), NormalizedValue::Missing);
    }

    #[test]
    fn test_empty_text_is_missing_without_placeholders() {
        assert_eq!(
            normalize_cell(&Cell::from("  "), &[]),
            NormalizedValue::Missing
        );
    }

    #[test]
    fn test_numeric_text() {
        assert_eq!(normalize_text("10"), NormalizedValue::Number(10.0));
        assert_eq!(normalize_text(" 25.5 "), NormalizedValue::Number(25.5));
        assert_eq!(normalize_text("1e3"), NormalizedValue::Number(1000.0));
        assert_eq!(normalize_text(".5"), NormalizedValue::Number(0.5));
        assert_eq!(normalize_text("0x1F"), NormalizedValue::Number(31.0));
        assert_eq!(
            normalize_text("-Infinity"),
            NormalizedValue::Number(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_raw_text_passes_through_trimmed() {
        assert_eq!(
            normalize_text("  n/a "),
            NormalizedValue::Text("n/a".to_string())
        );
        assert_eq!(normalize_text("NaN"), NormalizedValue::Text("NaN".to_string()));
        assert_eq!(normalize_text("inf"), NormalizedValue::Text("inf".to_string()));
        assert_eq!(normalize_text("12abc"), NormalizedValue::Text("12abc".to_string()));
    }

    #[test]
    fn test_non_text_cells() {
        assert_eq!(
            normalize_cell(&Cell::Number(42.0), &defaults()),
            NormalizedValue::Number(42.0)
        );
        assert_eq!(
            normalize_cell(&Cell::Empty, &defaults()),
            NormalizedValue::Missing
        );
    }

    #[test]
    fn test_classify_precedence_percent_before_placeholder() {
        // `%`で終わるトークンはプレースホルダーより先に判定される
        let placeholders = vec!["-%".to_string()];
        assert!(matches!(
            classify_text("-%", &placeholders),
            TextReading::Percent(n) if n.is_nan()
        ));
    }

    #[test]
    fn test_custom_placeholders() {
        let placeholders = vec!["N/A".to_string()];
        assert_eq!(classify_text("N/A", &placeholders), TextReading::Placeholder);
        assert_eq!(classify_text("/", &placeholders), TextReading::Raw("/"));
    }

    #[test]
    fn test_radix_literal_beyond_u64() {
        // 16^20 = 2^80
        let text = format!("0x1{}", "0".repeat(20));
        assert_eq!(normalize_text(&text), NormalizedValue::Number(2f64.powi(80)));

        let max = normalize_text("0xFFFFFFFFFFFFFFFFF").as_number().unwrap();
        assert!((max - 16f64.powi(17)).abs() <= 16f64.powi(17) * 1e-12);
    }

    #[test]
    fn test_parse_number_rejects_partial() {
        assert_eq!(parse_number("1-2"), None);
        assert_eq!(parse_number("e5"), None);
        assert_eq!(parse_number("0x"), None);
        assert_eq!(parse_number("0b101"), Some(5.0));
        assert_eq!(parse_number("0o17"), Some(15.0));
        assert_eq!(parse_number("0xZZ"), None);
        assert_eq!(parse_number("+-1"), None);
        assert_eq!(parse_number(""), None);
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("  3.5kg"), 3.5);
        assert_eq!(parse_float_prefix("7."), 7.0);
        assert_eq!(parse_float_prefix("2e2x"), 200.0);
        assert_eq!(parse_float_prefix("2e"), 2.0);
        assert_eq!(parse_float_prefix("Infinity"), f64::INFINITY);
        assert!(parse_float_prefix("").is_nan());
        assert!(parse_float_prefix(".").is_nan());
        assert!(parse_float_prefix("-").is_nan());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_percent_is_divided_by_hundred(x in -1.0e6f64..1.0e6f64) {
                let text = format!("{}%", x);
                match normalize_text(&text) {
                    NormalizedValue::Number(n) => {
                        let expected = x / 100.0;
                        prop_assert!((n - expected).abs() <= 1e-9 * expected.abs().max(1.0));
                    }
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }

            #[test]
            fn test_numeric_text_round_trips(x in -1.0e9f64..1.0e9f64) {
                prop_assert_eq!(normalize_text(&x.to_string()), NormalizedValue::Number(x));
            }

            #[test]
            fn test_letters_before_percent_yield_nan(word in "[a-zA-Z]{1,8}") {
                prop_assume!(!word.starts_with("Infinity"));
                let text = format!("{}%", word);
                match normalize_text(&text) {
                    NormalizedValue::Number(n) => prop_assert!(n.is_nan()),
                    other => prop_assert!(false, "unexpected {:?}", other),
                }
            }

            #[test]
            fn test_never_produces_empty_text(text in "\\PC{0,12}") {
                prop_assert_ne!(normalize_text(&text), NormalizedValue::Text(String::new()));
            }
        }
    }
}
