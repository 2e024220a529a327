//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Returns the content hash for main.css, computed at build time.
///
/// Usage in templates: `{{ ""|css_hash }}`
#[askama::filter_fn]
pub fn css_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("CSS_HASH"))
}

/// Returns the content hash for inventory.js, computed at build time.
///
/// Usage in templates: `{{ ""|js_hash }}`
#[askama::filter_fn]
pub fn js_hash(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<&'static str> {
    Ok(env!("JS_HASH"))
}

/// Formats a carat weight with two decimals: `2.05 ct`.
///
/// Usage in templates: `{{ gem.carat|carat }}`
#[askama::filter_fn]
pub fn carat(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_carat(&value.to_string()))
}

/// Formats an amount in US dollars with thousands separators: `$18,500.00`.
///
/// Usage in templates: `{{ price|money }}`
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_money(&value.to_string()))
}

fn format_carat(raw: &str) -> String {
    raw.trim()
        .parse::<f64>()
        .map_or_else(|_| raw.to_string(), |ct| format!("{ct:.2} ct"))
}

pub(crate) fn format_money(raw: &str) -> String {
    let Ok(amount) = raw.trim().parse::<f64>() else {
        return raw.to_string();
    };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_carat() {
        assert_eq!(format_carat("2.05"), "2.05 ct");
        assert_eq!(format_carat("1"), "1.00 ct");
        assert_eq!(format_carat("n/a"), "n/a");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money("18500"), "$18,500.00");
        assert_eq!(format_money("999.5"), "$999.50");
        assert_eq!(format_money("1234567.891"), "$1,234,567.89");
        assert_eq!(format_money("-42"), "-$42.00");
        assert_eq!(format_money("0"), "$0.00");
    }
}
