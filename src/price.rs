use crate::card::RawPrice;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::OnceLock;

// Optional $ or € symbol, digits with optional thousands separators, optional
// decimal fraction. No sign: anything negative-looking fails the match and is
// treated as absent.
static PRICE_RE: OnceLock<Regex> = OnceLock::new();

fn price_re() -> &'static Regex {
    PRICE_RE.get_or_init(|| {
        Regex::new(r"^[$€]?\s*(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?$").expect("price pattern compiles")
    })
}

/// Normalize a raw price observation into an exact decimal amount.
///
/// Returns `None` for anything that is not a well-formed non-negative price:
/// missing values, "N/A" placeholders, malformed strings, negative numbers,
/// NaN. Parse failures are data-quality events, not errors; the caller keeps
/// going with whatever sources did parse.
pub fn parse_price(raw: &RawPrice) -> Option<Decimal> {
    match raw {
        RawPrice::Absent => None,
        RawPrice::Number(n) => {
            if !n.is_finite() || *n < 0.0 {
                return None;
            }
            Decimal::from_f64(*n)
        }
        RawPrice::Text(s) => parse_price_str(s),
    }
}

/// String half of [`parse_price`]. Strips a known currency symbol and
/// thousands separators before conversion.
pub fn parse_price_str(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        return None;
    }
    let caps = price_re().captures(trimmed)?;
    let integral = caps[1].replace(',', "");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    format!("{integral}{fraction}").parse().ok()
}
