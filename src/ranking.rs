use crate::analyzer::ComparisonRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// How to order the comparison table.
///
/// Magnitude-first surfaces the most actionable gap regardless of direction;
/// signed-first puts the largest positive gap (cheapest on Cardmarket) on
/// top. Different consumers rely on each, so both are exposed and the caller
/// chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankMode {
    AbsoluteDifference,
    SignedDifference,
}

#[derive(Debug, Error)]
#[error("unknown rank mode '{0}', expected 'abs' or 'signed'")]
pub struct ParseRankModeError(String);

impl FromStr for RankMode {
    type Err = ParseRankModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abs" | "absolute" | "magnitude" => Ok(RankMode::AbsoluteDifference),
            "signed" => Ok(RankMode::SignedDifference),
            other => Err(ParseRankModeError(other.to_string())),
        }
    }
}

/// Order records descending by the chosen difference key. The sort is stable,
/// so ties keep their original input order and identical inputs always
/// produce identical output.
pub fn rank(records: &mut [ComparisonRecord], mode: RankMode) {
    match mode {
        RankMode::AbsoluteDifference => {
            records.sort_by(|a, b| b.difference_clp.abs().cmp(&a.difference_clp.abs()))
        }
        RankMode::SignedDifference => {
            records.sort_by(|a, b| b.difference_clp.cmp(&a.difference_clp))
        }
    }
}

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------
//
// Pure projections for the presentation boundary. Comparison and threshold
// logic always operates on the underlying Decimal values, never on these
// strings.

/// CLP amounts display with thousands separators and no decimals.
pub fn format_clp(amount: Option<Decimal>) -> String {
    match amount {
        Some(a) => group_thousands(&a.round_dp(0).to_string()),
        None => "N/A".to_string(),
    }
}

/// Signed CLP difference, always with an explicit sign prefix.
pub fn format_clp_diff(amount: Decimal) -> String {
    let rounded = amount.round_dp(0);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{}", group_thousands(&rounded.abs().to_string()))
    } else {
        format!("+{}", group_thousands(&rounded.abs().to_string()))
    }
}

pub fn format_usd(amount: Option<Decimal>) -> String {
    match amount {
        Some(a) => format!("${:.2}", a.round_dp(2)),
        None => "N/A".to_string(),
    }
}

pub fn format_eur(amount: Option<Decimal>) -> String {
    match amount {
        Some(a) => format!("€{:.2}", a.round_dp(2)),
        None => "N/A".to_string(),
    }
}

/// Signed percentage with two decimals.
pub fn format_pct(pct: Decimal) -> String {
    let rounded = pct.round_dp(2);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-{:.2}%", rounded.abs())
    } else {
        format!("+{:.2}%", rounded.abs())
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let len = digits.len();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
