use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A currency rate that cannot be used for a run.
///
/// Bad rates are fatal for the whole analysis: a single wrong multiplier
/// would skew every per-card result, so the run aborts before any card work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    #[error("{currency} rate must be positive, got {value}")]
    NotPositive { currency: &'static str, value: Decimal },
    #[error("{currency} rate is not a finite number")]
    NotFinite { currency: &'static str },
}

/// Conversion rates for one analysis run, fetched once and shared read-only.
///
/// Construction is the only validation point: a `CurrencyRates` value always
/// holds strictly positive rates, so downstream code never re-checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRates {
    usd_to_clp: Decimal,
    eur_to_clp: Decimal,
}

impl CurrencyRates {
    pub fn new(usd_to_clp: Decimal, eur_to_clp: Decimal) -> Result<Self, RateError> {
        if usd_to_clp <= Decimal::ZERO {
            return Err(RateError::NotPositive {
                currency: "USD",
                value: usd_to_clp,
            });
        }
        if eur_to_clp <= Decimal::ZERO {
            return Err(RateError::NotPositive {
                currency: "EUR",
                value: eur_to_clp,
            });
        }
        Ok(Self {
            usd_to_clp,
            eur_to_clp,
        })
    }

    /// Build rates from the floats a rate API returns.
    pub fn from_f64(usd_to_clp: f64, eur_to_clp: f64) -> Result<Self, RateError> {
        let usd = Decimal::from_f64(usd_to_clp).ok_or(RateError::NotFinite { currency: "USD" })?;
        let eur = Decimal::from_f64(eur_to_clp).ok_or(RateError::NotFinite { currency: "EUR" })?;
        Self::new(usd, eur)
    }

    pub fn usd_to_clp(&self) -> Decimal {
        self.usd_to_clp
    }

    pub fn eur_to_clp(&self) -> Decimal {
        self.eur_to_clp
    }
}

/// Convert an optional amount to CLP. Absence propagates; a missing price is
/// never turned into a zero. Full precision is kept, rounding happens only at
/// the display boundary.
pub fn to_clp(amount: Option<Decimal>, rate: Decimal) -> Option<Decimal> {
    amount.map(|a| a * rate)
}
