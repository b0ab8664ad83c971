// Core modules
pub mod analyzer;
pub mod card;
pub mod clients;
pub mod currency;
pub mod offers;
pub mod price;
pub mod ranking;

// Re-exports
pub use analyzer::{AnalysisResult, ArbitrageAnalyzer, ComparisonRecord};
pub use card::{Card, DeckStats, RawPrice};
pub use clients::{CurrencyClient, EdhrecClient, ScryfallClient, ScryfallPrices, TimePeriod};
pub use currency::{to_clp, CurrencyRates, RateError};
pub use offers::{Offer, OfferError, OfferFinder};
pub use price::{parse_price, parse_price_str};
pub use ranking::{
    format_clp, format_clp_diff, format_eur, format_pct, format_usd, rank, RankMode,
};
