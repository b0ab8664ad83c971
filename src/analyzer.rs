use crate::card::{Card, DeckStats};
use crate::currency::{to_clp, CurrencyRates};
use crate::price::parse_price;
use crate::ranking::{rank, RankMode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// The normalized comparison for one card, everything in CLP.
///
/// Per-source amounts are kept for display even when they did not win the
/// "best online" spot. The headline pair is `best_online_clp` (cheapest USD
/// marketplace) against `comparison_clp` (the EUR-denominated Cardmarket
/// price); both are always present, cards missing either side never produce
/// a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub name: String,
    pub stats: DeckStats,
    pub cardkingdom_clp: Option<Decimal>,
    pub tcgplayer_clp: Option<Decimal>,
    pub starcitygames_clp: Option<Decimal>,
    pub scryfall_usd_clp: Option<Decimal>,
    pub scryfall_eur_clp: Option<Decimal>,
    pub best_online_clp: Decimal,
    pub comparison_clp: Decimal,
    pub difference_clp: Decimal,
    pub difference_pct: Decimal,
    pub is_good_opportunity: bool,
}

/// Result of one analysis run: ranked records plus the counters the caller
/// needs for a summary line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub records: Vec<ComparisonRecord>,
    pub total_input: usize,
    pub with_complete_prices: usize,
    pub good_opportunities: usize,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Cards dropped for lacking a usable price pair.
    pub fn skipped(&self) -> usize {
        self.total_input - self.with_complete_prices
    }
}

pub struct ArbitrageAnalyzer {
    threshold_clp: Decimal,
}

impl ArbitrageAnalyzer {
    pub fn new(threshold_clp: Decimal) -> Self {
        Self { threshold_clp }
    }

    /// Compute the comparison record for a single card.
    ///
    /// Returns `None` when the card has no parseable USD price or no
    /// parseable EUR price; such cards are excluded from output rather than
    /// carried with null differences.
    pub fn compute(&self, card: &Card, rates: &CurrencyRates) -> Option<ComparisonRecord> {
        let usd_rate = rates.usd_to_clp();
        let cardkingdom_clp = to_clp(parse_price(&card.cardkingdom), usd_rate);
        let tcgplayer_clp = to_clp(parse_price(&card.tcgplayer), usd_rate);
        let starcitygames_clp = to_clp(parse_price(&card.starcitygames), usd_rate);
        let scryfall_usd_clp = to_clp(parse_price(&card.scryfall_usd), usd_rate);
        let scryfall_eur_clp = to_clp(parse_price(&card.scryfall_eur), rates.eur_to_clp());

        let best_online_clp = [
            cardkingdom_clp,
            tcgplayer_clp,
            starcitygames_clp,
            scryfall_usd_clp,
        ]
        .into_iter()
        .flatten()
        .min()?;
        let comparison_clp = scryfall_eur_clp?;

        let difference_clp = best_online_clp - comparison_clp;
        let difference_pct = if best_online_clp.is_zero() {
            Decimal::ZERO
        } else {
            difference_clp / best_online_clp * Decimal::ONE_HUNDRED
        };

        // Only flagged when the comparison marketplace is the cheaper side.
        // A Cardmarket price above the best online price is never an
        // opportunity, no matter how large the gap.
        let is_good_opportunity =
            comparison_clp < best_online_clp && difference_clp >= self.threshold_clp;

        Some(ComparisonRecord {
            name: card.name.clone(),
            stats: card.stats.clone(),
            cardkingdom_clp,
            tcgplayer_clp,
            starcitygames_clp,
            scryfall_usd_clp,
            scryfall_eur_clp,
            best_online_clp,
            comparison_clp,
            difference_clp,
            difference_pct,
            is_good_opportunity,
        })
    }

    /// Analyze a batch of cards against one set of rates.
    ///
    /// Records come back ranked by absolute difference; use
    /// [`rank`](crate::ranking::rank) to re-order by another mode.
    pub fn analyze(&self, cards: &[Card], rates: &CurrencyRates) -> AnalysisResult {
        let mut records = Vec::with_capacity(cards.len());

        for card in cards {
            match self.compute(card, rates) {
                Some(record) => records.push(record),
                None => debug!("skipping '{}': no usable price pair", card.name),
            }
        }

        let with_complete_prices = records.len();
        let good_opportunities = records.iter().filter(|r| r.is_good_opportunity).count();

        rank(&mut records, RankMode::AbsoluteDifference);

        info!(
            "Analyzed {} cards: {} with complete prices, {} good opportunities",
            cards.len(),
            with_complete_prices,
            good_opportunities
        );

        AnalysisResult {
            records,
            total_input: cards.len(),
            with_complete_prices,
            good_opportunities,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use rust_decimal_macros::dec;

    fn rates() -> CurrencyRates {
        CurrencyRates::new(dec!(930), dec!(1000)).unwrap()
    }

    #[test]
    fn computes_the_headline_pair() {
        let card = Card::new("Sol Ring")
            .with_cardkingdom("$3.99")
            .with_scryfall_eur("1.20");
        let record = ArbitrageAnalyzer::new(dec!(1000))
            .compute(&card, &rates())
            .unwrap();

        assert_eq!(record.best_online_clp, dec!(3710.70));
        assert_eq!(record.comparison_clp, dec!(1200.00));
        assert_eq!(record.difference_clp, dec!(2510.70));
        assert!(record.is_good_opportunity);
    }

    #[test]
    fn best_online_is_the_minimum_usd_source() {
        let card = Card::new("Sol Ring")
            .with_cardkingdom("$3.99")
            .with_tcgplayer("$2.50")
            .with_starcitygames("N/A")
            .with_scryfall_usd("3.10")
            .with_scryfall_eur("1.20");
        let record = ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .unwrap();

        assert_eq!(record.best_online_clp, dec!(2325.00));
        assert_eq!(record.cardkingdom_clp, Some(dec!(3710.70)));
        assert_eq!(record.starcitygames_clp, None);
    }

    #[test]
    fn missing_eur_side_drops_the_card() {
        let card = Card::new("Sol Ring").with_cardkingdom("$3.99");
        assert!(ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .is_none());
    }

    #[test]
    fn missing_usd_side_drops_the_card() {
        let card = Card::new("Sol Ring").with_scryfall_eur("1.20");
        assert!(ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .is_none());
    }

    #[test]
    fn one_source_on_each_side_is_enough() {
        let card = Card::new("Sol Ring")
            .with_tcgplayer("$2.50")
            .with_scryfall_eur("1.20");
        assert!(ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .is_some());
    }

    #[test]
    fn percentage_is_zero_when_best_online_is_zero() {
        let card = Card::new("Bulk Common")
            .with_tcgplayer("0")
            .with_scryfall_eur("0.50");
        let record = ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .unwrap();

        assert_eq!(record.difference_pct, Decimal::ZERO);
        assert!(!record.is_good_opportunity);
    }

    #[test]
    fn higher_comparison_price_is_never_an_opportunity() {
        // Cardmarket is the expensive side here. The gap is huge but points
        // the wrong way.
        let card = Card::new("Sol Ring")
            .with_cardkingdom("$1.00")
            .with_scryfall_eur("10.00");
        let record = ArbitrageAnalyzer::new(dec!(0))
            .compute(&card, &rates())
            .unwrap();

        assert!(record.difference_clp < Decimal::ZERO);
        assert!(!record.is_good_opportunity);
    }

    #[test]
    fn threshold_is_inclusive() {
        // difference = 3710.70 - 1200 = 2510.70 exactly at the threshold
        let card = Card::new("Sol Ring")
            .with_cardkingdom("$3.99")
            .with_scryfall_eur("1.20");
        let analyzer = ArbitrageAnalyzer::new(dec!(2510.70));
        assert!(analyzer.compute(&card, &rates()).unwrap().is_good_opportunity);

        let analyzer = ArbitrageAnalyzer::new(dec!(2510.71));
        assert!(!analyzer.compute(&card, &rates()).unwrap().is_good_opportunity);
    }

    #[test]
    fn analyze_counts_dropped_cards() {
        let cards = vec![
            Card::new("Sol Ring")
                .with_cardkingdom("$3.99")
                .with_scryfall_eur("1.20"),
            Card::new("No Data At All"),
            Card::new("Only Usd").with_tcgplayer("$5.00"),
        ];
        let result = ArbitrageAnalyzer::new(dec!(1000)).analyze(&cards, &rates());

        assert_eq!(result.total_input, 3);
        assert_eq!(result.with_complete_prices, 1);
        assert_eq!(result.skipped(), 2);
        assert_eq!(result.good_opportunities, 1);
        assert_eq!(result.records.len(), 1);
    }
}
