use anyhow::Result;
use mtg_arbitrage_finder::{
    analyzer::{ArbitrageAnalyzer, ComparisonRecord},
    clients::{CurrencyClient, EdhrecClient, ScryfallClient, TimePeriod},
    offers::OfferFinder,
    ranking::{self, RankMode},
};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_THRESHOLD_CLP: u32 = 1000;
const DEFAULT_NUM_CARDS: usize = 100;
const MAX_NUM_CARDS: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting MTG card arbitrage finder");

    // Load environment variables
    dotenv::dotenv().ok();

    let threshold_clp = env_parsed("CLP_THRESHOLD", Decimal::from(DEFAULT_THRESHOLD_CLP));
    let num_cards = env_parsed("NUM_CARDS", DEFAULT_NUM_CARDS).clamp(1, MAX_NUM_CARDS);
    let period = env_parsed("EDHREC_PERIOD", TimePeriod::Week);
    let rank_mode = env_parsed("RANK_MODE", RankMode::AbsoluteDifference);

    info!(
        "Configuration: threshold = {} CLP, cards = {}, period = {}",
        threshold_clp,
        num_cards,
        period.as_path()
    );

    // Rates come first. Without valid rates every per-card number would be
    // wrong, so a failure here aborts the run before any card work.
    let rates = match CurrencyClient::new().fetch_rates().await {
        Ok(rates) => rates,
        Err(e) => {
            error!("Could not fetch currency rates: {:#}", e);
            return Err(e);
        }
    };

    let cards = EdhrecClient::new().fetch_top_cards(period, num_cards).await?;
    if cards.is_empty() {
        anyhow::bail!("EDHREC returned no cards, nothing to analyze");
    }

    info!("Fetching Scryfall prices for {} cards...", cards.len());
    let cards = ScryfallClient::new().attach_prices(cards).await;

    let analyzer = ArbitrageAnalyzer::new(threshold_clp);
    let mut result = analyzer.analyze(&cards, &rates);
    ranking::rank(&mut result.records, rank_mode);

    print_table(&result.records);

    info!(
        "Done: {} cards in, {} with complete prices, {} skipped, {} good opportunities",
        result.total_input,
        result.with_complete_prices,
        result.skipped(),
        result.good_opportunities
    );

    // Optionally chase the top opportunity down to a concrete listing via the
    // external offer finder.
    if let Ok(command) = std::env::var("OFFER_FINDER_CMD") {
        let finder = OfferFinder::new(command);
        if let Some(top) = result.records.iter().find(|r| r.is_good_opportunity) {
            match finder.find_best_offer(&top.name).await {
                Ok(offer) => info!(
                    "Best offer for '{}': {} ({}) at €{} total",
                    offer.card_name, offer.seller_name, offer.country, offer.total_price
                ),
                Err(e) => warn!("Offer lookup for '{}' failed: {}", top.name, e),
            }
        }
    }

    Ok(())
}

/// Read an env var, falling back to a default on absence and warning on a
/// value that does not parse.
fn env_parsed<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparseable {}='{}'", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn print_table(records: &[ComparisonRecord]) {
    if records.is_empty() {
        println!("No cards with complete price data.");
        return;
    }

    println!(
        "{:<4} {:<32} {:>12} {:>12} {:>12} {:>10} {:>9} {:^6}",
        "#", "Card", "Best online", "Cardmarket", "Diff (CLP)", "Diff (%)", "Decks", "Opp"
    );
    for (i, record) in records.iter().enumerate() {
        let decks = record
            .stats
            .deck_count
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{:<4} {:<32} {:>12} {:>12} {:>12} {:>10} {:>9} {:^6}",
            i + 1,
            record.name,
            ranking::format_clp(Some(record.best_online_clp)),
            ranking::format_clp(Some(record.comparison_clp)),
            ranking::format_clp_diff(record.difference_clp),
            ranking::format_pct(record.difference_pct),
            decks,
            if record.is_good_opportunity { "yes" } else { "" }
        );
    }
}
