use crate::card::{Card, DeckStats, RawPrice};
use crate::currency::CurrencyRates;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

const EDHREC_BASE_URL: &str = "https://json.edhrec.com/pages/top";
const SCRYFALL_API_URL: &str = "https://api.scryfall.com/cards/named";
const CURRENCY_API_URL: &str = "https://api.frankfurter.app/latest";

const USER_AGENT: &str = "mtg-arbitrage-finder/0.1";

// Scryfall asks for at most 10 requests per second.
const SCRYFALL_MIN_GAP: Duration = Duration::from_millis(100);
const SCRYFALL_MAX_IN_FLIGHT: usize = 4;

// Fuzzy lookups may return a different card than asked for; only accept
// near-identical names.
const NAME_MATCH_THRESHOLD: f64 = 0.90;

fn pooled_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new()) // Fallback to default if builder fails
}

/// EDHREC time window for the top-cards listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    Week,
    Month,
    AllTime,
}

impl TimePeriod {
    pub fn as_path(&self) -> &'static str {
        match self {
            TimePeriod::Week => "week",
            TimePeriod::Month => "month",
            TimePeriod::AllTime => "all",
        }
    }
}

impl FromStr for TimePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace(' ', "_").as_str() {
            "week" => Ok(TimePeriod::Week),
            "month" => Ok(TimePeriod::Month),
            "all" | "all_time" => Ok(TimePeriod::AllTime),
            other => anyhow::bail!("unknown time period '{other}', expected week, month or all"),
        }
    }
}

// EDHREC client
pub struct EdhrecClient {
    http_client: Client,
    base_url: String,
}

impl EdhrecClient {
    pub fn new() -> Self {
        Self {
            http_client: pooled_client(),
            base_url: EDHREC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch the most popular commander cards for the given period, with the
    /// marketplace price strings and deck statistics EDHREC lists alongside
    /// each name.
    pub async fn fetch_top_cards(&self, period: TimePeriod, limit: usize) -> Result<Vec<Card>> {
        let url = format!("{}/{}.json", self.base_url, period.as_path());
        info!("Fetching top {} cards from EDHREC ({})", limit, period.as_path());

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch EDHREC top cards")?;

        if !response.status().is_success() {
            anyhow::bail!("EDHREC returned {}", response.status());
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse EDHREC response")?;

        let cards = extract_top_cards(&data, limit);
        if cards.is_empty() {
            warn!("EDHREC response contained no card entries");
        } else {
            info!("Fetched {} card names from EDHREC", cards.len());
        }
        Ok(cards)
    }
}

impl Default for EdhrecClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull cards out of the EDHREC page JSON.
pub(crate) fn extract_top_cards(data: &Value, limit: usize) -> Vec<Card> {
    let mut cards = Vec::new();

    let Some(cardlists) = data["container"]["json_dict"]["cardlists"].as_array() else {
        return cards;
    };

    for cardlist in cardlists {
        let Some(cardviews) = cardlist["cardviews"].as_array() else {
            continue;
        };
        for cardview in cardviews {
            if cards.len() >= limit {
                return cards;
            }
            let Some(name) = cardview["name"].as_str() else {
                continue;
            };

            let prices = &cardview["prices"];
            let stats = DeckStats {
                deck_count: cardview["num_decks"].as_u64(),
                deck_percentage: deck_percentage(cardview),
                total_decks: cardview["potential_decks"].as_u64(),
            };

            cards.push(
                Card::new(name)
                    .with_cardkingdom(vendor_price(prices, "cardkingdom"))
                    .with_tcgplayer(vendor_price(prices, "tcgplayer"))
                    .with_starcitygames(vendor_price(prices, "starcitygames"))
                    .with_stats(stats),
            );
        }
    }

    cards
}

fn deck_percentage(cardview: &Value) -> Option<f64> {
    let decks = cardview["num_decks"].as_u64()? as f64;
    let total = cardview["potential_decks"].as_u64()? as f64;
    if total == 0.0 {
        return None;
    }
    Some(decks / total * 100.0)
}

// Vendors appear either as `{"price": ...}` objects or as bare values.
fn vendor_price(prices: &Value, vendor: &str) -> RawPrice {
    let value = &prices[vendor];
    let value = if value.is_object() {
        &value["price"]
    } else {
        value
    };
    serde_json::from_value(value.clone()).unwrap_or_default()
}

// Scryfall API client
pub struct ScryfallClient {
    http_client: Client,
    base_url: String,
    pacer: RequestPacer,
}

/// Both Scryfall price points for one card, still raw.
#[derive(Debug, Clone)]
pub struct ScryfallPrices {
    pub usd: RawPrice,
    pub eur: RawPrice,
}

impl ScryfallClient {
    pub fn new() -> Self {
        Self {
            http_client: pooled_client(),
            base_url: SCRYFALL_API_URL.to_string(),
            pacer: RequestPacer::new(SCRYFALL_MIN_GAP),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch the USD and Cardmarket EUR prices for one card. `Ok(None)` means
    /// Scryfall does not know the card, which degrades that card rather than
    /// failing the run.
    pub async fn fetch_prices(&self, card_name: &str) -> Result<Option<ScryfallPrices>> {
        self.pacer.wait().await;

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("exact", card_name)])
            .send()
            .await
            .with_context(|| format!("Failed to fetch Scryfall prices for '{card_name}'"))?;

        if response.status() == StatusCode::NOT_FOUND {
            // Exact lookups are strict about punctuation; retry fuzzily and
            // accept only a near-identical name.
            return self.fetch_prices_fuzzy(card_name).await;
        }
        if !response.status().is_success() {
            anyhow::bail!("Scryfall returned {} for '{card_name}'", response.status());
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse Scryfall response")?;
        Ok(Some(extract_scryfall_prices(&data)))
    }

    async fn fetch_prices_fuzzy(&self, card_name: &str) -> Result<Option<ScryfallPrices>> {
        self.pacer.wait().await;

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("fuzzy", card_name)])
            .send()
            .await
            .with_context(|| format!("Failed fuzzy Scryfall lookup for '{card_name}'"))?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("Card '{}' not found on Scryfall", card_name);
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("Scryfall returned {} for '{card_name}'", response.status());
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse Scryfall response")?;

        let found = data["name"].as_str().unwrap_or_default();
        if !names_match(card_name, found) {
            warn!(
                "Fuzzy Scryfall lookup for '{}' returned '{}', ignoring",
                card_name, found
            );
            return Ok(None);
        }
        Ok(Some(extract_scryfall_prices(&data)))
    }

    /// Attach Scryfall prices to a batch of cards, preserving order.
    ///
    /// Lookups overlap up to a small bound while the shared pacer keeps the
    /// request rate under Scryfall's limit. Per-card failures degrade that
    /// card only.
    pub async fn attach_prices(&self, cards: Vec<Card>) -> Vec<Card> {
        stream::iter(cards)
            .map(|mut card| async move {
                match self.fetch_prices(&card.name).await {
                    Ok(Some(prices)) => {
                        card.scryfall_usd = prices.usd;
                        card.scryfall_eur = prices.eur;
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Price lookup failed for '{}': {:#}", card.name, e),
                }
                card
            })
            .buffered(SCRYFALL_MAX_IN_FLIGHT)
            .collect()
            .await
    }
}

impl Default for ScryfallClient {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn extract_scryfall_prices(data: &Value) -> ScryfallPrices {
    let prices = &data["prices"];
    ScryfallPrices {
        usd: serde_json::from_value(prices["usd"].clone()).unwrap_or_default(),
        eur: serde_json::from_value(prices["eur"].clone()).unwrap_or_default(),
    }
}

/// Accept a fuzzily-resolved card only when its name is nearly identical to
/// the requested one.
pub(crate) fn names_match(requested: &str, found: &str) -> bool {
    strsim::jaro_winkler(&normalize_name(requested), &normalize_name(found))
        >= NAME_MATCH_THRESHOLD
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// Serializes request starts so consecutive sends stay at least `min_gap`
// apart, regardless of how many lookups are in flight.
struct RequestPacer {
    min_gap: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestPacer {
    fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        let now = Instant::now();
        let earliest = match *last {
            Some(prev) => prev + self.min_gap,
            None => now,
        };
        if earliest > now {
            tokio::time::sleep_until(earliest).await;
        }
        *last = Some(earliest.max(now));
    }
}

// Currency rate client
pub struct CurrencyClient {
    http_client: Client,
    base_url: String,
}

impl CurrencyClient {
    pub fn new() -> Self {
        Self {
            http_client: pooled_client(),
            base_url: CURRENCY_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch USD→CLP and EUR→CLP rates. Any failure here is fatal for the
    /// run; there is no per-card fallback for a missing rate.
    pub async fn fetch_rates(&self) -> Result<CurrencyRates> {
        info!("Fetching currency rates");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[("to", "CLP,USD")])
            .send()
            .await
            .context("Failed to fetch currency rates")?;

        if !response.status().is_success() {
            anyhow::bail!("Currency API returned {}", response.status());
        }

        let data: Value = response
            .json()
            .await
            .context("Failed to parse currency rate response")?;

        let rates = extract_rates(&data)?;
        info!(
            "Rates fetched: 1 USD = {} CLP, 1 EUR = {} CLP",
            rates.usd_to_clp(),
            rates.eur_to_clp()
        );
        Ok(rates)
    }
}

impl Default for CurrencyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// The API quotes against EUR, so the USD rate arrives as USD-per-EUR and
/// CLP-per-USD is derived from the two.
pub(crate) fn extract_rates(data: &Value) -> Result<CurrencyRates> {
    let eur_to_clp = data["rates"]["CLP"]
        .as_f64()
        .context("Currency response missing CLP rate")?;
    let usd_per_eur = data["rates"]["USD"]
        .as_f64()
        .context("Currency response missing USD rate")?;
    if usd_per_eur <= 0.0 {
        anyhow::bail!("Currency response has non-positive USD rate: {usd_per_eur}");
    }
    let usd_to_clp = eur_to_clp / usd_per_eur;
    Ok(CurrencyRates::from_f64(usd_to_clp, eur_to_clp)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_cards_from_page_json() {
        let data = json!({
            "container": {"json_dict": {"cardlists": [{
                "cardviews": [
                    {
                        "name": "Sol Ring",
                        "prices": {
                            "cardkingdom": {"price": "$3.99"},
                            "tcgplayer": {"price": 2.50}
                        },
                        "num_decks": 500, "potential_decks": 1000
                    },
                    {
                        "name": "Arcane Signet",
                        "prices": {"cardkingdom": "1.49"}
                    }
                ]
            }]}}
        });

        let cards = extract_top_cards(&data, 10);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].name, "Sol Ring");
        assert_eq!(cards[0].cardkingdom, RawPrice::Text("$3.99".to_string()));
        assert_eq!(cards[0].tcgplayer, RawPrice::Number(2.50));
        assert!(cards[0].starcitygames.is_absent());
        assert_eq!(cards[0].stats.deck_count, Some(500));
        assert_eq!(cards[0].stats.deck_percentage, Some(50.0));
        assert_eq!(cards[1].cardkingdom, RawPrice::Text("1.49".to_string()));
        assert_eq!(cards[1].stats.deck_count, None);
    }

    #[test]
    fn limit_caps_the_card_list() {
        let data = json!({
            "container": {"json_dict": {"cardlists": [{
                "cardviews": [
                    {"name": "a", "prices": {}},
                    {"name": "b", "prices": {}},
                    {"name": "c", "prices": {}}
                ]
            }]}}
        });
        assert_eq!(extract_top_cards(&data, 2).len(), 2);
    }

    #[test]
    fn malformed_page_yields_no_cards() {
        assert!(extract_top_cards(&json!({"unexpected": true}), 10).is_empty());
    }

    #[test]
    fn scryfall_prices_extract_as_raw_values() {
        let data = json!({
            "name": "Sol Ring",
            "prices": {"usd": "1.19", "eur": null}
        });
        let prices = extract_scryfall_prices(&data);
        assert_eq!(prices.usd, RawPrice::Text("1.19".to_string()));
        assert!(prices.eur.is_absent());
    }

    #[test]
    fn name_matching_tolerates_punctuation_only() {
        assert!(names_match("Urza's Saga", "Urzas Saga"));
        assert!(names_match("Sol Ring", "Sol Ring"));
        assert!(!names_match("Sol Ring", "Mana Vault"));
    }

    #[test]
    fn rates_derive_usd_from_the_eur_base() {
        let data = json!({"base": "EUR", "rates": {"CLP": 1000.0, "USD": 1.25}});
        let rates = extract_rates(&data).unwrap();
        assert_eq!(rates.eur_to_clp().to_string(), "1000");
        assert_eq!(rates.usd_to_clp().to_string(), "800");
    }

    #[test]
    fn missing_rate_is_an_error() {
        assert!(extract_rates(&json!({"rates": {"USD": 1.25}})).is_err());
        assert!(extract_rates(&json!({"rates": {"CLP": 1000.0}})).is_err());
    }

    #[test]
    fn non_positive_rates_are_an_error() {
        assert!(extract_rates(&json!({"rates": {"CLP": 0.0, "USD": 1.25}})).is_err());
        assert!(extract_rates(&json!({"rates": {"CLP": 1000.0, "USD": 0.0}})).is_err());
    }

    #[test]
    fn time_period_parses_ui_labels() {
        assert_eq!("week".parse::<TimePeriod>().unwrap(), TimePeriod::Week);
        assert_eq!("All Time".parse::<TimePeriod>().unwrap(), TimePeriod::AllTime);
        assert!("fortnight".parse::<TimePeriod>().is_err());
    }
}
