use serde::{Deserialize, Serialize};

/// A price observation exactly as an upstream source emitted it.
///
/// Sources are inconsistent: EDHREC hands back currency-prefixed strings like
/// `"$3.99"` (or `"N/A"`), Scryfall returns bare decimal strings or JSON null,
/// and cached data may carry plain numbers. Parsing into a usable amount
/// happens later, in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Text(String),
    Number(f64),
    #[default]
    Absent,
}

impl RawPrice {
    pub fn is_absent(&self) -> bool {
        matches!(self, RawPrice::Absent)
    }
}

impl From<&str> for RawPrice {
    fn from(s: &str) -> Self {
        RawPrice::Text(s.to_string())
    }
}

impl From<f64> for RawPrice {
    fn from(n: f64) -> Self {
        RawPrice::Number(n)
    }
}

/// Deck popularity statistics from EDHREC. Pass-through metadata only;
/// nothing downstream does arithmetic on these beyond formatting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckStats {
    pub deck_count: Option<u64>,
    pub deck_percentage: Option<f64>,
    pub total_decks: Option<u64>,
}

/// One card with its raw per-source price observations.
///
/// USD-denominated sources: Card Kingdom, TCGplayer, StarCityGames (from the
/// EDHREC listing) and Scryfall's USD price. The EUR source is Scryfall's
/// Cardmarket price, which serves as the comparison side of the analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Card {
    pub name: String,
    #[serde(default)]
    pub cardkingdom: RawPrice,
    #[serde(default)]
    pub tcgplayer: RawPrice,
    #[serde(default)]
    pub starcitygames: RawPrice,
    #[serde(default)]
    pub scryfall_usd: RawPrice,
    #[serde(default)]
    pub scryfall_eur: RawPrice,
    #[serde(default)]
    pub stats: DeckStats,
}

impl Card {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_cardkingdom(mut self, price: impl Into<RawPrice>) -> Self {
        self.cardkingdom = price.into();
        self
    }

    pub fn with_tcgplayer(mut self, price: impl Into<RawPrice>) -> Self {
        self.tcgplayer = price.into();
        self
    }

    pub fn with_starcitygames(mut self, price: impl Into<RawPrice>) -> Self {
        self.starcitygames = price.into();
        self
    }

    pub fn with_scryfall_usd(mut self, price: impl Into<RawPrice>) -> Self {
        self.scryfall_usd = price.into();
        self
    }

    pub fn with_scryfall_eur(mut self, price: impl Into<RawPrice>) -> Self {
        self.scryfall_eur = price.into();
        self
    }

    pub fn with_stats(mut self, stats: DeckStats) -> Self {
        self.stats = stats;
        self
    }

    /// All USD-denominated observations, labelled by source. The EUR side is
    /// deliberately excluded; it is the comparison marketplace, not a
    /// candidate for "best online price".
    pub fn usd_sources(&self) -> [(&'static str, &RawPrice); 4] {
        [
            ("cardkingdom", &self.cardkingdom),
            ("tcgplayer", &self.tcgplayer),
            ("starcitygames", &self.starcitygames),
            ("scryfall_usd", &self.scryfall_usd),
        ]
    }
}
