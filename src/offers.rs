use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{info, warn};

/// The cheapest concrete listing an offer finder located for a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub card_name: String,
    pub seller_name: String,
    pub country: String,
    pub item_price: Decimal,
    #[serde(default)]
    pub shipping_cost: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    #[error("offer finder reported: {0}")]
    Reported(String),

    #[error("failed to run offer finder: {0}")]
    Launch(#[from] std::io::Error),

    #[error("offer finder exited with {0}")]
    Failed(ExitStatus),

    #[error("offer finder produced no output")]
    NoOutput,

    #[error("offer finder output was not a valid offer: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Runs the external per-card offer lookup as an isolated process.
///
/// The lookup itself (a Cardmarket listings scraper) lives outside this crate
/// and is only required to honor one contract: take the card name as its last
/// argument and print a single JSON object as the last line of stdout, either
/// an offer or `{"error": "..."}`.
pub struct OfferFinder {
    command: String,
    args: Vec<String>,
}

impl OfferFinder {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub async fn find_best_offer(&self, card_name: &str) -> Result<Offer, OfferError> {
        info!("Looking up best offer for '{}'", card_name);

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(card_name)
            .output()
            .await?;

        if !output.status.success() {
            warn!(
                "Offer finder for '{}' exited with {}",
                card_name, output.status
            );
            return Err(OfferError::Failed(output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .ok_or(OfferError::NoOutput)?;
        parse_offer_line(line)
    }
}

pub(crate) fn parse_offer_line(line: &str) -> Result<Offer, OfferError> {
    let value: Value = serde_json::from_str(line.trim())?;
    if let Some(message) = value["error"].as_str() {
        return Err(OfferError::Reported(message.to_string()));
    }
    Ok(serde_json::from_value(value)?)
}
