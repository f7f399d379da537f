//! Canonical identifiers shared by every entity in the model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote assets recognised by the fallback suffix splitter, in preference order.
const KNOWN_QUOTES: &[&str] = &["USDT", "USDC", "USD", "BTC", "ETH"];

/// Stable identifier for a venue. Kept as a newtype rather than a raw `&str`
/// so it can't be confused with a venue symbol or canonical symbol at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExchangeId {
    Okx,
    GateIo,
    LBank,
    BingX,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Okx => "okx",
            ExchangeId::GateIo => "gateio",
            ExchangeId::LBank => "lbank",
            ExchangeId::BingX => "bingx",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exchange-independent identifier: `{BASE}-{QUOTE}-PERP`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalSymbol(pub String);

impl fmt::Display for CanonicalSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CanonicalSymbol {
    /// Build from an explicit base/quote pair
    pub fn from_base_quote(base: &str, quote: &str) -> Self {
        Self(format!(
            "{}-{}-PERP",
            base.to_ascii_uppercase(),
            quote.to_ascii_uppercase()
        ))
    }

    /// Derive from a raw venue symbol (no separator info available) by
    /// suffix-splitting against the known quote set, falling back to a fixed
    /// 4-character quote suffix
    pub fn from_venue_symbol(venue_symbol: &str) -> Self {
        let cleaned: String = venue_symbol
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        for quote in KNOWN_QUOTES {
            if cleaned.len() > quote.len() && cleaned.ends_with(quote) {
                let base = &cleaned[..cleaned.len() - quote.len()];
                return Self::from_base_quote(base, quote);
            }
        }

        if cleaned.len() > 4 {
            let (base, quote) = cleaned.split_at(cleaned.len() - 4);
            Self::from_base_quote(base, quote)
        } else {
            Self::from_base_quote(&cleaned, "USDT")
        }
    }
}

/// Per-venue identity triple referenced throughout the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub exchange_id: ExchangeId,
    pub venue_symbol: String,
    pub canonical: CanonicalSymbol,
}

impl Identity {
    pub fn new(exchange_id: ExchangeId, venue_symbol: impl Into<String>) -> Self {
        let venue_symbol = venue_symbol.into();
        let canonical = CanonicalSymbol::from_venue_symbol(&venue_symbol);
        Self {
            exchange_id,
            venue_symbol,
            canonical,
        }
    }

    pub fn with_canonical(
        exchange_id: ExchangeId,
        venue_symbol: impl Into<String>,
        canonical: CanonicalSymbol,
    ) -> Self {
        Self {
            exchange_id,
            venue_symbol: venue_symbol.into(),
            canonical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_known_quote_suffix() {
        assert_eq!(
            CanonicalSymbol::from_venue_symbol("BTC_USDT").0,
            "BTC-USDT-PERP"
        );
        assert_eq!(
            CanonicalSymbol::from_venue_symbol("BTCUSDT").0,
            "BTC-USDT-PERP"
        );
        assert_eq!(
            CanonicalSymbol::from_venue_symbol("ETH-USDC-SWAP").0,
            "ETH-USDC-PERP"
        );
    }

    #[test]
    fn falls_back_to_fixed_suffix_when_no_known_quote_matches() {
        // "WEIRD" has no recognised quote suffix and is longer than 4 chars,
        // so the fallback rule BASE = s[:-4], QUOTE = s[-4:] applies.
        let c = CanonicalSymbol::from_venue_symbol("XWEIRD");
        assert_eq!(c.0, "XW-EIRD-PERP");
    }

    #[test]
    fn same_canonical_for_different_venue_spellings() {
        let a = CanonicalSymbol::from_venue_symbol("BTC-USDT");
        let b = CanonicalSymbol::from_venue_symbol("BTC_USDT");
        assert_eq!(a, b);
    }
}
