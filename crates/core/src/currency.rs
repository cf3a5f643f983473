//! Currency - validated three-letter currency codes
//!
//! Common fiat currencies are pre-defined for type safety; anything else
//! that matches `^[A-Z]{3}$` goes through the `Other` variant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing currency codes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("empty currency code")]
    EmptyCode,

    #[error("currency code must be exactly 3 uppercase letters: {0}")]
    InvalidFormat(String),
}

/// A three-letter uppercase currency code.
///
/// # Examples
/// ```
/// use chainbank_core::Currency;
///
/// let eur: Currency = "eur".parse().unwrap();
/// assert_eq!(eur, Currency::Eur);
/// assert_eq!(eur.code(), "EUR");
///
/// // Unknown but well-formed codes are accepted
/// let chf: Currency = "CHF".parse().unwrap();
/// assert!(matches!(chf, Currency::Other(_)));
///
/// // Anything that is not exactly three letters is rejected
/// assert!("EURO".parse::<Currency>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    /// US Dollar
    Usd,
    /// Euro
    Eur,
    /// British Pound
    Gbp,
    /// Japanese Yen
    Jpy,
    /// Any other three-letter code
    Other(String),
}

impl Currency {
    /// Returns the currency code as a string slice
    pub fn code(&self) -> &str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
            Currency::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if s.is_empty() {
            return Err(CurrencyError::EmptyCode);
        }

        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(CurrencyError::InvalidFormat(s));
        }

        Ok(match s.as_str() {
            "USD" => Currency::Usd,
            "EUR" => Currency::Eur,
            "GBP" => Currency::Gbp,
            "JPY" => Currency::Jpy,
            _ => Currency::Other(s),
        })
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_currencies() {
        assert_eq!("EUR".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" gbp ".parse::<Currency>().unwrap(), Currency::Gbp);
    }

    #[test]
    fn test_parse_other_code() {
        let chf: Currency = "CHF".parse().unwrap();
        assert_eq!(chf, Currency::Other("CHF".to_string()));
        assert_eq!(chf.to_string(), "CHF");
    }

    #[test]
    fn test_empty_code_error() {
        let result: Result<Currency, _> = "".parse();
        assert!(matches!(result, Err(CurrencyError::EmptyCode)));
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            "EURO".parse::<Currency>(),
            Err(CurrencyError::InvalidFormat(_))
        ));
        assert!(matches!(
            "EU".parse::<Currency>(),
            Err(CurrencyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_non_letters_rejected() {
        assert!(matches!(
            "E1R".parse::<Currency>(),
            Err(CurrencyError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let currencies = vec![Currency::Eur, Currency::Usd, Currency::Other("CHF".into())];
        for currency in currencies {
            let json = serde_json::to_string(&currency).unwrap();
            let parsed: Currency = serde_json::from_str(&json).unwrap();
            assert_eq!(currency, parsed);
        }
    }
}
