//! Core types shared by the contract algebra
//!
//! All types are designed for:
//! - Deterministic ordering (every type is `Ord`, sets are `BTreeSet`)
//! - Exact arithmetic (Decimal for money)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Public key identifying a party (Ed25519-sized)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    /// All-zero key used by grouping projections in place of a real owner
    pub const NULL: PublicKey = PublicKey([0u8; 32]);

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check for the null key
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// Identity taking part in an arrangement
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Party {
    name: String,
    owning_key: PublicKey,
}

impl Party {
    /// Create new party
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key the party signs with
    pub fn owning_key(&self) -> PublicKey {
        self.owning_key
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::AED => "AED",
            Currency::INR => "INR",
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "AED" => Ok(Currency::AED),
            "INR" => Ok(Currency::INR),
            other => Err(format!("unknown currency code: {}", other)),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Quantity of a currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount {
    /// Exact decimal quantity
    pub quantity: Decimal,
    /// Currency
    pub currency: Currency,
}

impl Amount {
    /// Create new amount
    pub fn new(quantity: Decimal, currency: Currency) -> Self {
        Self { quantity, currency }
    }

    /// Zero of a currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Add amounts of the same currency; `None` on currency mismatch or overflow
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        if self.currency != other.currency {
            return None;
        }
        self.quantity
            .checked_add(other.quantity)
            .map(|quantity| Amount::new(quantity, self.currency))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.quantity, self.currency)
    }
}

/// SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecureHash([u8; 32]);

impl SecureHash {
    /// Hash arbitrary bytes
    pub fn sha256(data: impl AsRef<[u8]>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_ref());
        Self(hasher.finalize().into())
    }

    /// Create from bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for SecureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// `n` millions as a decimal
pub fn millions(n: i64) -> Decimal {
    Decimal::from(n) * Decimal::from(1_000_000)
}

/// `n` thousands as a decimal
pub fn thousands(n: i64) -> Decimal {
    Decimal::from(n) * Decimal::from(1_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_currency_from_str() {
        assert_eq!("USD".parse::<Currency>(), Ok(Currency::USD));
        assert_eq!("EUR".parse::<Currency>(), Ok(Currency::EUR));
        assert!("INVALID".parse::<Currency>().is_err());
    }

    #[test]
    fn test_amount_addition_requires_same_currency() {
        let usd = Amount::new(dec!(10.50), Currency::USD);
        let eur = Amount::new(dec!(1), Currency::EUR);

        assert_eq!(usd.checked_add(&usd), Some(Amount::new(dec!(21.00), Currency::USD)));
        assert_eq!(usd.checked_add(&eur), None);
    }

    #[test]
    fn test_amount_equality_ignores_scale() {
        assert_eq!(
            Amount::new(dec!(100), Currency::GBP),
            Amount::new(dec!(100.00), Currency::GBP)
        );
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(millions(2), dec!(2000000));
        assert_eq!(thousands(15), dec!(15000));
    }

    #[test]
    fn test_sha256_is_stable() {
        let a = SecureHash::sha256("commercial-paper");
        let b = SecureHash::sha256("commercial-paper");
        assert_eq!(a, b);
        assert_ne!(a, SecureHash::sha256("cash"));
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn test_null_key() {
        assert!(PublicKey::NULL.is_null());
        assert!(!PublicKey::from_bytes([7u8; 32]).is_null());
    }
}
