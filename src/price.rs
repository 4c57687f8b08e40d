//! Prices and quotes.
//!
//! A [`Price`] is an integer count of a currency's minor unit, so
//! `Price { value: 475, valuation: USD }` is USD 4.75. A [`Quote`] attaches
//! the lot the price applies to. Quotes only order against quotes of the
//! same valuation and lot.

use std::cmp::Ordering;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An ISO 4217 currency and the number of minor units per major unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency {
    code: [u8; 3],
    /// Minor units per major unit (100 for cents)
    pub denominator: u64,
}

impl Currency {
    pub const USD: Currency = Currency::new(*b"USD", 100);
    pub const EUR: Currency = Currency::new(*b"EUR", 100);
    pub const GBP: Currency = Currency::new(*b"GBP", 100);
    pub const CHF: Currency = Currency::new(*b"CHF", 100);
    pub const JPY: Currency = Currency::new(*b"JPY", 1);

    const KNOWN: [Currency; 5] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::CHF,
        Currency::JPY,
    ];

    pub const fn new(code: [u8; 3], denominator: u64) -> Self {
        Self { code, denominator }
    }

    /// Look up one of the built-in currencies by its ISO code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::KNOWN
            .iter()
            .copied()
            .find(|c| c.code.eq_ignore_ascii_case(code.as_bytes()))
    }

    pub fn code(&self) -> &str {
        std::str::from_utf8(&self.code).unwrap_or("???")
    }

    /// Decimal places needed to print one minor unit.
    pub fn decimals(&self) -> usize {
        let mut places = 0;
        let mut scale = 1u64;
        while scale < self.denominator {
            scale = scale.saturating_mul(10);
            places += 1;
        }
        places
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Currency::from_code(&code).ok_or_else(|| format!("unknown currency code {code:?}"))
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_owned()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An amount of money in minor units of its valuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub value: i64,
    pub valuation: Currency,
}

impl Price {
    pub const fn new(value: i64, valuation: Currency) -> Self {
        Self { value, valuation }
    }

    /// Round a major-unit amount to the nearest minor unit.
    pub fn from_f64(amount: f64, valuation: Currency) -> Self {
        let value = (amount * valuation.denominator as f64).round() as i64;
        Self { value, valuation }
    }

    /// Convert an exact decimal amount, failing if it falls between minor units
    /// or overflows.
    pub fn from_decimal(amount: Decimal, valuation: Currency) -> Option<Self> {
        let scaled = amount.checked_mul(Decimal::from(valuation.denominator))?;
        if !scaled.fract().is_zero() {
            return None;
        }
        Some(Self {
            value: scaled.to_i64()?,
            valuation,
        })
    }

    pub fn as_f64(&self) -> f64 {
        self.value as f64 / self.valuation.denominator as f64
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.*}",
            self.valuation,
            self.valuation.decimals(),
            self.as_f64()
        )
    }
}

/// A price per `lot` units of the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    pub lot: u64,
}

impl Quote {
    /// # Panics
    /// Panics if `lot` is zero.
    pub fn new(price: Price, lot: u64) -> Self {
        assert!(lot > 0, "a quote needs a positive lot");
        Self { price, lot }
    }

    /// Minor-unit value of the price.
    #[inline]
    pub const fn value(&self) -> i64 {
        self.price.value
    }

    /// A quote with the same valuation and lot at another minor-unit value.
    #[inline]
    pub const fn with_value(&self, value: i64) -> Self {
        Self {
            price: Price::new(value, self.price.valuation),
            lot: self.lot,
        }
    }

    /// Whether the two quotes share valuation and lot, and so may be ordered.
    #[inline]
    pub fn is_comparable(&self, other: &Quote) -> bool {
        self.lot == other.lot && self.price.valuation == other.price.valuation
    }

    /// Price per single unit, in major units of the valuation.
    pub fn as_f64(&self) -> f64 {
        self.price.as_f64() / self.lot as f64
    }
}

/// # Panics
/// Ordering quotes of different valuation or lot is a caller bug and panics.
impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        assert!(
            self.is_comparable(other),
            "comparing quotes of different valuation or lot: {self} and {other}"
        );
        Some(self.price.value.cmp(&other.price.value))
    }
}

impl From<Quote> for f64 {
    fn from(quote: Quote) -> Self {
        quote.as_f64()
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.lot, self.price)
    }
}
