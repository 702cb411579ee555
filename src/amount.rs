//! Fixed-point money values with decimal rebasing.
//!
//! Amounts move between the two networks at different decimal precisions
//! (the coin is a 7-decimal ERC20 on ethnet and the 18-decimal native coin
//! on biznet; token pairs carry whatever their contracts report), so every
//! value travels with its precision and is rebased explicitly.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// A monetary value in base units at a known decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    value: U256,
    decimals: u8,
}

/// Error parsing a display string into an [`Amount`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid amount string: {0:?}")]
pub struct ParseAmountError(pub String);

impl Amount {
    /// Wraps base units at the given precision.
    pub const fn new(value: U256, decimals: u8) -> Self {
        Self { value, decimals }
    }

    /// A whole number of display units, scaled into base units.
    pub fn from_integer(value: u64, decimals: u8) -> Self {
        Self::new(U256::from(value) * pow10(decimals), decimals)
    }

    /// Parses a display string (`"1"`, `"100_000_000.1234567"`), truncating
    /// fractional digits beyond the precision.
    pub fn parse(value: &str, decimals: u8) -> Result<Self, ParseAmountError> {
        let cleaned: String = value.chars().filter(|c| !matches!(c, ',' | '_')).collect();
        if cleaned.is_empty() {
            return Ok(Self::new(U256::ZERO, decimals));
        }

        let (integral, fraction) = match cleaned.split_once('.') {
            Some((integral, fraction)) => (integral, fraction),
            None => (cleaned.as_str(), ""),
        };
        if integral.is_empty() && fraction.is_empty() {
            return Err(ParseAmountError(value.to_string()));
        }
        if !integral.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ParseAmountError(value.to_string()));
        }

        let mut fraction = fraction.to_string();
        fraction.truncate(decimals as usize);
        while fraction.len() < decimals as usize {
            fraction.push('0');
        }

        let integral = if integral.is_empty() { "0" } else { integral };
        let digits = format!("{integral}{fraction}");
        let value = U256::from_str_radix(&digits, 10)
            .map_err(|_| ParseAmountError(value.to_string()))?;
        Ok(Self::new(value, decimals))
    }

    /// Base units.
    pub const fn value(&self) -> U256 {
        self.value
    }

    /// Decimal precision.
    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Rebases to another precision. Scaling down truncates toward zero,
    /// matching the on-chain conversion.
    pub fn convert(&self, decimals: u8) -> Self {
        let value = match decimals.cmp(&self.decimals) {
            Ordering::Equal => self.value,
            Ordering::Greater => self.value * pow10(decimals - self.decimals),
            Ordering::Less => self.value / pow10(self.decimals - decimals),
        };
        Self::new(value, decimals)
    }
}

impl fmt::Display for Amount {
    /// Renders with the decimal point inserted: `10.0000000` at 7 decimals.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.value.to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return f.write_str(&digits);
        }
        let padded = format!("{digits:0>width$}", width = decimals + 1);
        let split = padded.len() - decimals;
        write!(f, "{}.{}", &padded[..split], &padded[split..])
    }
}

/// Rebases a raw base-unit value between precisions.
pub fn rebase(value: U256, from_decimals: u8, to_decimals: u8) -> U256 {
    Amount::new(value, from_decimals).convert(to_decimals).value()
}

fn pow10(exp: u8) -> U256 {
    U256::from(10).pow(U256::from(exp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COIN_DECIMALS_BIZNET, COIN_DECIMALS_ETHNET};

    #[test]
    fn parse_scales_to_base_units() {
        assert_eq!(Amount::parse("1", 0).unwrap().value(), U256::from(1));
        assert_eq!(Amount::parse("1", 1).unwrap().value(), U256::from(10));
        assert_eq!(Amount::parse("1", 7).unwrap().value(), U256::from(10_000_000u64));
        assert_eq!(
            Amount::parse("100000000.1234567", 7).unwrap().value(),
            U256::from(1_000_000_001_234_567u64)
        );
        assert_eq!(
            Amount::parse("100,000,000", 7).unwrap().value(),
            U256::from(1_000_000_000_000_000u64)
        );
        assert_eq!(
            Amount::parse("100_000_000.1234567", 7).unwrap().value(),
            U256::from(1_000_000_001_234_567u64)
        );
    }

    #[test]
    fn parse_truncates_excess_fraction() {
        assert_eq!(Amount::parse("1.123456789", 7).unwrap().value(), U256::from(11_234_567u64));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Amount::parse("abc", 7).is_err());
        assert!(Amount::parse("1.2.3", 7).is_err());
        assert!(Amount::parse(".", 7).is_err());
    }

    #[test]
    fn display_inserts_decimal_point() {
        assert_eq!(Amount::parse("1", 18).unwrap().to_string(), "1.000000000000000000");
        assert_eq!(Amount::parse("10", 7).unwrap().to_string(), "10.0000000");
        assert_eq!(Amount::new(U256::from(1), 7).to_string(), "0.0000001");
        assert_eq!(Amount::new(U256::from(42), 0).to_string(), "42");
    }

    #[test]
    fn convert_round_trips_between_network_precisions() {
        // 1 coin on ethnet (7 decimals) and back.
        let ethnet = Amount::parse("1", COIN_DECIMALS_ETHNET).unwrap();
        assert_eq!(ethnet.value(), U256::from(10_000_000u64));
        let biznet = ethnet.convert(COIN_DECIMALS_BIZNET);
        assert_eq!(biznet.value(), Amount::parse("1", COIN_DECIMALS_BIZNET).unwrap().value());
        assert_eq!(biznet.convert(COIN_DECIMALS_ETHNET), ethnet);

        // A 10-decimal token against a 7-decimal partner.
        let token = Amount::parse("123.45", 10).unwrap();
        assert_eq!(token.convert(7).convert(10), token);
    }

    #[test]
    fn convert_truncates_downward() {
        let fine = Amount::new(U256::from(19u64), 1);
        assert_eq!(fine.convert(0).value(), U256::from(1));
    }

    #[test]
    fn rebase_helper_matches_convert() {
        assert_eq!(
            rebase(U256::from(10_000_000u64), 7, 18),
            U256::from(10u64).pow(U256::from(18))
        );
    }
}
