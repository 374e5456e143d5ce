//! Coin amount arithmetic for the escrow split
//!
//! All calculations run on `Decimal` and are truncated toward zero to
//! 8 decimal places before they reach a raw transaction, so both parties
//! derive bit-for-bit identical outputs from the same inputs. Truncation
//! never rounds up; the satoshi dust lost to it is absorbed by the miner
//! fee side of the equation.

use rust_decimal::prelude::*;
use shared::escrow::EscrowRatio;

/// Coin precision (satoshi resolution)
pub const COIN_DECIMALS: u32 = 8;

/// Fixed fee allowance subtracted from the escrowed value before the split
/// (0.0001)
pub const ESCROW_FEE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// Convert f64 from an RPC response to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for an RPC request
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Truncate toward zero to the given number of decimal places
///
/// `trunc(1.23456789123, 8) == 1.23456789`; never rounds up.
pub fn truncate_to_decimals(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::ToZero)
}

/// Split a released escrow value between buyer and seller per the listing's
/// escrow ratio
///
/// Both shares are truncated to coin precision independently, so
/// `buyer + seller <= value` always holds (never greater).
pub fn split_release(value: Decimal, ratio: &EscrowRatio) -> (Decimal, Decimal) {
    let total = Decimal::from(ratio.buyer) + Decimal::from(ratio.seller);
    if total.is_zero() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let buyer = truncate_to_decimals(value * Decimal::from(ratio.buyer) / total, COIN_DECIMALS);
    let seller = truncate_to_decimals(value * Decimal::from(ratio.seller) / total, COIN_DECIMALS);
    (buyer, seller)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_escrow_fee_value() {
        assert_eq!(ESCROW_FEE, dec("0.0001"));
    }

    #[test]
    fn test_truncation_determinism() {
        assert_eq!(truncate_to_decimals(dec("1.23456789123"), 8), dec("1.23456789"));
        assert_eq!(truncate_to_decimals(dec("0.000000001"), 8), Decimal::ZERO);
        // Never rounds up
        assert_eq!(truncate_to_decimals(dec("0.999999999"), 8), dec("0.99999999"));
        assert_eq!(truncate_to_decimals(dec("2.5"), 0), dec("2"));
    }

    #[test]
    fn test_legacy_ratio_split() {
        // Default ratio 2:1 reproduces the historical 2/3 : 1/3 distribution
        let (buyer, seller) = split_release(dec("3.0"), &EscrowRatio::default());
        assert_eq!(buyer, dec("2"));
        assert_eq!(seller, dec("1"));
    }

    #[test]
    fn test_split_conservation() {
        // Truncation loses value, never creates it
        for value in ["1.0", "0.1", "12.34567891", "0.00000007"] {
            let value = dec(value);
            let (buyer, seller) = split_release(value, &EscrowRatio::default());
            assert!(buyer + seller <= value, "split of {value} gained value");
            assert!(buyer >= Decimal::ZERO && seller >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_split_even_ratio() {
        let ratio = EscrowRatio { buyer: 1, seller: 1 };
        let (buyer, seller) = split_release(dec("1.00000001"), &ratio);
        assert_eq!(buyer, dec("0.50000000"));
        assert_eq!(seller, dec("0.50000000"));
        assert!(buyer + seller < dec("1.00000001"));
    }

    #[test]
    fn test_split_zero_ratio_is_empty() {
        let ratio = EscrowRatio { buyer: 0, seller: 0 };
        assert_eq!(split_release(dec("5"), &ratio), (Decimal::ZERO, Decimal::ZERO));
    }
}
