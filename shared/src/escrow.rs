//! Escrow configuration attached to a listing's payment information

use serde::{Deserialize, Serialize};

/// Escrow scheme type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowType {
    /// Mutually-assured-destruction 2-of-2 multisig
    #[default]
    Mad,
}

/// Split of the released escrow value between the two parties
///
/// Percent weights, not required to sum to 100: the released amount is
/// divided `buyer : seller`. The legacy distribution (buyer gets two thirds,
/// seller one third) is `{ buyer: 2, seller: 1 }`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowRatio {
    pub buyer: u32,
    pub seller: u32,
}

impl Default for EscrowRatio {
    fn default() -> Self {
        Self { buyer: 2, seller: 1 }
    }
}

/// Escrow terms for a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Escrow {
    #[serde(rename = "type")]
    pub escrow_type: EscrowType,
    #[serde(default)]
    pub ratio: EscrowRatio,
}
