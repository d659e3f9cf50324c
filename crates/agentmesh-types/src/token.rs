//! Payment tokens

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MeshError;

/// Token an agent accepts as payment.
///
/// Amounts are always expressed in the token's smallest unit: micro-STX for
/// the primary token and satoshis for the wrapped asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentToken {
    /// Primary chain token
    #[serde(rename = "STX")]
    Stx,
    /// Wrapped bitcoin asset
    #[serde(rename = "sBTC")]
    Sbtc,
}

impl PaymentToken {
    pub const ALL: [PaymentToken; 2] = [PaymentToken::Stx, PaymentToken::Sbtc];

    /// Canonical ticker
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Stx => "STX",
            Self::Sbtc => "sBTC",
        }
    }

    /// Number of decimals of the smallest unit
    pub fn decimals(&self) -> u8 {
        match self {
            Self::Stx => 6,
            Self::Sbtc => 8,
        }
    }
}

impl fmt::Display for PaymentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for PaymentToken {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stx" => Ok(Self::Stx),
            "sbtc" => Ok(Self::Sbtc),
            _ => Err(MeshError::UnknownToken {
                value: s.to_string(),
            }),
        }
    }
}
