use crate::{AssetDesc, Uint256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a fungible currency, the symbol bytes left-aligned in 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Currency(pub Uint256);

/// Identifier of a ticket category, encoded the same way as [`Currency`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Category(pub Uint256);

fn symbol_to_uint256(symbol: &str) -> Uint256 {
    let mut bytes = [0u8; 32];
    let len = symbol.len().min(32);
    bytes[..len].copy_from_slice(&symbol.as_bytes()[..len]);
    Uint256(bytes)
}

fn uint256_to_symbol(value: &Uint256) -> String {
    let end = value.0.iter().position(|b| *b == 0).unwrap_or(32);
    String::from_utf8_lossy(&value.0[..end]).into_owned()
}

impl Currency {
    /// Symbols longer than 32 bytes are truncated.
    pub fn from_symbol(symbol: &str) -> Self {
        Self(symbol_to_uint256(symbol))
    }

    pub fn symbol(&self) -> String {
        uint256_to_symbol(&self.0)
    }
}

impl Category {
    pub fn from_symbol(symbol: &str) -> Self {
        Self(symbol_to_uint256(symbol))
    }

    pub fn symbol(&self) -> String {
        uint256_to_symbol(&self.0)
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({})", self.symbol())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.symbol())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Fungible amount of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Token {
    pub currency: Currency,
    pub value: u128,
}

/// Non-fungible ticket of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ticket {
    pub category: Category,
    pub value: Uint256,
}

/// Asset carried by a shielded output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Asset {
    pub tkn: Option<Token>,
    pub tkt: Option<Ticket>,
}

impl Asset {
    pub fn token(currency: Currency, value: u128) -> Self {
        Self {
            tkn: Some(Token { currency, value }),
            tkt: None,
        }
    }

    pub fn ticket(category: Category, value: Uint256) -> Self {
        Self {
            tkn: None,
            tkt: Some(Ticket { category, value }),
        }
    }

    /// Normalizes the asset, absent parts become zero.
    pub fn to_flat(&self) -> FlatAsset {
        FlatAsset {
            tkn: self.tkn.unwrap_or_default(),
            tkt: self.tkt.unwrap_or_default(),
        }
    }
}

/// Flat representation of an [`Asset`] with both parts always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlatAsset {
    pub tkn: Token,
    pub tkt: Ticket,
}

impl FlatAsset {
    /// Builds the descriptor consumed by the commitment primitive.
    ///
    /// The token value is laid out little-endian in the low 16 bytes.
    pub fn to_desc(&self) -> AssetDesc {
        let mut tkn_value = [0u8; 32];
        tkn_value[..16].copy_from_slice(&self.tkn.value.to_le_bytes());
        AssetDesc {
            tkn_currency: self.tkn.currency.0,
            tkn_value: Uint256(tkn_value),
            tkt_category: self.tkt.category.0,
            tkt_value: self.tkt.value,
        }
    }
}
