// src/labels.rs
//
// Reference labels travel as "<HAND> <SYMBOL> <VARIANT>" strings, e.g.
// "RIGHT A 3" or "LEFT B AVERAGE". They are parsed once at the storage
// boundary into ReferenceLabel and formatted back byte-for-byte.

use crate::types::Hand;
use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const AVERAGE_TOKEN: &str = "AVERAGE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variant {
    /// Numbered capture, starting at 1
    Sample(u32),
    /// Mean of the numbered captures for the same hand and symbol
    Average,
}

impl Variant {
    /// Anything that is not a positive integer counts as the averaged marker
    pub fn parse(token: &str) -> Self {
        match token.parse::<u32>() {
            Ok(n) if n > 0 => Self::Sample(n),
            _ => Self::Average,
        }
    }

    pub fn is_average(&self) -> bool {
        matches!(self, Self::Average)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sample(n) => write!(f, "{}", n),
            Self::Average => f.write_str(AVERAGE_TOKEN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ReferenceLabel {
    pub hand: Hand,
    pub symbol: String,
    pub variant: Variant,
}

impl ReferenceLabel {
    pub fn new(hand: Hand, symbol: impl Into<String>, variant: Variant) -> Self {
        Self {
            hand,
            symbol: symbol.into(),
            variant,
        }
    }

    pub fn key(&self) -> SignKey {
        SignKey::new(self.hand, self.symbol.clone())
    }
}

impl FromStr for ReferenceLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(' ').collect();
        if parts.len() != 3 {
            bail!("label {:?} does not have three space-separated parts", s);
        }
        let hand = Hand::parse(parts[0])
            .ok_or_else(|| anyhow!("label {:?} has unknown hand {:?}", s, parts[0]))?;
        if parts[1].is_empty() {
            bail!("label {:?} has an empty symbol", s);
        }
        Ok(Self {
            hand,
            symbol: parts[1].to_string(),
            variant: Variant::parse(parts[2]),
        })
    }
}

impl fmt::Display for ReferenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.hand, self.symbol, self.variant)
    }
}

/// A (hand, symbol) pair: the unit an attempt targets and averaging groups by
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SignKey {
    pub hand: Hand,
    pub symbol: String,
}

impl SignKey {
    pub fn new(hand: Hand, symbol: impl Into<String>) -> Self {
        Self {
            hand,
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for SignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.hand, self.symbol)
    }
}
