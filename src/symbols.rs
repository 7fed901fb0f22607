//! Value hasher: a bidirectional table between raw values and compact symbols.
//!
//! Every column name and cell value of an indexed table goes through the same
//! table, so the trie and the stored rows only ever hold symbols. Two
//! strategies are available:
//!
//! - **Serial**: the first sighting of a value assigns the next counter value,
//!   written in base 36 and starting at `1`.
//! - **Identity**: the symbol is the value's own text. Larger output, but the
//!   serialized index stays readable.
//!
//! Hashing is idempotent and `unhash(hash(v)) == v` for every hashed value.
//! A table is filled by exactly one builder; once the dataset is assembled it
//! is only read.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use allocative::Allocative;
use serde::de::{Deserializer, Error as _};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::value::Value;

/// Compact, reversible stand-in for a raw value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Allocative)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How new values are turned into symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Allocative)]
pub enum HashStrategy {
    /// Base-36 serial counter starting at `1`.
    #[default]
    Serial,
    /// The value's text is its symbol.
    Identity,
}

/// Writes `n` in base 36 with lowercase digits.
fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

#[derive(Debug, Clone, Default, Allocative)]
pub struct SymbolTable {
    strategy: HashStrategy,
    /// Last serial handed out; the next symbol is `serial + 1`.
    serial: u64,
    /// value -> symbol
    symbols: HashMap<Value, Symbol>,
    /// symbol -> value
    values: HashMap<Symbol, Value>,
}

impl SymbolTable {
    pub fn new(strategy: HashStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn strategy(&self) -> HashStrategy {
        self.strategy
    }

    /// Hash a value, assigning a new symbol on first sighting.
    ///
    /// # Errors
    /// With the identity strategy, fails with [IndexError::SymbolCollision]
    /// when a different value already renders to the same text (for example
    /// `2020` and `"2020"`): the inverse mapping could not stay exact.
    pub fn hash(&mut self, value: &Value) -> Result<Symbol> {
        if let Some(symbol) = self.symbols.get(value) {
            return Ok(symbol.clone());
        }

        let symbol = match self.strategy {
            HashStrategy::Serial => {
                self.serial += 1;
                Symbol(to_base36(self.serial))
            }
            HashStrategy::Identity => {
                let symbol = Symbol(value.to_string());
                if let Some(existing) = self.values.get(&symbol) {
                    return Err(IndexError::SymbolCollision {
                        symbol: symbol.0,
                        existing: format!("{} {}", existing.kind(), existing),
                        incoming: format!("{} {}", value.kind(), value),
                    });
                }
                symbol
            }
        };

        self.symbols.insert(value.clone(), symbol.clone());
        self.values.insert(symbol.clone(), value.clone());
        Ok(symbol)
    }

    /// Look up the symbol of an already hashed value without assigning one.
    pub fn lookup(&self, value: &Value) -> Result<&Symbol> {
        self.symbols
            .get(value)
            .ok_or_else(|| IndexError::UnknownValue(value.to_string()))
    }

    /// Recover the value a symbol was assigned to.
    pub fn unhash(&self, symbol: &str) -> Result<&Value> {
        self.values
            .get(symbol)
            .ok_or_else(|| IndexError::UnknownSymbol(symbol.to_string()))
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.values.contains_key(symbol)
    }

    /// Number of distinct values hashed so far.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forward table keyed by the value's text, as written to the `hash`
    /// field of a serialized dataset.
    ///
    /// Values of different types with the same text (`1` and `"1"`) share a
    /// key here; the `unhash` snapshot is the lossless one.
    pub fn snapshot_hash(&self) -> BTreeMap<String, Symbol> {
        self.symbols
            .iter()
            .map(|(value, symbol)| (value.to_string(), symbol.clone()))
            .collect()
    }

    /// Inverse table, symbol -> value.
    pub fn snapshot_unhash(&self) -> BTreeMap<Symbol, Value> {
        self.values
            .iter()
            .map(|(symbol, value)| (symbol.clone(), value.clone()))
            .collect()
    }

    /// Rebuild a frozen table from its inverse snapshot.
    ///
    /// # Errors
    /// Fails if two symbols map to the same value.
    pub fn from_unhash(unhash: BTreeMap<Symbol, Value>) -> Result<Self> {
        let mut table = Self::default();
        for (symbol, value) in unhash {
            if let Some(previous) = table.symbols.insert(value.clone(), symbol.clone()) {
                return Err(IndexError::InvalidDataset(format!(
                    "symbols `{}` and `{}` both decode to {}",
                    previous, symbol, value
                )));
            }
            table.values.insert(symbol, value);
        }
        table.serial = table.values.len() as u64;
        Ok(table)
    }
}

impl Serialize for SymbolTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SymbolTable", 2)?;
        state.serialize_field("hash", &self.snapshot_hash())?;
        state.serialize_field("unhash", &self.snapshot_unhash())?;
        state.end()
    }
}

#[derive(Deserialize)]
struct SymbolTableRepr {
    // Informational only: the inverse table carries the typed values.
    #[serde(default)]
    #[allow(dead_code)]
    hash: BTreeMap<String, Symbol>,
    unhash: BTreeMap<Symbol, Value>,
}

impl<'de> Deserialize<'de> for SymbolTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = SymbolTableRepr::deserialize(deserializer)?;
        SymbolTable::from_unhash(repr.unhash).map_err(D::Error::custom)
    }
}
