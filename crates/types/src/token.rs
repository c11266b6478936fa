//! Tokens: named characters or objects with attributes and inline macros.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::ValueMap;

/// A token's tagged data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub attributes: ValueMap,
    /// Macro name to Text/TextInterpolated source.
    #[serde(default)]
    pub macros: ValueMap,
}

/// An entry of the token table.
///
/// Aliases and groups hold names; they are expanded on lookup so later writes to the
/// referenced token stay visible through them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEntry {
    Token(Token),
    /// Another name for an existing token.
    Alias(String),
    /// Several tokens addressed by index, such as the current selection.
    Group(Vec<String>),
}

/// Expanded view of an entry, as handed back to hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawToken {
    Single(Token),
    List(Vec<Token>),
}

pub type TokenTable = IndexMap<String, TokenEntry>;
