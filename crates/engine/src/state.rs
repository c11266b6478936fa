//! # Execution State
//!
//! Session data that steps read and mutate: the token table, named results,
//! positional variables, the selected target, the run-as identity, and the
//! test-mode flag.
//!
//! Tokens and the test-mode flag persist across runs. Results, positional
//! variables, target, and run-as are cleared by [`ExecutionState::reset_session`]
//! when a run finishes with cleanup enabled.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tracing::{debug, warn};
use ttml_types::codec::encode_map;
use ttml_types::{RawToken, Token, TokenEntry, TokenTable, Value, ValueMap};

use crate::error::ExecError;

/// Upper bound on alias chains followed before a lookup gives up.
const MAX_ALIAS_HOPS: usize = 16;

#[derive(Debug, Default, Clone)]
pub struct ExecutionState {
    tokens: TokenTable,
    results: IndexMap<String, Value>,
    /// Positional variables; ordinal `n` lives at index `n - 1`.
    variables: Vec<Value>,
    target: Option<String>,
    run_as: Option<String>,
    test_mode: bool,
}

/// A token entry with aliases followed and group members looked up.
#[derive(Debug)]
pub(crate) enum TokenView<'a> {
    Single(&'a Token),
    Group(Vec<&'a Token>),
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token from plain host values, tagging them with the codec.
    pub fn set_token(&mut self, name: impl Into<String>, attributes: &Map<String, Json>, macros: &Map<String, Json>) -> Token {
        let token = Token {
            attributes: encode_map(attributes),
            macros: encode_map(macros),
        };
        self.set_raw_token(name, token.clone());
        token
    }

    /// Store a token that is already in tagged form.
    pub fn set_raw_token(&mut self, name: impl Into<String>, token: Token) {
        let name = name.into();
        debug!(token = %name, attributes = token.attributes.len(), macros = token.macros.len(), "storing token");
        self.tokens.insert(name, TokenEntry::Token(token));
    }

    /// Make `name` refer to the same data as `target`.
    pub fn set_alias(&mut self, name: impl Into<String>, target: impl Into<String>) {
        self.tokens.insert(name.into(), TokenEntry::Alias(target.into()));
    }

    /// Make `name` an indexable list of other tokens.
    pub fn set_group(&mut self, name: impl Into<String>, members: Vec<String>) {
        self.tokens.insert(name.into(), TokenEntry::Group(members));
    }

    pub fn remove_token(&mut self, name: &str) -> Option<TokenEntry> {
        self.tokens.shift_remove(name)
    }

    /// Look up a token, following aliases. Groups are not single tokens.
    pub fn token(&self, name: &str) -> Option<&Token> {
        match self.canonical(name) {
            Some((_, TokenEntry::Token(token))) => Some(token),
            _ => None,
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = (&String, &TokenEntry)> {
        self.tokens.iter()
    }

    /// All tokens with aliases and groups expanded to full data.
    pub fn raw_tokens(&self) -> IndexMap<String, RawToken> {
        let mut raw = IndexMap::with_capacity(self.tokens.len());
        for name in self.tokens.keys() {
            match self.view(name) {
                Ok(TokenView::Single(token)) => {
                    raw.insert(name.clone(), RawToken::Single(token.clone()));
                }
                Ok(TokenView::Group(members)) => {
                    raw.insert(name.clone(), RawToken::List(members.into_iter().cloned().collect()));
                }
                Err(error) => warn!(token = %name, error = %error, "skipping dangling token reference"),
            }
        }
        raw
    }

    pub fn set_result(&mut self, name: impl Into<String>, value: Value) {
        self.results.insert(name.into(), value);
    }

    pub fn result(&self, name: &str) -> Option<&Value> {
        self.results.get(name)
    }

    pub fn remove_result(&mut self, name: &str) -> Option<Value> {
        self.results.shift_remove(name)
    }

    pub fn results(&self) -> &IndexMap<String, Value> {
        &self.results
    }

    /// Append a positional variable and return its ordinal.
    pub fn push_variable(&mut self, value: Value) -> u32 {
        self.variables.push(value);
        self.variables.len() as u32
    }

    /// Positional variable by ordinal; `0` is the most recent one.
    pub fn variable(&self, ordinal: u32) -> Option<&Value> {
        match ordinal {
            0 => self.variables.last(),
            n => self.variables.get(n as usize - 1),
        }
    }

    pub fn last_variable(&self) -> Option<&Value> {
        self.variables.last()
    }

    pub fn variables(&self) -> &[Value] {
        &self.variables
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn set_target(&mut self, target: Option<String>) {
        self.target = target;
    }

    pub fn run_as(&self) -> Option<&str> {
        self.run_as.as_deref()
    }

    pub fn set_run_as(&mut self, run_as: Option<String>) {
        self.run_as = run_as;
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    pub fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
    }

    pub fn toggle_test_mode(&mut self) -> bool {
        self.test_mode = !self.test_mode;
        self.test_mode
    }

    /// Clear per-run data. Tokens and test mode are kept.
    pub fn reset_session(&mut self) {
        self.results.clear();
        self.variables.clear();
        self.target = None;
        self.run_as = None;
    }

    /// Raw (unresolved) value at a dotted attribute path.
    ///
    /// Without a path the token's whole attribute table is returned as an Object,
    /// or an Array of those for a group.
    pub(crate) fn lookup_attribute(&self, name: &str, path: Option<&str>) -> Result<Value, ExecError> {
        let view = self.view(name)?;
        let Some(path) = path else {
            return Ok(match view {
                TokenView::Single(token) => Value::Object(token.attributes.clone()),
                TokenView::Group(members) => Value::Array(
                    members
                        .into_iter()
                        .map(|token| Value::Object(token.attributes.clone()))
                        .collect(),
                ),
            });
        };

        let not_found = || ExecError::AttributeNotFound {
            token: name.to_string(),
            attribute: path.to_string(),
        };
        let mut segments = path.split('.');
        let attributes = match view {
            TokenView::Single(token) => &token.attributes,
            TokenView::Group(members) => {
                let index = segments.next().and_then(|segment| segment.parse::<usize>().ok()).ok_or_else(not_found)?;
                let member: &Token = members.get(index).copied().ok_or_else(not_found)?;
                &member.attributes
            }
        };

        let Some(first) = segments.next() else {
            return Ok(Value::Object(attributes.clone()));
        };
        let mut current = attributes.get(first).ok_or_else(not_found)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
                _ => None,
            }
            .ok_or_else(not_found)?;
        }
        Ok(current.clone())
    }

    /// Write `value` at a dotted attribute path, creating the token and any
    /// intermediate containers. Numeric segments create Arrays, others Objects.
    pub(crate) fn write_attribute(&mut self, name: &str, path: &str, value: Value) -> Result<(), ExecError> {
        let invalid = |reason: String| ExecError::InvalidAttributePath {
            token: name.to_string(),
            path: path.to_string(),
            reason,
        };
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(invalid("empty path segment".into()));
        }

        let (owner, skip) = self.write_owner(name, &segments).map_err(invalid)?;
        let entry = self
            .tokens
            .entry(owner.clone())
            .or_insert_with(|| TokenEntry::Token(Token::default()));
        let TokenEntry::Token(token) = entry else {
            return Err(invalid(format!("{owner} is not a token")));
        };
        write_path(&mut token.attributes, &segments[skip..], value).map_err(invalid)
    }

    /// Token that receives a write addressed to `name`, and how many leading
    /// segments were consumed picking a group member.
    fn write_owner(&self, name: &str, segments: &[&str]) -> Result<(String, usize), String> {
        match self.canonical(name) {
            None => Ok((name.to_string(), 0)),
            Some((owner, TokenEntry::Token(_))) => Ok((owner.to_string(), 0)),
            Some((owner, TokenEntry::Group(members))) => {
                let index = segments[0]
                    .parse::<usize>()
                    .map_err(|_| format!("group {owner} must be indexed before attribute '{}'", segments[0]))?;
                let member = members
                    .get(index)
                    .ok_or_else(|| format!("group {owner} has no member {index}"))?;
                if segments.len() < 2 {
                    return Err(format!("cannot replace member {index} of group {owner}"));
                }
                let (owner, consumed) = self.write_owner(member, &segments[1..])?;
                Ok((owner, consumed + 1))
            }
            Some((owner, TokenEntry::Alias(_))) => Err(format!("alias chain at {owner} is too long")),
        }
    }

    pub(crate) fn view(&self, name: &str) -> Result<TokenView<'_>, ExecError> {
        let not_found = |name: &str| ExecError::TokenNotFound { name: name.to_string() };
        match self.canonical(name) {
            Some((_, TokenEntry::Token(token))) => Ok(TokenView::Single(token)),
            Some((_, TokenEntry::Group(members))) => members
                .iter()
                .map(|member| self.token(member).ok_or_else(|| not_found(member)))
                .collect::<Result<Vec<_>, _>>()
                .map(TokenView::Group),
            _ => Err(not_found(name)),
        }
    }

    /// Follow aliases to the entry that holds data.
    fn canonical(&self, name: &str) -> Option<(&str, &TokenEntry)> {
        let (mut key, mut entry) = self.tokens.get_key_value(name)?;
        for _ in 0..MAX_ALIAS_HOPS {
            let TokenEntry::Alias(target) = entry else {
                break;
            };
            (key, entry) = self.tokens.get_key_value(target.as_str())?;
        }
        Some((key.as_str(), entry))
    }
}

fn container_for(segment: &str) -> Value {
    if segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(ValueMap::new())
    }
}

fn write_path(map: &mut ValueMap, segments: &[&str], value: Value) -> Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        return Err("empty path".into());
    };
    match rest.first() {
        None => {
            map.insert(head.to_string(), value);
            Ok(())
        }
        Some(next) => {
            let slot = map.entry(head.to_string()).or_insert_with(|| container_for(next));
            write_into(slot, rest, value)
        }
    }
}

fn write_into(slot: &mut Value, segments: &[&str], value: Value) -> Result<(), String> {
    match slot {
        Value::Object(map) => write_path(map, segments, value),
        Value::Array(items) => {
            let Some((head, rest)) = segments.split_first() else {
                return Err("empty path".into());
            };
            let index = head
                .parse::<usize>()
                .map_err(|_| format!("'{head}' is not an array index"))?;
            if index > items.len() {
                return Err(format!("index {index} is past the end of an array of {}", items.len()));
            }
            if index == items.len() {
                items.push(rest.first().map_or_else(|| Value::Object(ValueMap::new()), |next| container_for(next)));
            }
            if rest.is_empty() {
                items[index] = value;
                Ok(())
            } else {
                write_into(&mut items[index], rest, value)
            }
        }
        other => Err(format!("{} value has no attributes", other.kind())),
    }
}
