//! Reading programs, token tables, and macro libraries from disk.
//!
//! Files ending in `.json` are parsed as JSON; everything else as YAML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};
use ttml_engine::ExecutionState;
use ttml_types::{Program, Step};

/// A program document is either a full program or just its steps.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProgramDocument {
    Steps(Vec<Step>),
    Program(Program),
}

impl ProgramDocument {
    fn into_program(self, fallback_name: &str) -> Program {
        match self {
            ProgramDocument::Steps(steps) => Program {
                name: fallback_name.to_string(),
                steps,
            },
            ProgramDocument::Program(mut program) => {
                if program.name.is_empty() {
                    program.name = fallback_name.to_string();
                }
                program
            }
        }
    }
}

/// One entry of a tokens file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenSpec {
    Alias { alias: String },
    Group { group: Vec<String> },
    Token {
        #[serde(default)]
        attributes: Map<String, Json>,
        #[serde(default)]
        macros: Map<String, Json>,
    },
}

/// Macro name to program, consulted when a token macro is called inline.
pub type Library = IndexMap<String, Program>;

fn parse_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON in {}", path.display()))
    } else {
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse YAML in {}", path.display()))
    }
}

pub fn load_program(path: &Path) -> Result<Program> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("program");
    Ok(parse_document::<ProgramDocument>(path)?.into_program(name))
}

pub fn load_library(path: &Path) -> Result<Library> {
    let documents: IndexMap<String, ProgramDocument> = parse_document(path)?;
    Ok(documents
        .into_iter()
        .map(|(name, document)| {
            let program = document.into_program(&name);
            (name, program)
        })
        .collect())
}

/// Add every token in the file to `state`; returns how many entries were loaded.
pub fn load_tokens(path: &Path, state: &mut ExecutionState) -> Result<usize> {
    let specs: IndexMap<String, TokenSpec> = parse_document(path)?;
    let count = specs.len();
    for (name, spec) in specs {
        match spec {
            TokenSpec::Alias { alias } => state.set_alias(name, alias),
            TokenSpec::Group { group } => state.set_group(name, group),
            TokenSpec::Token { attributes, macros } => {
                state.set_token(name, &attributes, &macros);
            }
        }
    }
    Ok(count)
}
