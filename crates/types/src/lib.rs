//! # TTML Types
//!
//! Shared data definitions for the TTML macro interpreter:
//!
//! - **`value`**: the tagged [`Value`] model every program value is expressed in
//! - **`step`**: parsed programs, steps, and typed step arguments
//! - **`token`**: token attribute/macro tables and the token entry kinds
//! - **`output`**: run output records and the roll-service response
//! - **`codec`**: conversion between host-native JSON and tagged values

pub mod codec;
pub mod output;
pub mod step;
pub mod token;
pub mod value;

pub use output::{Message, Output, RawEntry, RollRecord, RollResult, TemplateRecord};
pub use step::{
    Arg, Assignment, ChoiceArg, ChoiceOption, Comparison, Conditional, MessageText, Op, OptionKey, Program, Reroll, RollArg,
    SayArg, Step, StepResult, TargetArg, TemplateArg,
};
pub use token::{RawToken, Token, TokenEntry, TokenTable};
pub use value::{InterpolatedText, Primitive, TokenRef, Value, ValueMap};
