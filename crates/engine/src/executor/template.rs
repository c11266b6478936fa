use serde_json::Map;
use tracing::{debug, warn};
use ttml_types::codec::decode_map;
use ttml_types::{Arg, Output, Step, TemplateArg, TemplateRecord, Value};

use super::Executor;
use crate::error::ExecError;
use crate::host::Host;
use crate::resolve::{resolve, resolve_text};

const DEFAULT_TEMPLATE_NAME: &str = "default";

impl<H: Host> Executor<H> {
    pub(super) fn run_template(&mut self, step: &Step, output: &mut Output) -> Result<(), ExecError> {
        let mut name = DEFAULT_TEMPLATE_NAME.to_string();
        let mut attributes = Map::new();

        for arg in &step.args {
            match arg {
                Arg::Template(TemplateArg::Name(text)) => name = resolve_text(&text.to_value(), &self.state)?,
                Arg::Template(TemplateArg::Attributes(value)) => match resolve(value, &self.state)? {
                    Value::Object(map) => attributes.extend(decode_map(&map)),
                    other => warn!(kind = other.kind(), "template attributes must be an object"),
                },
                _ => {}
            }
        }

        debug!(template = %name, attributes = attributes.len(), "template rendered");
        output.push_template(TemplateRecord { name, attributes });
        Ok(())
    }

    /// `TestMode(flag)` sets the flag; a bare TestMode toggles it.
    pub(super) fn run_test_mode(&mut self, step: &Step) {
        let explicit = step.args.iter().find_map(|arg| match arg {
            Arg::TestMode(flag) => Some(*flag),
            _ => None,
        });
        let enabled = match explicit.flatten() {
            Some(flag) => {
                self.state.set_test_mode(flag);
                flag
            }
            None => self.state.toggle_test_mode(),
        };
        debug!(enabled, "test mode updated");
    }
}
