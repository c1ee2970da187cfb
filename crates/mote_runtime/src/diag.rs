//! Error reporting helpers for embedders.

use std::fmt;

use mote_ir::SyntaxError;

use crate::core::value::Value;
use crate::errors::Error;
use crate::runtime::Runtime;

impl Runtime {
    /// The syntax error from the most recent failed compilation, if the
    /// most recent compilation failed.
    pub fn last_parse_error(&self) -> Option<&SyntaxError> {
        self.last_parse_error.as_ref()
    }

    /// The `message` property of a thrown Error object; for non-object
    /// thrown values, their display rendering.
    pub fn error_message(&mut self, exc: Value) -> Result<String, Error> {
        if exc.is_object() {
            let msg = self.get_prop(exc, "message")?;
            if msg.is_string() {
                return Ok(self.heap.str(msg.as_string()).as_str().to_string());
            }
        }
        let mut out = crate::core::strings::Str::new();
        self.display_value(&mut out, exc);
        Ok(out.as_str().to_string())
    }

    /// Write the `stack` property captured when the Error object was built.
    pub fn write_stack_trace(&mut self, out: &mut impl fmt::Write, exc: Value) -> fmt::Result {
        if !exc.is_object() {
            return Ok(());
        }
        let stack = self.get_prop(exc, "stack").map_err(|_| fmt::Error)?;
        if stack.is_string() {
            let text = self.heap.str(stack.as_string()).as_str().to_string();
            out.write_str(&text)?;
        }
        Ok(())
    }

    /// One-line rendering of any `Error` for driver output.
    pub fn render_error(&mut self, err: &Error) -> String {
        match err {
            Error::Exception(exc) => {
                let msg = self
                    .error_message(*exc)
                    .unwrap_or_else(|_| "uncaught exception".to_string());
                let mut out = format!("Error: {msg}");
                let mut trace = String::new();
                if self.write_stack_trace(&mut trace, *exc).is_ok() && !trace.is_empty() {
                    out.push('\n');
                    out.push_str(&trace);
                }
                out
            }
            other => other.to_string(),
        }
    }
}
