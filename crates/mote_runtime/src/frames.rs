//! Call frames.
//!
//! One frame per active script or native call. The frame stack is a GC root
//! set and the source of stack traces attached to Error objects.

use smallvec::SmallVec;

use crate::core::value::Value;
use crate::errors::Error;
use crate::runtime::Runtime;

pub struct Frame {
    pub func: Value,
    pub this: Value,
    /// Scope object of a script call; `UNDEFINED` for native calls.
    pub scope: Value,
    pub args: SmallVec<[Value; 8]>,
    /// Function name when one is known, for traces.
    pub name: Option<String>,
}

impl Runtime {
    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<(), Error> {
        if self.frames.len() >= self.opts.max_call_depth {
            return Err(Error::StackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&mut self) {
        self.frames.pop();
    }

    /// Render the current call stack, innermost frame first.
    pub(crate) fn render_stack_trace(&self) -> String {
        let mut out = String::new();
        for frame in self.frames.iter().rev() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("    at ");
            match &frame.name {
                Some(name) => out.push_str(name),
                None => out.push_str("<anonymous>"),
            }
            out.push_str("()");
        }
        out
    }
}
