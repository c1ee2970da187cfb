//! mote_runtime: an embeddable script runtime core.
//!
//! NaN-boxed 64-bit values, fixed-cell arena storage with mark-sweep
//! collection, a prototype-based object model, and a small tree-walking
//! interpreter behind `Runtime::exec`. Embedders keep values alive across
//! calls with `Runtime::own` and cancel runaway scripts through
//! `InterruptHandle`.

#![allow(clippy::new_without_default)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_range_contains)]

pub mod core;
pub mod errors;

mod diag;
mod exec;
mod frames;
mod gc;
mod json;
mod object;
mod owner;
mod runtime;
mod util;

pub use crate::core::config::{ArenaOpts, CreateOpts, HeapStat};
pub use crate::core::object::{attr, NativeFn};
pub use crate::core::strings::Str;
pub use crate::core::value::Value;
pub use errors::Error;
pub use owner::Root;
pub use runtime::{InterruptHandle, Runtime};
