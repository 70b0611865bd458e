//! Configuration library for the close-of-business engine.
//!
//! Loads [`CobConfig`] from the environment, a file or defaults and sets up
//! the tracing subscriber that the core's spans and events flow into.

#![allow(missing_docs)]

pub mod cob;
pub mod logging;

pub use cob::{CobConfig, CobConfigSource};
pub use logging::init_tracing;
