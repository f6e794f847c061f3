//! TerraHub controller library.
//!
//! Rule evaluation with hysteresis and minimum hold, time-of-day port
//! schedules, and the checksummed frame protocol spoken with expansion
//! nodes.  Everything that touches the outside world sits behind a trait
//! (`protocol::Bus`, `app::ports::*`), so the whole controller runs on
//! the host against [`sim::VirtualChain`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod protocol;
pub mod rules;
pub mod safety;
pub mod schedule;
pub mod sim;

pub use error::{Error, Result};
