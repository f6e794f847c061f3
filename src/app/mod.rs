//! Application core: controller logic behind port traits.
//!
//! The [`service::ControllerService`] ties the rules engine, the scheduler
//! and the port dispatcher to the node bus.  Everything else it touches
//! (time, persistence, event output) goes through the traits in [`ports`],
//! so the core runs unchanged against real hardware, the simulator or a
//! test double.

pub mod commands;
pub mod dispatch;
pub mod events;
pub mod ports;
pub mod service;
