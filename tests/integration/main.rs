//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem against the
//! simulated node chain and mock adapters.  All tests run on the host with
//! no hardware required.

mod bus_tests;
mod config_store_tests;
mod mocks;
mod service_tests;
