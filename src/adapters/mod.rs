//! Adapters: concrete implementations of the bus and port traits.
//!
//! | Adapter    | Implements            | Connects to                   |
//! |------------|-----------------------|-------------------------------|
//! | `i2c`      | Bus                   | any `embedded-hal` I²C master |
//! | `log_sink` | EventSink             | `log` facade                  |
//! | `store`    | ConfigPort            | RAM (postcard) / JSON file    |
//! |            | StoragePort           |                               |
//! | `time`     | Clock                 | `Instant` + local time zone   |

pub mod i2c;
pub mod log_sink;
pub mod store;
pub mod time;
