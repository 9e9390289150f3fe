//! Test doubles for the application ports.
//!
//! Available in test builds or with the `test-helpers` feature:
//!
//! ```toml
//! [dev-dependencies]
//! logfan = { version = "*", features = ["test-helpers"] }
//! ```

mod clock;
mod sinks;

pub use clock::ManualClock;
pub use sinks::{
    CollectingConsole, CollectingGraylog, CollectingStructured, FailingStructured, FixedIdentity,
};
