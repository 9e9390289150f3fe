//! Application layer - use cases and the ports they depend on.
//!
//! The use cases orchestrate the domain objects through port traits;
//! infrastructure adapters provide the implementations at composition
//! time.

pub mod diagnostics;
pub mod dump;
pub mod ports;
pub mod process;
pub mod shutdown;

pub use diagnostics::{DiagnosticEmitter, DiagnosticHook};
pub use dump::CaptureDump;
pub use process::{DropReason, FanOut, PayloadLimits, ProcessError, ProcessEvent, ProcessOutcome};
pub use shutdown::Shutdown;
