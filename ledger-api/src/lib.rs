#![deny(clippy::print_stdout, clippy::print_stderr)]

//! The query/command API surface: [`LedgerApiFacade`] wraps
//! every other component behind one set of wire-friendly Params/Response
//! types, so an RPC transport only has to serialize [`wire`] values.

mod facade;
mod telemetry;
mod wire;

pub use facade::LedgerApiFacade;
pub use telemetry::ApiTelemetry;
pub use telemetry::TelemetryCounters;
pub use wire::*;
