//! Wire and input formats
//!
//! Backend request/response payloads and the NDJSON motion recording format
//! used to replay accelerometer traces.

mod motion;
mod sos;

pub use motion::*;
pub use sos::*;
