//! Inbound transport: NDJSON framing/decoding and the reconnecting
//! TCP receiver that feeds the readings queue.

pub mod ndjson;
pub mod tcp;

pub use ndjson::{decode_line, DecodeError};
pub use tcp::{TcpReceiver, TransportStats};
