//! Remote control endpoint of the display: newline-delimited JSON over TCP.
//!
//! Commands are resolved here, off the render thread, and handed to the
//! engine through the shared [`ssvep_engine::EngineContext`].

pub mod protocol;
pub mod resolve;
pub mod server;
pub mod store;

pub use protocol::{Reading, Request, Response, StatusSnapshot};
pub use resolve::{decode_background, resolve_command};
pub use server::{ControlHandle, ControlServer};
pub use store::{CsvTimeSeriesStore, TimeSeriesStore};
