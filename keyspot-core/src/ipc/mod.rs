//! Types emitted to engine subscribers.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them unchanged as JSON.

pub mod events;

pub use events::{EngineStatus, EngineStatusEvent, SpotterEvent};
