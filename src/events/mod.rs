//! Netatmo homes, modules and camera events.

pub mod filter;
pub mod source;
pub mod types;
pub mod window;

pub use filter::{snapshot_references, DeviceFilter};
pub use source::{EventSource, HomeSelector};
pub use types::{Event, Home, Module, SnapshotReference, Subevent};
pub use window::{parse_timestamp, ResolvedWindow, TimeWindow};
