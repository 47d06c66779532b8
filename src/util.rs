//! Shared utility modules used across tokdrift components.

pub mod cancel;
pub mod duration_ms;
pub mod size;

pub use cancel::CancellationToken;
