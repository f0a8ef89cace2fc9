//! GROVE Index - Locations, Posts and Readmarks
//!
//! The stateful half of GROVE: [`LocationDirectory`] keeps canonical
//! locations, [`PostIndex`] owns post writes and their fan-out, and
//! [`ReadmarkTracker`] keeps per-owner unread counts in step with them.
//! [`Grove`] wires all three around one store, cache and emitter.

pub mod directory;
pub mod grove;
pub mod posts;
pub mod readmarks;

pub use directory::LocationDirectory;
pub use grove::Grove;
pub use posts::PostIndex;
pub use readmarks::ReadmarkTracker;
