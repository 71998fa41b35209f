//! arpguard core library
//!
//! Shared error handling, address types and the captured packet type used by
//! every crate in the arpguard workspace.

pub mod error;
pub mod packet;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use packet::Packet;
pub use types::*;
