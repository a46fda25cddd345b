// Shared types used across domains
pub mod error;
pub mod id;

pub use error::*;
pub use id::*;
