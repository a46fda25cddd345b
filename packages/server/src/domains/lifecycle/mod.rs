// Report lifecycle state machine and referential guards.
//
// Every multi-record mutation (match creation/deletion, claim creation,
// guarded deletes) runs as one database transaction holding FOR UPDATE row
// locks, so concurrent requests racing on the same report serialize and at
// most one wins.
pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
