// Lost-and-found management API core.
//
// Users file lost/found reports, staff pair them into matches, and a claim
// records the hand-off of the item to its owner. All multi-record mutations
// go through the lifecycle service, which runs them as single database
// transactions with row locks so reports, matches and claims never drift
// out of sync.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
