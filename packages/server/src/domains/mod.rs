// Domain modules
pub mod access;
pub mod categories;
pub mod claims;
pub mod lifecycle;
pub mod matches;
pub mod reports;
pub mod users;
