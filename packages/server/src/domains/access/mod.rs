// Role model and authorization policy
pub mod policy;

pub use policy::*;
