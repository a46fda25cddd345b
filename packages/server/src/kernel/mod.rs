// Infrastructure: dependency container and external collaborators
pub mod deps;
pub mod identity;
pub mod jwt;
pub mod media;

pub use deps::*;
pub use identity::{Identity, IdentityError, IdentityProvider, JwtIdentityProvider};
pub use jwt::{Claims, JwtService};
pub use media::{HttpMediaStore, InMemoryMediaStore, MediaCategory, MediaError, MediaStore};
