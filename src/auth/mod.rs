pub mod claims;
pub(crate) mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::AuthUser;
pub use jwt::JwtKeys;
pub use password::{hash_password, verify_password};
