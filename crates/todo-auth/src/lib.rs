//! Todo App Authentication
//!
//! This crate provides bearer-token authentication for the Todo App:
//! HS256 token issuance and verification, the per-request gate that binds
//! an authenticated [`Principal`], the path policy deciding which routes
//! need one, and password hashing.

pub mod error;
pub mod jwt;
pub mod key;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod principal;
pub mod resolver;

pub use error::AuthError;
pub use jwt::{Claims, DEFAULT_TOKEN_LIFETIME_SECS, JwtManager, MAX_TOKEN_LIFETIME_SECS};
pub use key::{KeyMode, SigningKey};
pub use middleware::{auth_middleware, extract_bearer_token, require_auth, GateOutcome, RequestGate};
pub use password::{hash_password, verify_password};
pub use policy::{Access, PathPolicy, PathRule};
pub use principal::{Authority, Principal, BASELINE_AUTHORITY};
pub use resolver::{Identity, IdentityResolver, StoreResolver};
