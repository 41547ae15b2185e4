pub mod config;
pub mod error;
pub mod guard;
pub mod header;
pub mod issuer;
pub mod keys;
pub mod middleware;
pub mod permissions;
pub mod realm;
pub mod request;
pub mod revocation;
pub mod token;
pub mod verifier;

pub use config::{ConfigError, GuardConfig};
pub use error::{AuthError, AuthResult};
pub use guard::{current_token, ResourceProtector, ResourceProtectorBuilder};
pub use header::{parse_authorization, TokenType};
pub use issuer::unverified_issuer;
pub use middleware::{require_token, CurrentToken, Protection};
pub use permissions::{has_permissions, NoPermissions, PermissionLookup, PermissionSet, RolePermissionMap};
pub use realm::{HttpRealmFetcher, RealmFetchError, RealmFetcher, RealmKeyCache, RealmKeyResolver};
pub use request::AuthorizationRequest;
pub use revocation::{NeverRevoked, RevocationCheck, RevokedTokenIds};
pub use token::Token;
pub use verifier::TokenVerifier;
