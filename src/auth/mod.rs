//! Bearer-token verification and scope authorization.
//!
//! [`KeyResolver`] caches the provider's signing keys, [`TokenValidator`]
//! checks a token against one of them, [`ScopeRequirement`] enforces
//! per-route permissions and [`AuthGate`] strings the three together.
//! [`auth_middleware`] exposes the gate to axum routes.

mod claims;
mod gate;
mod jwks;
mod middleware;
mod scope;
mod validator;

pub use claims::{Audience, TokenClaims};
pub use gate::{AuthError, AuthGate, bearer_token};
pub use jwks::{DEFAULT_MIN_REFRESH_INTERVAL, JwksError, KeyResolver, SigningKey, SigningKeySet};
pub use middleware::{RequireAuth, auth_middleware};
pub use scope::{ScopeError, ScopeRequirement, Scopes, enforce};
pub use validator::{ACCEPTED_ALGORITHM, TokenValidator, ValidationError};
