//! OAuth 2.0 authorization-code proxy
//!
//! Sits between a caller and the remote provider:
//! - `GET /oauth/authorize` redirects to the provider with this service's
//!   callback, carrying the caller's redirect target inside `state`
//! - `GET /oauth/callback` recovers that target and forwards the code
//! - `POST /oauth/token` performs the confidential code exchange
//! - `GET /.well-known/oauth-authorization-server` describes the above

mod authorize;
mod callback;
mod error;
mod handlers;
mod metadata;
mod provider;
mod state;
mod token;

pub use authorize::{AuthorizationRedirector, AuthorizeRequest, RESPONSE_TYPE_CODE};
pub use callback::{CallbackParams, CallbackRelay};
pub use error::OAuthError;
pub use handlers::{OAuthProxy, routes};
pub use metadata::{AuthorizationServerMetadata, ProtectedResourceMetadata, public_base_url};
pub use provider::{ProviderCredentials, ProviderEndpoints};
pub use state::{AuthorizationState, StateError};
pub use token::{GRANT_TYPE_AUTHORIZATION_CODE, ProviderReply, TokenExchanger, TokenRequestBody};
