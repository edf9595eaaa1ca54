//! Bearer session authentication.
//!
//! Session tokens are short-lived (30 min) signed JWTs. When one fails
//! verification, the authenticator silently mints a replacement if the user
//! record holds a durable refresh credential matching the one the client
//! presents.

mod authenticator;
mod bearer;
mod errors;
mod extractors;
mod state;
mod types;

pub use authenticator::{SessionAuthenticator, SessionStore};
pub use bearer::{bearer_header_value, bearer_token};
pub use errors::{SessionError, TokenRejection};
pub use extractors::{
    REFRESHED_SESSION_TOKEN, REFRESHED_TOKEN_HEADER, SessionAuth, expose_refreshed_token,
};
pub use state::HasAuthBackend;
pub use types::{Session, SessionUser};
