//! Authentication state trait and macro.

use super::authenticator::{SessionAuthenticator, SessionStore};

/// Trait for state types that provide a session authenticator.
pub trait HasAuthBackend {
    type Store: SessionStore;

    fn authenticator(&self) -> &SessionAuthenticator<Self::Store>;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard field.
///
/// The struct must have an `auth: SessionAuthenticator<Database>` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub auth: SessionAuthenticator<Database>,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            type Store = $crate::db::Database;

            fn authenticator(&self) -> &$crate::auth::SessionAuthenticator<Self::Store> {
                &self.auth
            }
        }
    };
}
