//! Authentication hook run during the connection handshake.
//!
//! Realmkeep does not implement account authentication itself. The
//! server calls an [`Authenticator`] with the token from the client's
//! first frame and builds the session from the account it returns.

use realmkeep_protocol::{AccountId, AccountSecurity, Locale, SessionKey};

use crate::SessionError;

/// Everything the session needs to know about an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub account_id: AccountId,
    pub security: AccountSecurity,
    /// Highest expansion the account may use.
    pub expansion: u8,
    pub locale: Locale,
    pub session_key: SessionKey,
}

/// Validates a client's auth token and returns its account.
///
/// # Example
///
/// ```rust
/// use realmkeep_protocol::{AccountId, AccountSecurity, Locale, SessionKey};
/// use realmkeep_session::{AuthenticatedAccount, Authenticator, SessionError};
///
/// /// Accepts any numeric token as the account id. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<AuthenticatedAccount, SessionError> {
///         let id: u32 = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
///         Ok(AuthenticatedAccount {
///             account_id: AccountId(id),
///             security: AccountSecurity::Player,
///             expansion: 2,
///             locale: Locale::EnUs,
///             session_key: SessionKey(token.as_bytes().to_vec()),
///         })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token`.
    ///
    /// # Returns
    /// - `Ok(AuthenticatedAccount)` when the token is accepted
    /// - `Err(SessionError::AuthFailed)` when it is not
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<AuthenticatedAccount, SessionError>> + Send;
}
