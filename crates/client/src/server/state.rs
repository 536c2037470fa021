//! Session state behind the server's sync mutex

use futures::future::{BoxFuture, Shared};
use indivo_domain::{IndivoError, Record};
use tokio::task::AbortHandle;

/// Authorization state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No usable access token
    #[default]
    Unauthenticated,
    /// Request token obtained or being obtained; waiting on the login surface
    AwaitingUserApproval,
    /// Verifier received; exchanging it for an access token
    ExchangingToken,
    /// Access token held
    Authenticated,
}

/// Handshake result: the record id the server attached to the access token
pub(crate) type HandshakeResult = Result<Option<String>, IndivoError>;

pub(crate) type SharedHandshake = Shared<BoxFuture<'static, HandshakeResult>>;

/// The single in-flight handshake
pub(crate) struct PendingHandshake {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) future: SharedHandshake,
    pub(crate) abort: AbortHandle,
}

/// Discovery result: the records in response order
pub(crate) type DiscoveryResult = Result<Vec<Record>, IndivoError>;

pub(crate) type SharedDiscovery = Shared<BoxFuture<'static, DiscoveryResult>>;

/// The single in-flight discovery call
pub(crate) struct PendingDiscovery {
    pub(crate) id: u64,
    pub(crate) generation: u64,
    pub(crate) future: SharedDiscovery,
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) auth: AuthState,
    pub(crate) active_record_id: Option<String>,
    pub(crate) verifier: Option<String>,
    pub(crate) pending: Option<PendingHandshake>,
    pub(crate) discovery: Option<PendingDiscovery>,
}
