//! Session Manager
//!
//! [`IndivoServer`] owns the configuration, the auth state machine, the
//! credential store and the record cache, and routes every [`ServerCall`]
//! through them.
//!
//! ```text
//! select_record ──► ready_to_connect ──► handshake (shared, one at a time)
//!                                          │
//!                                          ▼
//!                   active record ◄── discovery ◄── credential store
//! ```
//!
//! Logout bumps a session generation. Anything dispatched under an older
//! generation resolves with `SessionInvalidated` and never writes
//! credentials or records.

mod delegate;
mod handshake;
mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use delegate::ServerDelegate;
use indivo_common::auth::{CredentialStore, KeychainTrait, OAuthSigner};
use indivo_common::{ErrorClassification, ErrorSeverity, KeychainProvider};
use indivo_domain::constants::{AUTHORIZE_PATH, OAUTH_TOKEN};
use indivo_domain::{IndivoError, Record, ServerConfig};
use futures::FutureExt;
use parking_lot::Mutex;
pub use state::AuthState;
use state::{DiscoveryResult, HandshakeResult, PendingDiscovery, SessionState};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::call::{CallAuth, CallOutcome, CallResponse, ServerCall};
use crate::discovery;
use crate::login::{parse_callback, CallbackOutcome};
use crate::records::RecordCache;
use crate::transport::{HttpResponse, HttpTransport, ReqwestTransport};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Session against one Indivo server
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct IndivoServer {
    inner: Arc<ServerInner>,
}

pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) delegate: Arc<dyn ServerDelegate>,
    transport: Arc<dyn HttpTransport>,
    pub(crate) credentials: CredentialStore,
    records: RecordCache,
    pub(crate) state: Mutex<SessionState>,
    generation: AtomicU64,
    pub(crate) handshake_ids: AtomicU64,
    discovery_ids: AtomicU64,
    /// Serializes credential/record writes against logout
    pub(crate) commit: tokio::sync::Mutex<()>,
}

impl IndivoServer {
    /// Create a session with explicit collaborators
    #[must_use]
    pub fn new(
        config: ServerConfig,
        delegate: Arc<dyn ServerDelegate>,
        transport: Arc<dyn HttpTransport>,
        keychain: Arc<dyn KeychainTrait>,
    ) -> Self {
        let credentials = CredentialStore::for_config(keychain, &config);
        let inner = ServerInner {
            config,
            delegate,
            transport,
            credentials,
            records: RecordCache::new(),
            state: Mutex::new(SessionState::default()),
            generation: AtomicU64::new(0),
            handshake_ids: AtomicU64::new(0),
            discovery_ids: AtomicU64::new(0),
            commit: tokio::sync::Mutex::new(()),
        };
        Self { inner: Arc::new(inner) }
    }

    /// Session over reqwest and the platform keychain
    ///
    /// # Errors
    /// Returns `IndivoError::Network` if the HTTP client cannot be built
    pub fn with_reqwest(
        config: ServerConfig,
        delegate: Arc<dyn ServerDelegate>,
    ) -> Result<Self, IndivoError> {
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        let keychain = Arc::new(KeychainProvider::new(config.keychain_service.clone()));
        Ok(Self::new(config, delegate, transport, keychain))
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Restore a persisted access token (when `store_credentials` is on)
    ///
    /// Returns `Ok(true)` when the session starts out authenticated.
    ///
    /// # Errors
    /// Returns `IndivoError::Keychain` if the keychain cannot be read
    pub async fn initialize(&self) -> Result<bool, IndivoError> {
        let restored = self.inner.credentials.initialize().await?;
        if restored {
            let mut state = self.inner.state.lock();
            if state.auth == AuthState::Unauthenticated && state.pending.is_none() {
                state.auth = AuthState::Authenticated;
            }
        }
        Ok(restored)
    }

    /// Check that the settings needed to talk to the server are present
    ///
    /// # Errors
    /// `IndivoError::Configuration` naming the first missing field
    /// (`endpoint_url`, `app_id`, `client_key`, `client_secret`), or the URL
    /// that does not parse
    pub fn ready_to_connect(&self) -> Result<(), IndivoError> {
        let config = &self.inner.config;
        if let Some(field) = config.first_missing_field() {
            return Err(IndivoError::missing(field));
        }
        Url::parse(config.endpoint_url.trim()).map_err(|_| IndivoError::missing("endpoint_url"))?;
        if !config.ui_url.trim().is_empty() {
            Url::parse(config.ui_url.trim()).map_err(|_| IndivoError::missing("ui_url"))?;
        }
        Ok(())
    }

    /// `{callback_scheme}://{app_id}`
    #[must_use]
    pub fn authorize_callback_url(&self) -> String {
        self.inner.config.authorize_callback_url()
    }

    /// Whether `url` is already the approved redirect for this app
    ///
    /// True when the page a login surface is about to load is the callback
    /// URL carrying an `oauth_verifier`: the server approved from an existing
    /// session and nothing needs to be shown.
    #[must_use]
    pub fn should_automatically_authenticate_from(&self, url: &str) -> bool {
        matches!(
            parse_callback(&self.authorize_callback_url(), url),
            Some(CallbackOutcome::Approved { .. })
        )
    }

    /// Authenticate if needed, discover records if needed, and return the
    /// active record
    ///
    /// # Errors
    /// - `Configuration` before any network I/O when settings are missing
    /// - `Authentication` when login is declined, times out or is rejected
    /// - `Discovery` when no records are accessible
    /// - `Network` on transport failures
    /// - `SessionInvalidated` when logout happens meanwhile
    #[instrument(skip(self))]
    pub async fn select_record(&self) -> Result<Record, IndivoError> {
        self.ready_to_connect()?;

        let generation = self.inner.generation();
        let preferred = self.ensure_authenticated().await?;
        let discovered = self.ensure_records(generation).await?;
        self.choose_active_record(preferred, discovered, generation).await
    }

    /// Cached record with `id`; never touches the network
    pub async fn record_with_id(&self, id: &str) -> Option<Record> {
        self.inner.records.get(id).await
    }

    pub async fn active_record(&self) -> Option<Record> {
        let id = self.active_record_id()?;
        self.inner.records.get(&id).await
    }

    #[must_use]
    pub fn active_record_id(&self) -> Option<String> {
        self.inner.state.lock().active_record_id.clone()
    }

    /// All cached records, ordered by id
    pub async fn known_records(&self) -> Vec<Record> {
        self.inner.records.all().await
    }

    /// Verifier of the last completed login
    #[must_use]
    pub fn last_oauth_verifier(&self) -> Option<String> {
        self.inner.state.lock().verifier.clone()
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.state.lock().auth
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth_state() == AuthState::Authenticated
    }

    /// Sign (if required) and dispatch `call`, then resolve its handle
    ///
    /// Cancelled or already dispatched calls are skipped without network I/O.
    /// A signed call without an access credential fails with
    /// `Authentication` before reaching the network.
    pub async fn perform_call(&self, call: ServerCall) {
        self.inner.dispatch(call).await;
    }

    /// Post-process a response and resolve the call
    ///
    /// Used by `perform_call`; public for embedders running their own
    /// transport. A 401/403 on a non-handshake call invalidates the access
    /// token and returns the session to `Unauthenticated`.
    pub async fn call_did_finish(
        &self,
        call: ServerCall,
        outcome: Result<HttpResponse, IndivoError>,
    ) {
        self.inner.finish_call(call, outcome).await;
    }

    /// End the session
    ///
    /// Clears credentials (memory and keychain), records, the active record
    /// and the verifier, abandons a pending handshake and notifies the
    /// delegate. Safe to call in any state.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        {
            let _commit = self.inner.commit.lock().await;
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

            let pending = {
                let mut state = self.inner.state.lock();
                state.auth = AuthState::Unauthenticated;
                state.active_record_id = None;
                state.verifier = None;
                state.discovery = None;
                state.pending.take()
            };
            if let Some(pending) = pending {
                pending.abort.abort();
                info!(handshake_id = pending.id, "Abandoned pending handshake");
            }

            if let Err(err) = self.inner.credentials.clear().await {
                warn!(error = %err, "Failed to remove persisted credentials");
            }
            self.inner.records.clear().await;
            info!(generation, "Logged out");
        }

        self.inner.delegate.user_did_logout(self);
    }

    async fn ensure_authenticated(&self) -> HandshakeResult {
        let shared = {
            let mut state = self.inner.state.lock();
            if state.auth == AuthState::Authenticated {
                return Ok(None);
            }
            let generation = self.inner.generation();
            let joined = state
                .pending
                .as_ref()
                .filter(|pending| pending.generation == generation)
                .map(|pending| {
                    debug!(handshake_id = pending.id, "Joining pending handshake");
                    pending.future.clone()
                });
            match joined {
                Some(future) => future,
                None => handshake::start(&self.inner, &mut state),
            }
        };
        shared.await
    }

    /// Run discovery when the cache is empty; returns the discovered records
    /// in response order (empty when the cache was already populated)
    ///
    /// Concurrent callers share one discovery call.
    async fn ensure_records(&self, generation: u64) -> DiscoveryResult {
        if !self.inner.records.is_empty().await {
            return Ok(Vec::new());
        }

        let shared = {
            let mut state = self.inner.state.lock();
            let joined = state
                .discovery
                .as_ref()
                .filter(|pending| pending.generation == generation)
                .map(|pending| {
                    debug!(discovery_id = pending.id, "Joining pending discovery");
                    pending.future.clone()
                });
            match joined {
                Some(future) => future,
                None => {
                    let id = self.inner.discovery_ids.fetch_add(1, Ordering::SeqCst) + 1;
                    let inner = self.inner.clone();
                    let future = async move {
                        let result = inner.discover(generation).await;
                        let mut state = inner.state.lock();
                        if state.discovery.as_ref().is_some_and(|pending| pending.id == id) {
                            state.discovery = None;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    state.discovery =
                        Some(PendingDiscovery { id, generation, future: future.clone() });
                    future
                }
            }
        };
        shared.await
    }

    async fn choose_active_record(
        &self,
        preferred: Option<String>,
        discovered: Vec<Record>,
        generation: u64,
    ) -> Result<Record, IndivoError> {
        let _commit = self.inner.commit.lock().await;
        if self.inner.generation() != generation {
            return Err(IndivoError::SessionInvalidated);
        }

        let records = &self.inner.records;
        let current = self.active_record_id();

        let mut chosen = None;
        for id in preferred.iter().chain(current.iter()) {
            chosen = records.get(id).await;
            if chosen.is_some() {
                break;
            }
            debug!(record_id = %id, "Preferred record not in cache");
        }
        if chosen.is_none() {
            chosen = match discovered.into_iter().next() {
                Some(record) => Some(record),
                None => records.first().await,
            };
        }

        let record = chosen.ok_or_else(|| {
            IndivoError::Discovery("no records are accessible to this app".to_string())
        })?;
        self.inner.state.lock().active_record_id = Some(record.id.clone());
        info!(record_id = %record.id, "Active record selected");

        Ok(record)
    }
}

impl std::fmt::Debug for IndivoServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndivoServer")
            .field("endpoint_url", &self.inner.config.endpoint_url)
            .field("app_id", &self.inner.config.app_id)
            .field("auth_state", &self.auth_state())
            .finish_non_exhaustive()
    }
}

impl ServerInner {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn discover(&self, generation: u64) -> DiscoveryResult {
        let (call, handle) = ServerCall::get(self.config.discovery_path.clone());
        self.dispatch(call).await;
        let response = handle.outcome().await?;

        let records = discovery::parse_records(&response.body)?;
        if records.is_empty() {
            warn!("Discovery returned no records");
            return Err(IndivoError::Discovery("no records are accessible to this app".to_string()));
        }

        let _commit = self.commit.lock().await;
        if self.generation() != generation {
            return Err(IndivoError::SessionInvalidated);
        }
        let count = self.records.insert_all(records.clone()).await;
        info!(count, "Record cache populated");

        Ok(records)
    }

    /// `{ui_url}/oauth/authorize?oauth_token=..` (endpoint URL when no UI
    /// URL is configured)
    pub(crate) fn authorize_url(&self, request_token: &str) -> Result<Url, IndivoError> {
        let (base, field) = if self.config.ui_url.trim().is_empty() {
            (self.config.endpoint_url.trim(), "endpoint_url")
        } else {
            (self.config.ui_url.trim(), "ui_url")
        };

        let mut url = Url::parse(&format!("{}{AUTHORIZE_PATH}", base.trim_end_matches('/')))
            .map_err(|_| IndivoError::missing(field))?;
        url.query_pairs_mut().append_pair(OAUTH_TOKEN, request_token);
        Ok(url)
    }

    pub(crate) async fn dispatch(&self, mut call: ServerCall) {
        if !call.begin(self.generation()) {
            return;
        }

        let signer = match call.auth() {
            CallAuth::Session if call.requires_signed_auth() => {
                self.credentials.access_signer().await
            }
            _ => None,
        };
        call.set_signed_with(signer.as_ref().and_then(OAuthSigner::token));

        let request = match call.to_request(&self.config.endpoint_url, signer.as_ref()) {
            Ok(request) => request,
            Err(err) => {
                self.finish_call(call, Err(err)).await;
                return;
            }
        };

        debug!(call_id = %call.id(), method = %call.method(), path = %call.path(), "Dispatching call");
        let outcome = self.transport.execute(request).await;
        self.finish_call(call, outcome).await;
    }

    pub(crate) async fn finish_call(
        &self,
        call: ServerCall,
        outcome: Result<HttpResponse, IndivoError>,
    ) {
        let result = self.evaluate(&call, outcome).await;
        if let Err(err) = &result {
            log_call_error(&call, err);
        }
        call.finish(result);
    }

    async fn evaluate(
        &self,
        call: &ServerCall,
        outcome: Result<HttpResponse, IndivoError>,
    ) -> CallOutcome {
        let generation = call.generation().unwrap_or_else(|| self.generation());
        if generation != self.generation() {
            return Err(IndivoError::SessionInvalidated);
        }

        let response = outcome?;
        if response.is_authorization_rejection() {
            if call.is_handshake() {
                return Err(IndivoError::Authentication(format!(
                    "server rejected the handshake ({})",
                    response.status
                )));
            }
            self.reject_access(call, generation).await;
            return Err(IndivoError::Authentication(format!(
                "server rejected the access token ({})",
                response.status
            )));
        }

        if !response.is_success() {
            return Err(IndivoError::Server {
                status: response.status,
                message: summarize_body(&response.body),
            });
        }

        Ok(CallResponse { status: response.status, body: response.body })
    }

    /// Drop the access token a rejected call was signed with
    ///
    /// Calls finished through `call_did_finish` without going through
    /// `dispatch` carry no token; the current one is taken for them.
    async fn reject_access(&self, call: &ServerCall, generation: u64) {
        let _commit = self.commit.lock().await;
        if self.generation() != generation {
            return;
        }

        let rejected = match call.signed_with() {
            Some(token) => Some(token.to_string()),
            None if call.requires_signed_auth() && call.generation().is_none() => self
                .credentials
                .get()
                .await
                .and_then(|credential| credential.access_token().map(str::to_string)),
            None => None,
        };
        let Some(rejected) = rejected else {
            debug!(call_id = %call.id(), "Rejected call carried no access token");
            return;
        };

        match self.credentials.invalidate_access(&rejected).await {
            Ok(false) => return,
            Ok(true) => {}
            Err(err) => warn!(error = %err, "Failed to remove persisted access token"),
        }
        let mut state = self.state.lock();
        if state.auth == AuthState::Authenticated {
            state.auth = AuthState::Unauthenticated;
        }
    }
}

fn log_call_error(call: &ServerCall, err: &IndivoError) {
    match err.severity() {
        ErrorSeverity::Info => debug!(call_id = %call.id(), error = %err, "Call ended"),
        ErrorSeverity::Warning => warn!(call_id = %call.id(), error = %err, "Call failed"),
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(call_id = %call.id(), error = %err, "Call failed");
        }
    }
}

fn summarize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut summary: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    summary.push('…');
    summary
}

#[cfg(test)]
mod tests {
    use indivo_common::testing::MockKeychainProvider;

    use super::*;
    use crate::login::{LoginFlow, LoginSurface};

    struct NoSurface;

    impl ServerDelegate for NoSurface {
        fn login_surface(&self, _flow: &LoginFlow) -> Option<Arc<dyn LoginSurface>> {
            None
        }

        fn user_did_logout(&self, _server: &IndivoServer) {}
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl HttpTransport for Unreachable {
        async fn execute(
            &self,
            _request: crate::transport::HttpRequest,
        ) -> Result<HttpResponse, IndivoError> {
            Err(IndivoError::Network("unreachable".to_string()))
        }
    }

    fn server(config: ServerConfig) -> IndivoServer {
        IndivoServer::new(
            config,
            Arc::new(NoSurface),
            Arc::new(Unreachable),
            Arc::new(MockKeychainProvider::default()),
        )
    }

    fn config() -> ServerConfig {
        ServerConfig::new(
            "https://indivo.example.org:8000",
            "https://indivo.example.org",
            "problems@apps.indivo.org",
            "problems",
            "yourface",
        )
    }

    #[test]
    fn ready_to_connect_reports_fields_in_order() {
        let mut cfg = config();
        cfg.client_key.clear();
        cfg.client_secret.clear();
        assert_eq!(server(cfg).ready_to_connect(), Err(IndivoError::missing("client_key")));

        let mut cfg = config();
        cfg.endpoint_url = "not a url".to_string();
        assert_eq!(server(cfg).ready_to_connect(), Err(IndivoError::missing("endpoint_url")));

        let mut cfg = config();
        cfg.ui_url = "::".to_string();
        assert_eq!(server(cfg).ready_to_connect(), Err(IndivoError::missing("ui_url")));

        assert!(server(config()).ready_to_connect().is_ok());
    }

    #[test]
    fn authorize_url_prefers_ui_server() {
        let srv = server(config());
        let url = srv.inner.authorize_url("req tok").unwrap();
        assert_eq!(url.as_str(), "https://indivo.example.org/oauth/authorize?oauth_token=req+tok");

        let mut cfg = config();
        cfg.ui_url.clear();
        let url = server(cfg).inner.authorize_url("t").unwrap();
        assert_eq!(url.as_str(), "https://indivo.example.org:8000/oauth/authorize?oauth_token=t");
    }

    #[test]
    fn automatic_authentication_policy() {
        let srv = server(config());
        let callback = srv.authorize_callback_url();
        assert_eq!(callback, "indivo-framework://problems@apps.indivo.org");

        assert!(srv.should_automatically_authenticate_from(&format!(
            "{callback}?oauth_token=t&oauth_verifier=v"
        )));
        assert!(!srv.should_automatically_authenticate_from(&format!(
            "{callback}?oauth_problem=user_refused"
        )));
        assert!(!srv.should_automatically_authenticate_from(
            "https://indivo.example.org/oauth/authorize?oauth_token=t"
        ));
    }

    #[tokio::test]
    async fn missing_login_surface_fails_authentication() {
        let srv = IndivoServer::new(
            config(),
            Arc::new(NoSurface),
            Arc::new(StaticTokens),
            Arc::new(MockKeychainProvider::default()),
        );

        let err = srv.select_record().await.unwrap_err();
        assert!(matches!(err, IndivoError::Authentication(_)));
        assert_eq!(srv.auth_state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn network_failure_returns_to_unauthenticated() {
        let srv = server(config());
        let err = srv.select_record().await.unwrap_err();
        assert!(matches!(err, IndivoError::Network(_)));
        assert_eq!(srv.auth_state(), AuthState::Unauthenticated);
    }

    /// Validates `IndivoServer::initialize` behavior for the restored
    /// credential scenario.
    ///
    /// Assertions:
    /// - Ensures the session starts out authenticated.
    #[tokio::test]
    async fn initialize_restores_persisted_session() {
        let keychain = Arc::new(MockKeychainProvider::default());
        keychain
            .store_tokens("problems@apps.indivo.org", &indivo_common::TokenPair::new("t", "s"))
            .unwrap();

        let srv = IndivoServer::new(
            config().with_store_credentials(true),
            Arc::new(NoSurface),
            Arc::new(Unreachable),
            keychain,
        );

        assert!(srv.initialize().await.unwrap());
        assert!(srv.is_authenticated());
    }

    #[tokio::test]
    async fn rejection_reported_by_external_transport_invalidates_access() {
        let keychain = Arc::new(MockKeychainProvider::default());
        keychain
            .store_tokens("problems@apps.indivo.org", &indivo_common::TokenPair::new("t", "s"))
            .unwrap();
        let srv = IndivoServer::new(
            config().with_store_credentials(true),
            Arc::new(NoSurface),
            Arc::new(Unreachable),
            keychain.clone(),
        );
        srv.initialize().await.unwrap();

        let (call, handle) = ServerCall::get("/records/");
        srv.call_did_finish(call, Ok(HttpResponse::new(403, "forbidden"))).await;

        assert!(matches!(handle.outcome().await, Err(IndivoError::Authentication(_))));
        assert_eq!(srv.auth_state(), AuthState::Unauthenticated);
        assert!(!keychain.has_tokens("problems@apps.indivo.org"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let summary = summarize_body(&body);
        assert_eq!(summary.chars().count(), MAX_ERROR_BODY_CHARS + 1);
        assert_eq!(summarize_body("  short  "), "short");
    }

    struct StaticTokens;

    #[async_trait::async_trait]
    impl HttpTransport for StaticTokens {
        async fn execute(
            &self,
            _request: crate::transport::HttpRequest,
        ) -> Result<HttpResponse, IndivoError> {
            Ok(HttpResponse::new(200, "oauth_token=req&oauth_token_secret=req-secret"))
        }
    }
}
