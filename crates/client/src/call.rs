//! Call Unit: one outstanding request against the server
//!
//! [`ServerCall::new`] returns the call and a [`CallHandle`]. The call is
//! handed to `IndivoServer::perform_call`; the handle observes its state,
//! can cancel it before dispatch, and awaits the outcome. The outcome is
//! delivered exactly once.

use std::fmt;
use std::sync::Arc;

use indivo_common::auth::OAuthSigner;
use indivo_domain::IndivoError;
use parking_lot::Mutex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::completion::Completion;
use crate::transport::HttpRequest;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Lifecycle of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    InFlight,
    Completed,
    Failed,
    Cancelled,
}

impl CallState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Successful (2xx) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResponse {
    pub status: u16,
    pub body: String,
}

impl CallResponse {
    /// Decode a JSON body
    ///
    /// # Errors
    /// Returns `IndivoError::InvalidResponse` if the body is not valid JSON
    /// for `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, IndivoError> {
        serde_json::from_str(&self.body)
            .map_err(|e| IndivoError::InvalidResponse(format!("invalid JSON body: {e}")))
    }

    /// Decode a form-encoded body into key/value pairs
    #[must_use]
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.trim().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

/// Result delivered to the call's owner
pub type CallOutcome = Result<CallResponse, IndivoError>;

/// Request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallBody {
    /// Form fields; included in the OAuth signature
    Form(Vec<(String, String)>),
    /// Opaque payload such as an XML document
    Raw { content_type: String, data: String },
}

/// How a call is authorized
#[derive(Clone)]
pub(crate) enum CallAuth {
    /// Current access credential from the credential store
    Session,
    /// Handshake leg with its own signer and protocol parameters.
    /// Authorization rejections on these never touch stored credentials.
    Handshake { signer: OAuthSigner, oauth_params: Vec<(String, String)> },
}

struct CallShared {
    id: Uuid,
    state: Mutex<CallState>,
    completion: Completion<CallOutcome>,
}

/// A request waiting to be dispatched
pub struct ServerCall {
    shared: Arc<CallShared>,
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    body: Option<CallBody>,
    requires_signed_auth: bool,
    auth: CallAuth,
    generation: Option<u64>,
    signed_with: Option<String>,
}

impl ServerCall {
    /// Create a signed call for `path` (relative to the endpoint URL)
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> (Self, CallHandle) {
        let id = Uuid::new_v4();
        let (completion, receiver) = Completion::new(format!("call {id}"));
        let shared =
            Arc::new(CallShared { id, state: Mutex::new(CallState::Pending), completion });

        let call = Self {
            shared: shared.clone(),
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            requires_signed_auth: true,
            auth: CallAuth::Session,
            generation: None,
            signed_with: None,
        };

        (call, CallHandle { shared, receiver })
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> (Self, CallHandle) {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> (Self, CallHandle) {
        Self::new(Method::POST, path)
    }

    pub(crate) fn handshake(
        path: &str,
        signer: OAuthSigner,
        oauth_params: Vec<(String, String)>,
    ) -> (Self, CallHandle) {
        let (mut call, handle) = Self::new(Method::POST, path);
        call.auth = CallAuth::Handshake { signer, oauth_params };
        (call, handle)
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a form field to the body
    ///
    /// Replaces a raw body set earlier.
    #[must_use]
    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.body {
            Some(CallBody::Form(fields)) => fields.push((key.into(), value.into())),
            _ => self.body = Some(CallBody::Form(vec![(key.into(), value.into())])),
        }
        self
    }

    /// Set an opaque body
    #[must_use]
    pub fn body(mut self, content_type: impl Into<String>, data: impl Into<String>) -> Self {
        self.body = Some(CallBody::Raw { content_type: content_type.into(), data: data.into() });
        self
    }

    /// Require OAuth signing with the session's access credential (default)
    #[must_use]
    pub fn signed(mut self) -> Self {
        self.requires_signed_auth = true;
        self
    }

    /// Send without an `Authorization` header
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.requires_signed_auth = false;
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    #[must_use]
    pub fn body_ref(&self) -> Option<&CallBody> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn requires_signed_auth(&self) -> bool {
        self.requires_signed_auth
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        *self.shared.state.lock()
    }

    pub(crate) fn auth(&self) -> &CallAuth {
        &self.auth
    }

    pub(crate) fn is_handshake(&self) -> bool {
        matches!(self.auth, CallAuth::Handshake { .. })
    }

    /// Session generation the call was dispatched under
    pub(crate) fn generation(&self) -> Option<u64> {
        self.generation
    }

    /// Access token the request was signed with
    pub(crate) fn signed_with(&self) -> Option<&str> {
        self.signed_with.as_deref()
    }

    pub(crate) fn set_signed_with(&mut self, token: Option<&str>) {
        self.signed_with = token.map(str::to_owned);
    }

    /// Move Pending → InFlight
    ///
    /// Returns `false` (and leaves the call untouched) if it was cancelled or
    /// already dispatched.
    pub(crate) fn begin(&mut self, generation: u64) -> bool {
        let mut state = self.shared.state.lock();
        if *state != CallState::Pending {
            debug!(call_id = %self.shared.id, state = ?*state, "Skipping dispatch");
            return false;
        }
        *state = CallState::InFlight;
        self.generation = Some(generation);
        true
    }

    /// `Authorization` header for this call, if it requires one
    ///
    /// `url` must be the full request URL including query parameters.
    ///
    /// # Errors
    /// Returns `IndivoError::Authentication` if signing fails
    pub fn sign(&self, signer: &OAuthSigner, url: &Url) -> Result<Option<String>, IndivoError> {
        self.sign_with(signer, url, &[])
    }

    fn sign_with(
        &self,
        signer: &OAuthSigner,
        url: &Url,
        oauth_params: &[(String, String)],
    ) -> Result<Option<String>, IndivoError> {
        if !self.requires_signed_auth {
            return Ok(None);
        }
        let form: &[(String, String)] = match &self.body {
            Some(CallBody::Form(fields)) => fields,
            _ => &[],
        };
        signer
            .authorization_header(self.method.as_str(), url, form, oauth_params)
            .map(Some)
    }

    /// Full request URL under `endpoint`
    ///
    /// # Errors
    /// Returns `IndivoError::Configuration("endpoint_url")` if the joined URL
    /// does not parse
    pub fn url(&self, endpoint: &str) -> Result<Url, IndivoError> {
        let base = endpoint.trim_end_matches('/');
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        let mut url = Url::parse(&format!("{base}{path}"))
            .map_err(|_| IndivoError::missing("endpoint_url"))?;
        if !self.params.is_empty() {
            url.query_pairs_mut().extend_pairs(self.params.iter());
        }
        Ok(url)
    }

    /// Build the transport request, signed with `signer` when required
    ///
    /// Handshake calls use their own signer and ignore `signer`.
    pub(crate) fn to_request(
        &self,
        endpoint: &str,
        signer: Option<&OAuthSigner>,
    ) -> Result<HttpRequest, IndivoError> {
        let url = self.url(endpoint)?;

        let authorization = match (&self.auth, signer) {
            (CallAuth::Handshake { signer, oauth_params }, _) => {
                self.sign_with(signer, &url, oauth_params)?
            }
            (CallAuth::Session, Some(signer)) => self.sign(signer, &url)?,
            (CallAuth::Session, None) if self.requires_signed_auth => {
                return Err(IndivoError::Authentication(
                    "no access credential; select a record first".to_string(),
                ));
            }
            (CallAuth::Session, None) => None,
        };

        let mut request = HttpRequest::new(self.method.clone(), url);
        if let Some(header) = authorization {
            request.headers.push(("Authorization".to_string(), header));
        }

        match &self.body {
            Some(CallBody::Form(fields)) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(fields.iter())
                    .finish();
                request.headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
                request.body = Some(encoded);
            }
            Some(CallBody::Raw { content_type, data }) => {
                request.headers.push(("Content-Type".to_string(), content_type.clone()));
                request.body = Some(data.clone());
            }
            None => {}
        }

        Ok(request)
    }

    /// Record the final state and deliver `outcome` to the handle
    pub(crate) fn finish(self, outcome: CallOutcome) {
        let next = match &outcome {
            Ok(_) => CallState::Completed,
            Err(IndivoError::Cancelled) => CallState::Cancelled,
            Err(_) => CallState::Failed,
        };
        *self.shared.state.lock() = next;
        debug!(call_id = %self.shared.id, state = ?next, "Call finished");

        // Only `CallHandle::cancel` competes, and it acts on Pending calls only.
        let _ = self.shared.completion.resolve(outcome);
    }
}

impl Drop for ServerCall {
    /// A call dropped before reaching a terminal state resolves as Cancelled
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if state.is_terminal() {
            return;
        }
        *state = CallState::Cancelled;
        drop(state);

        debug!(call_id = %self.shared.id, "Call dropped before completion");
        let _ = self.shared.completion.resolve(Err(IndivoError::Cancelled));
    }
}

impl fmt::Debug for ServerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCall")
            .field("id", &self.shared.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("requires_signed_auth", &self.requires_signed_auth)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Owner's view of a dispatched call
pub struct CallHandle {
    shared: Arc<CallShared>,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl CallHandle {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    #[must_use]
    pub fn state(&self) -> CallState {
        *self.shared.state.lock()
    }

    /// Cancel a call that has not been dispatched yet
    ///
    /// Resolves the outcome with `IndivoError::Cancelled` and returns `true`.
    /// In-flight and finished calls are left alone and `false` is returned.
    pub fn cancel(&self) -> bool {
        let mut state = self.shared.state.lock();
        if *state != CallState::Pending {
            return false;
        }
        *state = CallState::Cancelled;
        drop(state);

        debug!(call_id = %self.shared.id, "Call cancelled before dispatch");
        self.shared.completion.resolve(Err(IndivoError::Cancelled)).is_ok()
    }

    /// Wait for the outcome
    ///
    /// A call dropped without being dispatched resolves as `Cancelled`.
    pub async fn outcome(self) -> CallOutcome {
        self.receiver.await.unwrap_or(Err(IndivoError::Cancelled))
    }
}

impl fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use indivo_common::auth::TokenPair;

    use super::*;

    const ENDPOINT: &str = "https://indivo.example.org:8000/";

    fn signer() -> OAuthSigner {
        OAuthSigner::consumer_only("key", "secret").with_token(TokenPair::new("tok", "tok-secret"))
    }

    #[test]
    fn url_joins_endpoint_path_and_query() {
        let (call, _handle) = ServerCall::get("records/r-1/documents/");
        let call = call.param("offset", "10");
        let url = call.url(ENDPOINT).unwrap();
        assert_eq!(url.as_str(), "https://indivo.example.org:8000/records/r-1/documents/?offset=10");
    }

    /// Validates `ServerCall::to_request` behavior for the signed form body
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the Authorization header carries the access token.
    /// - Confirms the form body and content type are set.
    #[test]
    fn signed_form_request() {
        let (call, _handle) = ServerCall::post("/records/r-1/apps/a/setup");
        let call = call.form_param("label", "A B");
        let request = call.to_request(ENDPOINT, Some(&signer())).unwrap();

        let auth = request.header("authorization").unwrap();
        assert!(auth.starts_with("OAuth "));
        assert!(auth.contains("oauth_token=\"tok\""));
        assert_eq!(request.header("content-type"), Some(FORM_CONTENT_TYPE));
        assert_eq!(request.body.as_deref(), Some("label=A+B"));
    }

    #[test]
    fn unsigned_call_has_no_authorization_header() {
        let (call, _handle) = ServerCall::get("/version");
        let call = call.unsigned();
        assert_eq!(call.sign(&signer(), &call.url(ENDPOINT).unwrap()).unwrap(), None);

        let request = call.to_request(ENDPOINT, None).unwrap();
        assert!(request.header("authorization").is_none());
    }

    #[test]
    fn signed_call_without_signer_is_rejected() {
        let (call, _handle) = ServerCall::get("/records/");
        let result = call.to_request(ENDPOINT, None);
        assert!(matches!(result, Err(IndivoError::Authentication(_))));
    }

    #[test]
    fn handshake_call_uses_its_own_signer() {
        let consumer = OAuthSigner::consumer_only("key", "secret");
        let params = vec![("oauth_callback".to_string(), "indivo-framework://app".to_string())];
        let (call, _handle) = ServerCall::handshake("/oauth/request_token", consumer, params);

        let request = call.to_request(ENDPOINT, None).unwrap();
        let auth = request.header("authorization").unwrap();
        assert!(auth.contains("oauth_callback=\"indivo-framework%3A%2F%2Fapp\""));
        assert!(!auth.contains("oauth_token="));
        assert!(call.is_handshake());
    }

    /// Validates `CallHandle::cancel` behavior for the pending call scenario.
    ///
    /// Assertions:
    /// - Confirms the outcome is `Cancelled`.
    /// - Ensures a later dispatch attempt is refused.
    #[tokio::test]
    async fn cancel_pending_call_resolves_once() {
        let (mut call, handle) = ServerCall::get("/records/");

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert_eq!(handle.state(), CallState::Cancelled);
        assert!(!call.begin(0));
        assert_eq!(call.state(), CallState::Cancelled);

        assert_eq!(handle.outcome().await, Err(IndivoError::Cancelled));
    }

    #[tokio::test]
    async fn in_flight_call_cannot_be_cancelled() {
        let (mut call, handle) = ServerCall::get("/records/");
        assert!(call.begin(3));
        assert_eq!(call.generation(), Some(3));
        assert!(!handle.cancel());
        assert!(!call.begin(3));

        call.finish(Ok(CallResponse { status: 200, body: "ok".to_string() }));
        assert_eq!(handle.state(), CallState::Completed);
        assert_eq!(handle.outcome().await.unwrap().body, "ok");
    }

    #[tokio::test]
    async fn dropped_call_resolves_as_cancelled() {
        let (call, handle) = ServerCall::get("/records/");
        drop(call);
        assert_eq!(handle.outcome().await, Err(IndivoError::Cancelled));
    }

    #[test]
    fn response_decoders() {
        let json = CallResponse { status: 200, body: r#"{"ok":true}"#.to_string() };
        let value: serde_json::Value = json.json().unwrap();
        assert_eq!(value["ok"], true);

        let form = CallResponse { status: 200, body: "a=1&b=x%20y".to_string() };
        assert_eq!(form.form_pairs()[1], ("b".to_string(), "x y".to_string()));
    }
}
