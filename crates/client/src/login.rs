//! Login Flow Bridge
//!
//! The handshake cannot collect user consent itself. It builds a
//! [`LoginFlow`] holding the authorize URL and the callback recognizer, and
//! asks the delegate for a [`LoginSurface`] to present it. The surface
//! reports every navigation through [`LoginFlow::handle_navigation`]; the
//! flow resolves once the redirect to the app's callback URL shows up, or
//! when the surface cancels or fails.

use std::sync::Arc;

use async_trait::async_trait;
use indivo_domain::constants::{OAUTH_PROBLEM, OAUTH_TOKEN, OAUTH_VERIFIER};
use indivo_domain::IndivoError;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::completion::Completion;

/// Why a login flow ended without a verifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    /// The user dismissed the surface or refused access
    #[error("User cancelled the login")]
    UserCancelled,

    /// The surface could not be shown or failed while loading
    #[error("Login presentation failed: {0}")]
    Presentation(String),
}

impl From<LoginError> for IndivoError {
    fn from(err: LoginError) -> Self {
        IndivoError::Authentication(err.to_string())
    }
}

/// Result of a login flow: the `oauth_verifier` on approval
pub type LoginOutcome = Result<String, LoginError>;

/// External UI that shows the authorize page
#[async_trait]
pub trait LoginSurface: Send + Sync {
    /// Show `flow.authorize_url()` and start reporting navigations
    ///
    /// Returning does not mean the user finished; the flow resolves through
    /// `handle_navigation`, `cancel` or `fail`.
    ///
    /// # Errors
    /// A `LoginError` resolves the flow with that error
    async fn present(&self, flow: Arc<LoginFlow>) -> Result<(), LoginError>;

    /// Remove the surface after the flow resolved
    async fn dismiss(&self, _flow: &LoginFlow) {}
}

/// What a redirect to the callback URL carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Approved { verifier: String, token: Option<String> },
    Refused(Option<String>),
}

/// Interpret `url` as a redirect to `callback_url`
///
/// Returns `None` when `url` is not the callback. The match is on the
/// literal prefix (the app id may contain `@`), followed by the end of the
/// string, `/`, `?` or `#`. Scheme comparison ignores case.
#[must_use]
pub fn parse_callback(callback_url: &str, url: &str) -> Option<CallbackOutcome> {
    let prefix = url.get(..callback_url.len())?;
    if !prefix.eq_ignore_ascii_case(callback_url) {
        return None;
    }
    let rest = &url[callback_url.len()..];
    if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
        return None;
    }

    let query = rest.split_once('?').map(|(_, q)| q).unwrap_or("");
    let query = query.split_once('#').map(|(q, _)| q).unwrap_or(query);

    let mut verifier = None;
    let mut token = None;
    let mut problem = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            OAUTH_VERIFIER => verifier = Some(value.into_owned()),
            OAUTH_TOKEN => token = Some(value.into_owned()),
            OAUTH_PROBLEM => problem = Some(value.into_owned()),
            _ => {}
        }
    }

    match verifier.filter(|v| !v.is_empty()) {
        Some(verifier) if problem.is_none() => Some(CallbackOutcome::Approved { verifier, token }),
        _ => Some(CallbackOutcome::Refused(problem)),
    }
}

/// One interactive approval of a request token
pub struct LoginFlow {
    authorize_url: Url,
    callback_url: String,
    request_token: String,
    completion: Completion<LoginOutcome>,
}

impl LoginFlow {
    /// Create a flow and the receiver its outcome is delivered to
    #[must_use]
    pub fn new(
        authorize_url: Url,
        callback_url: impl Into<String>,
        request_token: impl Into<String>,
    ) -> (Arc<Self>, oneshot::Receiver<LoginOutcome>) {
        let (completion, receiver) = Completion::new("login flow");
        let flow = Self {
            authorize_url,
            callback_url: callback_url.into(),
            request_token: request_token.into(),
            completion,
        };
        (Arc::new(flow), receiver)
    }

    /// Page the surface should load
    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Redirect URL that ends the flow
    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Whether `url` is the redirect that ends this flow
    #[must_use]
    pub fn is_callback(&self, url: &str) -> bool {
        parse_callback(&self.callback_url, url).is_some()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.completion.is_resolved()
    }

    /// Report a navigation the surface is about to perform
    ///
    /// Returns `Ok(true)` when `url` was the callback and the flow resolved
    /// (the surface should stop loading), `Ok(false)` for any other page.
    ///
    /// # Errors
    /// Returns `IndivoError::DoubleCompletion` if the flow already resolved
    pub fn handle_navigation(&self, url: &str) -> Result<bool, IndivoError> {
        let Some(outcome) = parse_callback(&self.callback_url, url) else {
            return Ok(false);
        };

        let result = match outcome {
            CallbackOutcome::Approved { token: Some(token), .. } if token != self.request_token => {
                warn!("Callback carried a different request token");
                Err(LoginError::Presentation("callback for a different request token".to_string()))
            }
            CallbackOutcome::Approved { verifier, .. } => {
                debug!("Login approved");
                Ok(verifier)
            }
            CallbackOutcome::Refused(problem) => {
                debug!(problem = ?problem, "Login refused");
                Err(LoginError::UserCancelled)
            }
        };

        self.completion.resolve(result)?;
        Ok(true)
    }

    /// The user dismissed the surface
    ///
    /// # Errors
    /// Returns `IndivoError::DoubleCompletion` if the flow already resolved
    pub fn cancel(&self) -> Result<(), IndivoError> {
        self.completion.resolve(Err(LoginError::UserCancelled))
    }

    /// The surface failed
    ///
    /// # Errors
    /// Returns `IndivoError::DoubleCompletion` if the flow already resolved
    pub fn fail(&self, message: impl Into<String>) -> Result<(), IndivoError> {
        self.completion.resolve(Err(LoginError::Presentation(message.into())))
    }
}

impl std::fmt::Debug for LoginFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlow")
            .field("authorize_url", &self.authorize_url.path())
            .field("callback_url", &self.callback_url)
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}
