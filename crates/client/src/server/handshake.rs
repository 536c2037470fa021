//! OAuth 1.0a three-legged handshake
//!
//! 1. `POST /oauth/request_token` signed with the consumer credential and
//!    `oauth_callback`
//! 2. Login Flow Bridge presents `{ui_url}/oauth/authorize?oauth_token=..`
//!    and yields the `oauth_verifier`
//! 3. `POST /oauth/access_token` signed with the request token and the
//!    verifier
//!
//! Runs as a spawned task so every `select_record` caller can await the same
//! outcome, and logout can abort it.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use indivo_common::auth::{Credential, OAuthSigner, TokenResponse};
use indivo_domain::constants::{ACCESS_TOKEN_PATH, OAUTH_CALLBACK, OAUTH_VERIFIER, REQUEST_TOKEN_PATH};
use indivo_domain::IndivoError;
use tracing::{debug, info, warn};

use super::state::{AuthState, HandshakeResult, PendingHandshake, SessionState, SharedHandshake};
use super::ServerInner;
use crate::call::ServerCall;
use crate::login::{LoginError, LoginFlow};

/// Spawn a handshake and register it as pending
///
/// Called with the state lock held so no second handshake can start.
pub(crate) fn start(inner: &Arc<ServerInner>, state: &mut SessionState) -> SharedHandshake {
    let id = inner.handshake_ids.fetch_add(1, Ordering::SeqCst) + 1;
    let generation = inner.generation();

    let task = tokio::spawn(run(inner.clone(), id, generation));
    let abort = task.abort_handle();
    let future = async move {
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(IndivoError::SessionInvalidated),
            Err(err) => Err(IndivoError::Authentication(format!("handshake task failed: {err}"))),
        }
    }
    .boxed()
    .shared();

    state.auth = AuthState::AwaitingUserApproval;
    state.pending = Some(PendingHandshake { id, generation, future: future.clone(), abort });
    info!(handshake_id = id, "Starting authorization handshake");

    future
}

async fn run(inner: Arc<ServerInner>, id: u64, generation: u64) -> HandshakeResult {
    let result = exchange(&inner, generation).await;

    let current = inner.generation() == generation;
    let mut state = inner.state.lock();
    if state.pending.as_ref().is_some_and(|pending| pending.id == id) {
        state.pending = None;
    }

    match result {
        _ if !current => Err(IndivoError::SessionInvalidated),
        Ok(record_id) => Ok(record_id),
        Err(err) => {
            warn!(handshake_id = id, error = %err, "Authorization handshake failed");
            state.auth = AuthState::Unauthenticated;
            Err(err)
        }
    }
}

async fn exchange(inner: &Arc<ServerInner>, generation: u64) -> HandshakeResult {
    let config = &inner.config;
    let consumer = OAuthSigner::consumer_only(&config.client_key, &config.client_secret);
    let callback = config.authorize_callback_url();

    let (call, handle) = ServerCall::handshake(
        REQUEST_TOKEN_PATH,
        consumer.clone(),
        vec![(OAUTH_CALLBACK.to_string(), callback.clone())],
    );
    inner.dispatch(call).await;
    let request_token = TokenResponse::parse(&handle.outcome().await?.body)?.token;
    debug!("Obtained request token");

    let verifier = obtain_verifier(inner, &request_token.token, &callback).await?;
    {
        let mut state = inner.state.lock();
        if inner.generation() != generation {
            return Err(IndivoError::SessionInvalidated);
        }
        state.verifier = Some(verifier.clone());
        state.auth = AuthState::ExchangingToken;
    }

    let (call, handle) = ServerCall::handshake(
        ACCESS_TOKEN_PATH,
        consumer.with_token(request_token),
        vec![(OAUTH_VERIFIER.to_string(), verifier.clone())],
    );
    inner.dispatch(call).await;
    let access = TokenResponse::parse(&handle.outcome().await?.body)?;

    let _commit = inner.commit.lock().await;
    if inner.generation() != generation {
        return Err(IndivoError::SessionInvalidated);
    }
    let credential = Credential::consumer(&config.client_key, &config.client_secret)
        .with_access(access.token)
        .with_verifier(verifier);
    inner.credentials.set(credential).await?;
    inner.state.lock().auth = AuthState::Authenticated;

    info!(record_id = ?access.record_id, "Authorization handshake completed");
    Ok(access.record_id)
}

async fn obtain_verifier(
    inner: &Arc<ServerInner>,
    request_token: &str,
    callback: &str,
) -> Result<String, IndivoError> {
    let authorize_url = inner.authorize_url(request_token)?;
    let (flow, mut receiver) = LoginFlow::new(authorize_url, callback, request_token);

    let Some(surface) = inner.delegate.login_surface(&flow) else {
        let _ = flow.fail("no login surface available");
        return Err(LoginError::Presentation("no login surface available".to_string()).into());
    };

    // The timeout covers `present` as well as the wait for the outcome.
    let login = async {
        if let Err(err) = surface.present(flow.clone()).await {
            warn!(error = %err, "Login surface failed to present");
            if !flow.is_resolved() {
                let _ = flow.fail(err.to_string());
            }
        }
        (&mut receiver).await
    };

    let secs = inner.config.login_timeout_secs;
    let outcome = match tokio::time::timeout(Duration::from_secs(secs), login).await {
        Ok(Ok(outcome)) => outcome.map_err(IndivoError::from),
        Ok(Err(_)) => Err(LoginError::Presentation("login flow dropped".to_string()).into()),
        Err(_) => {
            warn!(timeout_secs = secs, "Login not completed in time");
            if !flow.is_resolved() {
                let _ = flow.fail("login timed out");
            }
            Err(IndivoError::Authentication(format!("login not completed within {secs}s")))
        }
    };

    surface.dismiss(&flow).await;
    outcome
}
