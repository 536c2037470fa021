use std::sync::Arc;

use super::IndivoServer;
use crate::login::{LoginFlow, LoginSurface};

/// Application hooks the session manager calls back into
pub trait ServerDelegate: Send + Sync {
    /// Surface that should present `flow`
    ///
    /// `None` fails the handshake with an authentication error.
    fn login_surface(&self, flow: &LoginFlow) -> Option<Arc<dyn LoginSurface>>;

    /// Called once per `logout`, after credentials and records were cleared
    fn user_did_logout(&self, server: &IndivoServer);
}
