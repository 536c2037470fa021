//! # Indivo Client
//!
//! Session management and call dispatch against an Indivo clinical-records
//! server using OAuth 1.0a delegated authorization.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use indivo_client::{IndivoServer, LoginFlow, LoginSurface, ServerCall, ServerDelegate};
//!
//! struct App;
//!
//! impl ServerDelegate for App {
//!     fn login_surface(&self, _flow: &LoginFlow) -> Option<Arc<dyn LoginSurface>> {
//!         None
//!     }
//!
//!     fn user_did_logout(&self, _server: &IndivoServer) {}
//! }
//!
//! # async fn run() -> Result<(), indivo_domain::IndivoError> {
//! let config = indivo_client::config::load()?;
//! let server = IndivoServer::with_reqwest(config, Arc::new(App))?;
//! server.initialize().await?;
//!
//! let record = server.select_record().await?;
//! let (call, handle) = ServerCall::get(format!("/records/{}/reports/minimal/allergies/", record.id));
//! server.perform_call(call).await;
//! let response = handle.outcome().await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//! - [`server`]: `IndivoServer`, the auth state machine and the delegate
//! - [`call`]: `ServerCall` / `CallHandle`
//! - [`login`]: login flow bridge to an external consent surface
//! - [`records`] / [`discovery`]: record cache and discovery parsing
//! - [`transport`] / [`http`]: HTTP seam and its reqwest implementation
//! - [`config`] / [`logging`]: ambient configuration and tracing setup

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod call;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod http;
pub mod logging;
pub mod login;
pub mod records;
pub mod server;
pub mod transport;

pub use call::{CallHandle, CallResponse, CallState, ServerCall};
pub use login::{LoginError, LoginFlow, LoginSurface};
pub use server::{AuthState, IndivoServer, ServerDelegate};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
