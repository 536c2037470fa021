//! Testing utilities
//!
//! - **[`mocks`]**: in-memory keychain double
//!
//! ```ignore
//! use indivo_common::testing::MockKeychainProvider;
//!
//! let keychain = MockKeychainProvider::new("Indivo.test");
//! keychain.set_secret("access.app", "token").unwrap();
//! assert!(keychain.secret_exists("access.app"));
//! ```

pub mod mocks;

pub use mocks::MockKeychainProvider;
