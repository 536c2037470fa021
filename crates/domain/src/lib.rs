//! # Indivo Domain
//!
//! Domain types shared by the Indivo session crates.
//!
//! This crate contains:
//! - The `IndivoError` taxonomy and `Result` alias
//! - Server configuration (`ServerConfig`)
//! - Cached record handles (`Record`)
//! - Protocol constants (OAuth paths, parameter names, defaults)
//!
//! ## Architecture
//! - No dependencies on other Indivo crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
