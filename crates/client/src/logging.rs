//! Tracing setup for applications embedding the client

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "indivo_client=info,indivo_common=info";

/// Install a `fmt` subscriber filtered by `RUST_LOG`
///
/// Returns `false` if a global subscriber was already installed; calling it
/// twice is harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Same as [`init_tracing`] with JSON lines output
pub fn init_json_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry().with(filter).with(fmt::layer().json()).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let _ = init_tracing();
        assert!(!init_tracing());
        assert!(!init_json_tracing());
    }
}
