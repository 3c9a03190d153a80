//! Common test utilities for integration tests
//!
//! Builds a `Lifecycle` on a manual clock with a fixed set of actors:
//! `alice` (publisher, editor), `bob` (publisher) and `carol` (no roles).

use std::sync::Arc;

use folio::application::Lifecycle;
use folio::domain::models::Config;
use folio::domain::ports::ManualClock;
use folio::services::RoleAuthorizer;

/// Role table shared by the integration tests.
pub fn authorizer() -> Arc<RoleAuthorizer> {
    Arc::new(
        RoleAuthorizer::new()
            .with_roles("alice", &["publisher", "editor"])
            .with_roles("bob", &["publisher"]),
    )
}

/// Lifecycle over in-memory adapters with a pinned clock.
pub fn lifecycle(config: Config) -> (Lifecycle, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::fixed());
    let lifecycle = Lifecycle::builder(config)
        .with_clock(clock.clone())
        .with_authorizer(authorizer())
        .build()
        .expect("Failed to build lifecycle");
    (lifecycle, clock)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
