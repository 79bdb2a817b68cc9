//! Test execution port.

use crate::merge::domain::TestRunOutcome;
use async_trait::async_trait;
use camino::Utf8Path;

/// Runs a repository's tests inside a checkout.
#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Runs `configured`, or the command detected from the checkout's
    /// marker files, in `checkout`.
    async fn run_tests(&self, checkout: &Utf8Path, configured: Option<&str>) -> TestRunOutcome;
}
