use async_trait::async_trait;

use crate::device::DeviceBridge;

/// One strategy for finding the foreground application.
///
/// Strategies are tried in order and the first `Some` wins; a probe that
/// fails internally reports `None` rather than an error.
#[async_trait]
pub trait ForegroundProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self, device: &dyn DeviceBridge) -> Option<String>;
}
