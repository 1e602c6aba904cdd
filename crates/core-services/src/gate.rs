//! Edit-limit gate.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// "May I perform one more edit?" Consulted once per accept, before the
/// buffer is touched. An `Err` means the check itself failed.
pub trait EditLimitGate: Send + Sync {
    fn can_perform_edit(&self) -> impl Future<Output = anyhow::Result<bool>> + Send;
}

impl<T: EditLimitGate> EditLimitGate for std::sync::Arc<T> {
    fn can_perform_edit(&self) -> impl Future<Output = anyhow::Result<bool>> + Send {
        (**self).can_perform_edit()
    }
}

/// Gate for unlimited plans.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllEdits;

impl EditLimitGate for AllowAllEdits {
    async fn can_perform_edit(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Fixed allowance. Each allowed check consumes one edit.
#[derive(Debug)]
pub struct EditQuota {
    remaining: AtomicUsize,
}

impl EditQuota {
    pub fn new(allowance: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(allowance),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

impl EditLimitGate for EditQuota {
    async fn can_perform_edit(&self) -> anyhow::Result<bool> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        debug!(target: "actions.accept", allowed, remaining = self.remaining(), "edit_quota_checked");
        Ok(allowed)
    }
}
