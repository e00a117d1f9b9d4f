use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::domain::JobId;

/// Cancellation tokens of the pipelines currently running in this process.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<JobId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn register(self: &Arc<Self>, job_id: JobId) -> CancellationRegistration {
        let token = CancellationToken::new();
        self.lock().insert(job_id, token.clone());
        CancellationRegistration {
            registry: Arc::clone(self),
            job_id,
            token,
        }
    }

    /// Returns `true` if a running pipeline was signalled.
    pub fn cancel(&self, job_id: JobId) -> bool {
        match self.lock().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, job_id: JobId) -> bool {
        self.lock().contains_key(&job_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Deregisters the job's token when dropped.
pub struct CancellationRegistration {
    registry: Arc<CancellationRegistry>,
    job_id: JobId,
    token: CancellationToken,
}

impl CancellationRegistration {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CancellationRegistration {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.job_id);
    }
}
