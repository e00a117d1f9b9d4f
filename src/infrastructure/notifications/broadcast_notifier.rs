use tokio::sync::broadcast;

use crate::application::ports::{JobEvent, JobNotifier};

const DEFAULT_CAPACITY: usize = 256;

/// Fans job events out to live subscribers such as SSE streams.
/// Slow subscribers skip events rather than block the pipeline.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<JobEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl JobNotifier for BroadcastNotifier {
    fn notify(&self, event: &JobEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event.clone());
    }
}
