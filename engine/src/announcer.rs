//! Sequenced delivery of user-facing notices.
//!
//! Failures can pile up in bursts (a failed stream, then a failed delete).
//! The announcer queues them and hands them to the sink one at a time with a
//! minimum gap in between, so each one is readable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use bgchat_types::ChatError;

pub const DEFAULT_ANNOUNCE_GAP: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    text: String,
}

impl Notice {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<&ChatError> for Notice {
    fn from(error: &ChatError) -> Self {
        Self::new(error.to_string())
    }
}

impl From<&str> for Notice {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Receiver of announced notices.
pub trait NoticeSink: Send + Sync + 'static {
    /// Deliver one notice. Returns `false` if the sink is gone.
    fn deliver(&self, notice: Notice) -> bool;
}

impl NoticeSink for mpsc::UnboundedSender<Notice> {
    fn deliver(&self, notice: Notice) -> bool {
        self.send(notice).is_ok()
    }
}

#[derive(Default)]
struct Queue {
    notices: VecDeque<Notice>,
    draining: bool,
    last_inline: Option<Instant>,
}

struct Shared {
    queue: Mutex<Queue>,
    sink: Box<dyn NoticeSink>,
    gap: Duration,
}

/// FIFO notice queue with a single drain task.
#[derive(Clone)]
pub struct ErrorAnnouncer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ErrorAnnouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorAnnouncer")
            .field("pending", &self.pending())
            .field("gap", &self.shared.gap)
            .finish_non_exhaustive()
    }
}

impl ErrorAnnouncer {
    pub fn new(sink: impl NoticeSink, gap: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                sink: Box::new(sink),
                gap,
            }),
        }
    }

    /// Enqueue a notice, starting the drain task if none is running.
    ///
    /// Outside a tokio runtime the queue is flushed inline, blocking the
    /// caller for the gap between deliveries.
    pub fn push(&self, notice: impl Into<Notice>) {
        let notice = notice.into();
        tracing::debug!(notice = %notice, "Queueing notice");

        let start_drain = {
            let mut queue = self.lock();
            queue.notices.push_back(notice);
            !std::mem::replace(&mut queue.draining, true)
        };
        if !start_drain {
            return;
        }

        let shared = Arc::clone(&self.shared);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(drain(shared));
            }
            Err(_) => shared.flush_inline(),
        }
    }

    /// Notices queued but not yet delivered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().notices.len()
    }

    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.lock().draining
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.shared.lock()
    }
}

impl Shared {
    /// Pop the next notice, or clear the drain flag when the queue is empty.
    fn next_or_stop(&self) -> Option<Notice> {
        let mut queue = self.lock();
        let next = queue.notices.pop_front();
        if next.is_none() {
            queue.draining = false;
        }
        next
    }

    fn flush_inline(&self) {
        while let Some(notice) = self.next_or_stop() {
            let last = self.lock().last_inline;
            let wait = last.map_or(Duration::ZERO, |at| self.gap.saturating_sub(at.elapsed()));
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }
            self.deliver(notice);
            self.lock().last_inline = Some(Instant::now());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, notice: Notice) {
        let text = notice.text.clone();
        if !self.sink.deliver(notice) {
            tracing::debug!(notice = %text, "Notice sink closed; dropping notice");
        }
    }
}

async fn drain(shared: Arc<Shared>) {
    while let Some(notice) = shared.next_or_stop() {
        shared.deliver(notice);
        tokio::time::sleep(shared.gap).await;
    }
}
