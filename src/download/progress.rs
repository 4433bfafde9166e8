//! Progress events and sinks for in-flight transfers.
//!
//! A [`ProgressTracker`] turns raw observations (byte counts or percentage
//! samples) into [`TransferProgress`] events. Events are strictly increasing,
//! never repeat a percentage, stay within `0..=100`, and are only emitted
//! while the transfer is in progress.
//!
//! Consumers implement [`ProgressSink`]. Closures work directly; use
//! [`ChannelProgressSink`] to hand events to another task and
//! [`FanoutProgressSink`] to feed several consumers at once.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A single progress observation for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    /// Identifier of the file being transferred.
    pub identifier: String,
    /// Human-readable name of the transfer.
    pub display_name: String,
    /// Completion percentage in `0..=100`.
    pub percent_complete: u8,
}

/// Receiver of progress events.
///
/// Implementations must return quickly; they run on the transfer task.
pub trait ProgressSink: Send + Sync {
    /// Called once per emitted progress event.
    fn on_progress(&self, event: &TransferProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    fn on_progress(&self, event: &TransferProgress) {
        self(event);
    }
}

/// Forwards events into a bounded channel.
///
/// Events are dropped when the channel is full or the receiver is gone, so a
/// slow consumer never stalls the transfer.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: mpsc::Sender<TransferProgress>,
}

impl ChannelProgressSink {
    /// Creates a sink and its receiving end with the given capacity.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TransferProgress>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, event: &TransferProgress) {
        if let Err(error) = self.sender.try_send(event.clone()) {
            trace!(%error, "progress event dropped");
        }
    }
}

/// Delivers every event to each inner sink in registration order.
#[derive(Default, Clone)]
pub struct FanoutProgressSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutProgressSink {
    /// Creates an empty fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a consumer.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true when no consumer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl std::fmt::Debug for FanoutProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutProgressSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl ProgressSink for FanoutProgressSink {
    fn on_progress(&self, event: &TransferProgress) {
        for sink in &self.sinks {
            sink.on_progress(event);
        }
    }
}

/// Writes every event to the `tracing` log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProgressSink;

impl ProgressSink for LoggingProgressSink {
    fn on_progress(&self, event: &TransferProgress) {
        debug!(
            file_id = %event.identifier,
            percent = event.percent_complete,
            "transfer progress"
        );
    }
}

/// Per-transfer emission state.
///
/// Owned by exactly one transfer; no state is shared between transfers.
pub struct ProgressTracker<'a> {
    identifier: String,
    display_name: String,
    sink: Option<&'a dyn ProgressSink>,
    last_emitted: Option<u8>,
    active: bool,
}

impl<'a> ProgressTracker<'a> {
    /// Creates an inactive tracker; call [`start`](Self::start) before observing.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        sink: Option<&'a dyn ProgressSink>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            sink,
            last_emitted: None,
            active: false,
        }
    }

    /// Marks the transfer as in progress; observations are emitted from now on.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Marks the transfer as finished; later observations are ignored.
    pub fn finish(&mut self) {
        self.active = false;
    }

    /// Last emitted percentage, if any.
    #[must_use]
    pub fn last_emitted(&self) -> Option<u8> {
        self.last_emitted
    }

    /// Observes a raw percentage sample.
    ///
    /// Returns true when an event was emitted. Samples outside `0..=100`, or
    /// not strictly above the last emitted value, are ignored.
    pub fn observe_percent(&mut self, percent: u64) -> bool {
        if !self.active || percent > 100 {
            return false;
        }
        let Ok(percent) = u8::try_from(percent) else {
            return false;
        };
        if self.last_emitted.is_some_and(|last| percent <= last) {
            return false;
        }

        self.last_emitted = Some(percent);
        if let Some(sink) = self.sink {
            sink.on_progress(&TransferProgress {
                identifier: self.identifier.clone(),
                display_name: self.display_name.clone(),
                percent_complete: percent,
            });
        }
        true
    }

    /// Observes a byte count against the expected total.
    ///
    /// Silent when the total is unknown or zero.
    pub fn observe_bytes(&mut self, received: u64, total: Option<u64>) -> bool {
        match total {
            Some(total) if total > 0 => self.observe_percent(rounded_percent(received, total)),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ProgressTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("identifier", &self.identifier)
            .field("last_emitted", &self.last_emitted)
            .field("active", &self.active)
            .field("has_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

/// `round(received / total * 100)` in integer arithmetic.
fn rounded_percent(received: u64, total: u64) -> u64 {
    let scaled = u128::from(received) * 100 + u128::from(total) / 2;
    u64::try_from(scaled / u128::from(total)).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn collecting_sink() -> (Arc<Mutex<Vec<u8>>>, impl ProgressSink) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        let sink = move |event: &TransferProgress| {
            inner.lock().unwrap().push(event.percent_complete);
        };
        (seen, sink)
    }

    #[test]
    fn test_non_monotonic_samples_emit_strictly_increasing() {
        let (seen, sink) = collecting_sink();
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        for sample in [10, 10, 25, 20, 25, 100] {
            tracker.observe_percent(sample);
        }
        assert_eq!(*seen.lock().unwrap(), vec![10, 25, 100]);
    }

    #[test]
    fn test_out_of_range_samples_ignored() {
        let (seen, sink) = collecting_sink();
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        assert!(!tracker.observe_percent(101));
        assert!(!tracker.observe_percent(u64::MAX));
        assert!(tracker.observe_percent(0));
        assert!(!tracker.observe_percent(0));
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_inactive_tracker_emits_nothing() {
        let (seen, sink) = collecting_sink();
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        assert!(!tracker.observe_percent(50));
        tracker.start();
        assert!(tracker.observe_percent(60));
        tracker.finish();
        assert!(!tracker.observe_percent(70));
        assert_eq!(*seen.lock().unwrap(), vec![60]);
        assert_eq!(tracker.last_emitted(), Some(60));
    }

    #[test]
    fn test_observe_bytes_rounds_and_dedupes() {
        let (seen, sink) = collecting_sink();
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        // 1/3 -> 33, 2/3 -> 67 (rounded), 1000/1000 -> 100
        tracker.observe_bytes(333, Some(1000));
        tracker.observe_bytes(334, Some(1000));
        tracker.observe_bytes(666, Some(1000));
        tracker.observe_bytes(667, Some(1000));
        tracker.observe_bytes(1000, Some(1000));
        assert_eq!(*seen.lock().unwrap(), vec![33, 67, 100]);
    }

    #[test]
    fn test_observe_bytes_without_total_is_silent() {
        let (seen, sink) = collecting_sink();
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        assert!(!tracker.observe_bytes(500, None));
        assert!(!tracker.observe_bytes(500, Some(0)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_observe_bytes_overrun_is_ignored() {
        let mut tracker = ProgressTracker::new("id", "name", None);
        tracker.start();
        assert!(!tracker.observe_bytes(2000, Some(1000)));
        assert!(tracker.observe_bytes(1000, Some(1000)));
    }

    #[test]
    fn test_event_carries_identifier_and_name() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&events);
        let sink = move |event: &TransferProgress| inner.lock().unwrap().push(event.clone());
        let mut tracker = ProgressTracker::new("abc", "Google Drive File", Some(&sink));
        tracker.start();
        tracker.observe_percent(42);
        let events = events.lock().unwrap();
        assert_eq!(
            events[0],
            TransferProgress {
                identifier: "abc".to_string(),
                display_name: "Google Drive File".to_string(),
                percent_complete: 42,
            }
        );
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, mut receiver) = ChannelProgressSink::channel(1);
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        tracker.observe_percent(10);
        tracker.observe_percent(20);
        assert_eq!(receiver.try_recv().unwrap().percent_complete, 10);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_tolerates_closed_receiver() {
        let (sink, receiver) = ChannelProgressSink::channel(4);
        drop(receiver);
        let mut tracker = ProgressTracker::new("id", "name", Some(&sink));
        tracker.start();
        assert!(tracker.observe_percent(10));
    }

    #[test]
    fn test_fanout_delivers_to_every_sink() {
        let (first, first_sink) = collecting_sink();
        let (second, second_sink) = collecting_sink();
        let fanout = FanoutProgressSink::new()
            .with(Arc::new(first_sink))
            .with(Arc::new(second_sink))
            .with(Arc::new(LoggingProgressSink));
        assert_eq!(fanout.len(), 3);

        let mut tracker = ProgressTracker::new("id", "name", Some(&fanout));
        tracker.start();
        tracker.observe_percent(5);
        tracker.observe_percent(50);
        assert_eq!(*first.lock().unwrap(), vec![5, 50]);
        assert_eq!(*second.lock().unwrap(), vec![5, 50]);
    }

    #[test]
    fn test_rounded_percent() {
        assert_eq!(rounded_percent(0, 10), 0);
        assert_eq!(rounded_percent(5, 1000), 1);
        assert_eq!(rounded_percent(4, 1000), 0);
        assert_eq!(rounded_percent(u64::MAX, u64::MAX), 100);
    }
}
