//! Playback-stopped notification
//!
//! Subscribers receive a [`PlaybackStopped`] over a crossbeam channel each
//! time a sink halts. Dropped receivers are pruned on the next notify.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{unbounded, Receiver, Sender};

/// Why playback halted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The pull source ran dry
    EndOfStream,
    /// The device reported an error
    DeviceError(String),
    /// `stop` was called
    Explicit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::DeviceError(msg) => write!(f, "device error: {}", msg),
            StopReason::Explicit => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackStopped {
    pub reason: StopReason,
}

/// Fan-out of stop events to any number of listeners
#[derive(Debug, Clone, Default)]
pub struct StopNotifier {
    subscribers: Arc<Mutex<Vec<Sender<PlaybackStopped>>>>,
}

impl StopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<PlaybackStopped> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Send `reason` to every live subscriber
    pub fn notify(&self, reason: StopReason) {
        log::debug!("Playback stopped: {}", reason);
        let event = PlaybackStopped { reason };
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_subscribers_receive() {
        let notifier = StopNotifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();

        notifier.notify(StopReason::Explicit);

        assert_eq!(a.try_recv().unwrap().reason, StopReason::Explicit);
        assert_eq!(b.try_recv().unwrap().reason, StopReason::Explicit);
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let notifier = StopNotifier::new();
        let kept = notifier.subscribe();
        drop(notifier.subscribe());
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.notify(StopReason::DeviceError("unplugged".to_string()));
        assert_eq!(notifier.subscriber_count(), 1);
        assert_eq!(
            kept.try_recv().unwrap().reason,
            StopReason::DeviceError("unplugged".to_string())
        );
    }
}
