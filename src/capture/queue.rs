//! Work queue between the monitor (producer) and the sequencer (consumer).

use super::record::EventRecord;
use chrono::{DateTime, Local};
use std::collections::VecDeque;
use tokio::sync::{mpsc, watch};

/// Producer end, owned by the monitor
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<EventRecord>,
}

impl EventSender {
    /// Enqueue a record. Fails only when the consumer is gone.
    pub fn send(&self, record: EventRecord) -> Result<(), EventRecord> {
        self.tx.send(record).map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer end, owned by the sequencer.
///
/// Records past a drain cutoff are held back in arrival order and handed out
/// first on the next drain.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<EventRecord>,
    held: VecDeque<EventRecord>,
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { tx },
        EventReceiver {
            rx,
            held: VecDeque::new(),
        },
    )
}

impl EventReceiver {
    fn next_available(&mut self) -> Option<EventRecord> {
        if let Some(record) = self.held.pop_front() {
            return Some(record);
        }
        self.rx.try_recv().ok()
    }

    /// Take every available record captured at or before `cutoff`, in capture order.
    ///
    /// The first record later than the cutoff stops the drain and stays queued.
    /// With no cutoff everything currently available is taken.
    pub fn drain(&mut self, cutoff: Option<DateTime<Local>>) -> Vec<EventRecord> {
        let mut taken = Vec::new();
        while let Some(record) = self.next_available() {
            if let Some(limit) = cutoff {
                if record.timestamp > limit {
                    self.held.push_front(record);
                    break;
                }
            }
            taken.push(record);
        }
        taken
    }

    /// Records already held back from an earlier drain
    pub fn held_back(&self) -> usize {
        self.held.len()
    }
}

/// One-shot cooperative cancellation signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`StopSignal::stop`] has been called.
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ValidationOutcome;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record_at(name: &str, secs: i64) -> EventRecord {
        let base = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        EventRecord::at(
            name,
            json!({ "event": name }),
            "https://shop.example/",
            ValidationOutcome::NotValidated,
            base + Duration::seconds(secs),
        )
    }

    #[test]
    fn test_cutoff_holds_back_later_records() {
        let (tx, mut rx) = event_channel();
        for (name, t) in [("a", 1), ("b", 2), ("c", 3)] {
            tx.send(record_at(name, t)).unwrap();
        }

        let cutoff = record_at("cutoff", 2).timestamp;
        let first: Vec<_> = rx.drain(Some(cutoff)).into_iter().map(|r| r.event_name).collect();
        assert_eq!(first, vec!["a", "b"]);
        assert_eq!(rx.held_back(), 1);

        tx.send(record_at("d", 4)).unwrap();
        let rest: Vec<_> = rx.drain(None).into_iter().map(|r| r.event_name).collect();
        assert_eq!(rest, vec!["c", "d"]);
        assert!(rx.drain(None).is_empty());
    }

    #[test]
    fn test_held_record_is_claimed_by_next_cutoff() {
        let (tx, mut rx) = event_channel();
        tx.send(record_at("a", 3)).unwrap();
        tx.send(record_at("b", 5)).unwrap();

        assert!(rx.drain(Some(record_at("x", 2).timestamp)).is_empty());
        let next: Vec<_> = rx
            .drain(Some(record_at("x", 4).timestamp))
            .into_iter()
            .map(|r| r.event_name)
            .collect();
        assert_eq!(next, vec!["a"]);
        assert_eq!(rx.drain(None).len(), 1);
    }

    #[tokio::test]
    async fn test_stop_signal() {
        let signal = StopSignal::new();
        let mut waiter = signal.clone();
        assert!(!waiter.is_stopped());

        let task = tokio::spawn(async move {
            waiter.stopped().await;
            waiter.is_stopped()
        });
        signal.stop();
        assert!(task.await.unwrap());
        assert!(signal.is_stopped());
    }
}
