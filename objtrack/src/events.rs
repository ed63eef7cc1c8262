//! Backend callbacks and scheduler notices delivered to the tick loop.
//!
//! Producers on any thread hold a cloned [`EventSender`]; the tick loop owns
//! the single [`EventQueue`] and drains it once per tick.
//!
//! ```text
//! backend threads ──► EventSender ─┐
//! detection task  ──► EventSender ─┼──► EventQueue ──► drain() ──► registry
//! scheduler       ──► EventSender ─┘    (unbounded)
//! ```
//!
//! Events from one producer are drained in the order they were enqueued.

use tokio::sync::mpsc;

use crate::backend::BackendStatus;
use crate::model::{InstanceEventData, ModelId};
use crate::query::BatchOrigin;

/// How a detection call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionOutcome {
    Succeeded,
    /// The backend returned an error.
    Failed(String),
    /// The detection future panicked.
    Panicked,
}

impl DetectionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DetectionOutcome::Succeeded)
    }
}

/// Everything the tick loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A query batch was handed to the backend.
    DetectionAttempted {
        models: Vec<ModelId>,
        origin: BatchOrigin,
    },
    Added(InstanceEventData),
    Updated(InstanceEventData),
    Removed(InstanceEventData),
    RunningChanged(BackendStatus),
    /// Sent after the in-flight permit has been released. `seq` matches
    /// the dispatch that launched the call.
    DetectionCompleted { seq: u64, outcome: DetectionOutcome },
}

impl TrackerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TrackerEvent::DetectionAttempted { .. } => "detection_attempted",
            TrackerEvent::Added(_) => "added",
            TrackerEvent::Updated(_) => "updated",
            TrackerEvent::Removed(_) => "removed",
            TrackerEvent::RunningChanged(_) => "running_changed",
            TrackerEvent::DetectionCompleted { .. } => "detection_completed",
        }
    }
}

/// Create a connected sender/queue pair.
pub fn event_queue() -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventQueue { rx })
}

/// Producer handle. Cheap to clone, usable from any thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

impl EventSender {
    /// Queue an event. Never blocks.
    ///
    /// Events sent after the queue has been dropped are discarded.
    pub fn enqueue(&self, event: TrackerEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::debug!(kind = err.0.kind(), "Event queue closed, event dropped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-consumer end of the event queue.
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<TrackerEvent>,
}

impl EventQueue {
    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Yield the events queued at the time of the call, oldest first.
    ///
    /// Events enqueued while draining are left for the next call, so the
    /// iterator is finite even under a steady stream of producers.
    pub fn drain(&mut self) -> Drain<'_> {
        let remaining = self.rx.len();
        Drain {
            rx: &mut self.rx,
            remaining,
        }
    }

    /// Feed every queued event into `sink`, returning how many were drained.
    pub fn drain_into<F>(&mut self, mut sink: F) -> usize
    where
        F: FnMut(TrackerEvent),
    {
        let mut count = 0;
        for event in self.drain() {
            sink(event);
            count += 1;
        }
        count
    }
}

/// Iterator returned by [`EventQueue::drain`].
pub struct Drain<'a> {
    rx: &'a mut mpsc::UnboundedReceiver<TrackerEvent>,
    remaining: usize,
}

impl Iterator for Drain<'_> {
    type Item = TrackerEvent;

    fn next(&mut self) -> Option<TrackerEvent> {
        if self.remaining == 0 {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => {
                self.remaining -= 1;
                Some(event)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use crate::model::{InstanceId, TrackingMode};
    use nalgebra::Vector3;
    use std::sync::Arc;
    use std::thread;

    fn added(instance: InstanceId, coverage: f32) -> TrackerEvent {
        TrackerEvent::Added(InstanceEventData::located(
            instance,
            ModelId::random(),
            Pose::at(Vector3::zeros()),
            coverage,
            TrackingMode::Coarse,
        ))
    }

    #[test]
    fn test_drain_empty_queue() {
        let (_tx, mut queue) = event_queue();
        assert_eq!(queue.drain().count(), 0);
        assert_eq!(queue.drain_into(|_| {}), 0);
    }

    #[test]
    fn test_drain_preserves_fifo_order() {
        let (tx, mut queue) = event_queue();
        tx.enqueue(TrackerEvent::RunningChanged(BackendStatus::Running));
        tx.enqueue(TrackerEvent::RunningChanged(BackendStatus::Paused));
        tx.enqueue(TrackerEvent::DetectionCompleted {
            seq: 1,
            outcome: DetectionOutcome::Succeeded,
        });

        let kinds: Vec<_> = queue.drain().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["running_changed", "running_changed", "detection_completed"]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_is_bounded_to_events_present_at_call() {
        let (tx, mut queue) = event_queue();
        tx.enqueue(TrackerEvent::RunningChanged(BackendStatus::Running));

        let mut drain = queue.drain();
        assert!(drain.next().is_some());
        tx.enqueue(TrackerEvent::RunningChanged(BackendStatus::Paused));
        assert!(drain.next().is_none());

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().count(), 1);
    }

    #[test]
    fn test_enqueue_after_queue_dropped_is_silent() {
        let (tx, queue) = event_queue();
        drop(queue);
        assert!(tx.is_closed());
        tx.enqueue(TrackerEvent::RunningChanged(BackendStatus::Running));
    }

    #[test]
    fn test_per_producer_order_across_threads() {
        let (tx, mut queue) = event_queue();
        let producers: Vec<InstanceId> = (0..4).map(|_| InstanceId::random()).collect();
        let producers = Arc::new(producers);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let tx = tx.clone();
                let producers = Arc::clone(&producers);
                thread::spawn(move || {
                    for seq in 0..100 {
                        tx.enqueue(added(producers[i], seq as f32 / 100.0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seen = std::collections::HashMap::new();
        let drained = queue.drain_into(|event| {
            if let TrackerEvent::Added(data) = event {
                let prev = last_seen.insert(data.instance_id, data.coverage);
                if let Some(prev) = prev {
                    assert!(data.coverage > prev, "events reordered within a producer");
                }
            }
        });
        assert_eq!(drained, 400);
    }
}
