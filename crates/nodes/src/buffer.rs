//! The inbound buffer: an unbounded FIFO shared by one producer path and the
//! single consumer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use pipeline::InboundSink;
use serde_json::Value;

/// Payloads waiting to be processed, oldest first.
///
/// Emptiness checks and removal happen under the same lock, so a payload is
/// handed out at most once no matter how producers and the consumer interleave.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    queue: Mutex<VecDeque<Value>>,
}

impl InboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the deque half-modified, so
    // a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Value>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a payload. Never blocks on capacity and never fails.
    pub fn enqueue(&self, payload: Value) {
        self.lock().push_back(payload);
    }

    /// Advisory emptiness check. The answer may be stale by the time it is used;
    /// [`InboundBuffer::try_take`] re-checks under the lock.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Removes and returns the oldest payload, or `None` if the buffer is empty.
    pub fn try_take(&self) -> Option<Value> {
        let mut queue = self.lock();
        if queue.is_empty() {
            return None;
        }
        queue.pop_front()
    }
}

impl InboundSink for InboundBuffer {
    fn enqueue(&self, payload: Value) {
        InboundBuffer::enqueue(self, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn payloads_come_out_in_arrival_order() {
        let buffer = InboundBuffer::new();
        buffer.enqueue(json!(1));
        buffer.enqueue(json!("two"));
        buffer.enqueue(json!({"three": 3}));
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.try_take(), Some(json!(1)));
        assert_eq!(buffer.try_take(), Some(json!("two")));
        assert_eq!(buffer.try_take(), Some(json!({"three": 3})));
        assert_eq!(buffer.try_take(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn concurrent_producers_and_consumers_take_each_payload_once() {
        let buffer = Arc::new(InboundBuffer::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        buffer.enqueue(json!(p * 1000 + i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(v) = buffer.try_take() {
                        taken.push(v.as_i64().unwrap());
                    }
                    taken
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for consumer in consumers {
            for v in consumer.join().unwrap() {
                assert!(seen.insert(v), "payload {v} taken twice");
            }
        }
        assert_eq!(seen.len(), 1000);
        assert!(buffer.is_empty());
    }
}
