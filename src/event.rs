//! Outbound event stream.
//!
//! The knowledge base and the input router report through a single callback.
//! The callback must never block its caller: sinks that cross thread
//! boundaries buffer internally ([`channel_sink`]).

use std::sync::Arc;

use crossbeam_channel::{Receiver, unbounded};

use crate::base::AssertionId;

/// An observable kernel event.
#[derive(Debug, Clone, PartialEq)]
pub enum KbEvent {
    /// An externally-supplied fact entering the commit pipeline (pre-commit).
    Input {
        kif: String,
        priority: f64,
        depth: u32,
        source: &'static str,
    },
    /// A successful commit.
    Added {
        id: AssertionId,
        priority: f64,
        depth: u32,
        kif: String,
    },
    /// Explicit or cascade retraction.
    Retracted { id: AssertionId },
    /// Capacity-driven removal.
    Evict { id: AssertionId },
}

/// The single outbound callback invoked by the kernel.
pub type EventSink = Arc<dyn Fn(&KbEvent) + Send + Sync>;

/// A sink that discards every event.
pub fn null_sink() -> EventSink {
    Arc::new(|_| {})
}

/// A sink that forwards events into an unbounded channel, decoupling the
/// consumer from the emitting thread.
pub fn channel_sink() -> (EventSink, Receiver<KbEvent>) {
    let (tx, rx) = unbounded();
    let sink: EventSink = Arc::new(move |event: &KbEvent| {
        let _ = tx.send(event.clone());
    });
    (sink, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, rx) = channel_sink();
        sink(&KbEvent::Retracted {
            id: AssertionId::new("fact-ground-0"),
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            KbEvent::Retracted {
                id: AssertionId::new("fact-ground-0")
            }
        );
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = channel_sink();
        drop(rx);
        sink(&KbEvent::Evict {
            id: AssertionId::new("fact-ground-1"),
        });
    }
}
