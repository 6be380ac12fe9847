// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Progress events emitted while an agent is assembled and supervised.
//!
//! [`AgentFactory::assemble`](crate::AgentFactory::assemble) returns the
//! receiving end of an unbounded channel.  Callers may drain it as events
//! arrive or after the fact with [`drain`]; dropping the receiver is fine.

use std::time::Duration;

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyEvent {
    AdapterSelected {
        framework: String,
        model_id: String,
        generic: bool,
    },
    ModelLoaded {
        framework: String,
        model_id: String,
    },
    CapabilityLoaded {
        id: String,
        kind: &'static str,
    },
    CapabilityFailed {
        id: String,
        kind: &'static str,
        reason: String,
    },
    CapabilitySkipped {
        id: String,
    },
    StrategyBuilt {
        strategy: &'static str,
    },
    /// The summarizer could not be built and the primary agent stands in.
    SummarizerFallback {
        reason: String,
    },
    /// `elapsed` is only measured when there was at least one server.
    ResourcesActivated {
        count: usize,
        elapsed: Option<Duration>,
    },
    ResourceReleaseFailed {
        server_id: String,
        reason: String,
    },
    ResourcesReleased {
        count: usize,
    },
}

pub type EventReceiver = mpsc::UnboundedReceiver<AssemblyEvent>;

/// Sending half.  Sends never block and never fail the sender; events sent
/// after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct EventSender(mpsc::UnboundedSender<AssemblyEvent>);

impl EventSender {
    pub fn send(&self, event: AssemblyEvent) {
        let _ = self.0.send(event);
    }
}

pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender(tx), rx)
}

/// Everything currently queued on `rx`, without waiting.
pub fn drain(rx: &mut EventReceiver) -> Vec<AssemblyEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_survive_a_dropped_receiver() {
        let (tx, rx) = channel();
        tx.send(AssemblyEvent::StrategyBuilt { strategy: "null" });
        drop(rx);
        tx.send(AssemblyEvent::ResourcesReleased { count: 0 });
    }

    #[test]
    fn drain_returns_queued_events_in_order() {
        let (tx, mut rx) = channel();
        tx.send(AssemblyEvent::CapabilitySkipped { id: "a".into() });
        tx.send(AssemblyEvent::CapabilitySkipped { id: "b".into() });
        let ids: Vec<_> = drain(&mut rx)
            .into_iter()
            .map(|e| match e {
                AssemblyEvent::CapabilitySkipped { id } => id,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(drain(&mut rx).is_empty());
    }
}
