// src/pipeline/event_bus.rs
//
// Decoupled event system. The engine publishes what happened during an
// attempt; UI and session recording drain the queue instead of polling
// engine internals.

use crate::decision::{Decision, EngineStateKind};
use crate::labels::SignKey;
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged {
        from: EngineStateKind,
        to: EngineStateKind,
    },

    CountdownTick {
        remaining: u32,
    },

    SampleProgress {
        collected: usize,
        total: usize,
    },

    Scored {
        percent: u8,
    },

    Decided {
        target: SignKey,
        decision: Decision,
    },

    Cancelled {
        target: Option<SignKey>,
    },
}

pub struct EventBus {
    events: VecDeque<EngineEvent>,
    max_pending: usize,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
        }
    }

    pub fn publish(&mut self, event: EngineEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }
}
