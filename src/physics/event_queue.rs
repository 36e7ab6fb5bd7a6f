//! Gameplay event queue
//!
//! Multi-producer, single-consumer. Resolution and mechanism movers push through
//! cloned [`EventSender`]s; the game-logic layer drains once per tick.

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};

use super::ItemId;

/// Kinds of events emitted by the collision core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Ball struck an item (or entered a kicker)
    Hit,
    /// Ball left a kicker
    Unhit,
    /// Ball entered a switch volume
    SwitchClosed,
    /// Ball left a switch volume
    SwitchOpen,
    TargetDropped,
    TargetRaised,
    /// Ball struck a flipper; param is the impact speed
    FlipperCollide,
    /// Spinner blade passed over the top
    Spin,
    Slingshot,
    /// Two balls collided; param is the impact speed
    BallBallCollide,
}

/// One queued event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsEvent {
    pub kind: EventKind,
    /// Item that produced the event
    pub item: ItemId,
    pub param: Option<f32>,
    /// Event belongs to an item group rather than a single item
    pub is_group: bool,
}

/// Producer handle
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<PhysicsEvent>,
    enabled: bool,
}

impl EventSender {
    pub fn send(&self, event: PhysicsEvent) {
        if !self.enabled {
            return;
        }
        // The receiver lives as long as the queue that created this sender
        if self.tx.send(event).is_err() {
            log::warn!("Event queue closed, dropping {:?}", event.kind);
        }
    }

    /// Shorthand for an item event
    pub fn emit(&self, kind: EventKind, item: ItemId, param: Option<f32>, is_group: bool) {
        self.send(PhysicsEvent {
            kind,
            item,
            param,
            is_group,
        });
    }
}

/// Consumer side of the queue
#[derive(Debug)]
pub struct EventQueue {
    tx: Sender<PhysicsEvent>,
    rx: Receiver<PhysicsEvent>,
    enabled: bool,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(true)
    }
}

impl EventQueue {
    pub fn new(enabled: bool) -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx, enabled }
    }

    /// New producer handle
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
            enabled: self.enabled,
        }
    }

    /// Take every queued event, in enqueue order
    pub fn drain(&self) -> Vec<PhysicsEvent> {
        self.rx.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
