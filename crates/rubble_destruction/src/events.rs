//! # Destruction Events
//!
//! Bounded channel from the destruction engine to whatever renders, plays
//! sound for, or records what happened.
//!
//! ```text
//! ┌──────────────────┐      ┌─────────────┐      ┌──────────────┐
//! │ DestructibleWorld│─────>│    Event    │─────>│ Render/Audio │
//! │  (damage pass)   │      │   Channel   │      │   consumers  │
//! └──────────────────┘      └─────────────┘      └──────────────┘
//! ```
//!
//! Sends never block the damage pass. When the channel is full the event is
//! dropped and counted. Only the first drop is a warning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use rubble_core::Vec3;
use tracing::{debug, warn};

use crate::destructible::DestructibleId;
use crate::grid::VoxelId;

/// Something that happened to a destructible.
#[derive(Clone, Debug, PartialEq)]
pub enum DestructionEvent {
    // =========================================================================
    // Per-voxel
    // =========================================================================
    /// A hidden voxel became visible.
    VoxelExposed {
        /// Owning destructible.
        destructible: DestructibleId,
        /// Newly exposed voxel.
        voxel: VoxelId,
    },

    /// A voxel left its grid as debris.
    DebrisLaunched {
        /// Owning destructible.
        destructible: DestructibleId,
        /// Separated voxel.
        voxel: VoxelId,
        /// World position at launch.
        position: Vec3,
        /// Launch impulse.
        impulse: Vec3,
    },

    /// A debris proxy ran out of lifetime and went back to the pool.
    DebrisSettled {
        /// Destructible the debris came from.
        destructible: DestructibleId,
        /// Voxel the debris came from.
        voxel: VoxelId,
    },

    // =========================================================================
    // Per-object
    // =========================================================================
    /// The index buffer was replaced.
    MeshRebuilt {
        /// Destructible whose mesh changed.
        destructible: DestructibleId,
        /// New mesh revision.
        revision: u64,
        /// Indices in the new buffer.
        index_count: usize,
    },

    /// Too little structure remained; every voxel was launched.
    Collapsed {
        /// Destructible that collapsed.
        destructible: DestructibleId,
        /// Voxels launched by the collapse.
        voxels_launched: usize,
    },

    /// The destructible has no voxels left and was removed.
    Destroyed {
        /// Removed destructible.
        destructible: DestructibleId,
    },
}

/// Owner of the destruction channel.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<DestructionEvent>,
    receiver: Receiver<DestructionEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a sender handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
        }
    }

    /// Events dropped on a full channel by any of this bus's senders.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Creates a connected sender and receiver.
    #[must_use]
    pub fn create_pair(capacity: usize) -> (EventSender, EventReceiver) {
        let bus = Self::new(capacity);
        (bus.sender(), bus.receiver())
    }
}

/// Handle for sending events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: Sender<DestructionEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Sends an event without blocking.
    ///
    /// Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: DestructionEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if total == 1 {
                    warn!("Destruction event bus full, dropping events until drained");
                }
                debug!("Dropped {:?} ({} total)", event, total);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Events dropped on a full channel so far.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for receiving events.
#[derive(Clone, Debug)]
pub struct EventReceiver {
    receiver: Receiver<DestructionEvent>,
}

impl EventReceiver {
    /// Takes every pending event without blocking.
    #[inline]
    pub fn drain(&self) -> Vec<DestructionEvent> {
        self.receiver.try_iter().collect()
    }

    /// Takes one pending event, if any.
    #[inline]
    pub fn try_recv(&self) -> Option<DestructionEvent> {
        self.receiver.try_recv().ok()
    }

    /// Number of pending events.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Whether any event is pending.
    #[inline]
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.receiver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destroyed(id: u32) -> DestructionEvent {
        DestructionEvent::Destroyed {
            destructible: DestructibleId::new(id),
        }
    }

    #[test]
    fn test_event_send_receive() {
        let (sender, receiver) = EventBus::create_pair(16);

        assert!(sender.send(destroyed(1)));
        assert!(receiver.has_events());
        assert_eq!(receiver.try_recv(), Some(destroyed(1)));
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        let (sender, receiver) = EventBus::create_pair(2);

        assert!(sender.send(destroyed(1)));
        assert!(sender.send(destroyed(2)));
        assert!(!sender.send(destroyed(3)));
        assert!(!sender.send(destroyed(4)));
        assert_eq!(sender.dropped_count(), 2);

        assert_eq!(receiver.drain(), vec![destroyed(1), destroyed(2)]);
        assert_eq!(receiver.pending_count(), 0);
    }

    #[test]
    fn test_bus_counts_drops_from_every_sender() {
        let bus = EventBus::new(1);
        let first = bus.sender();
        let second = bus.sender();

        assert!(first.send(destroyed(1)));
        assert!(!second.send(destroyed(2)));
        assert!(!first.send(destroyed(3)));
        assert_eq!(bus.dropped_count(), 2);
    }
}
