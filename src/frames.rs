//! Frame registry - which card each live frame is hosting.
//!
//! The registry is the single source of truth for frame validity. Every
//! registration gets a fresh generation number, so a [`Registration`] held
//! by a responder stops matching once its frame is unregistered, even if the
//! same frame ID is registered again later.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{BusError, Result};
use crate::message::{CardId, FrameId};

/// One frame-to-card association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    frame_id: FrameId,
    card_id: CardId,
    generation: u64,
}

impl Registration {
    /// Frame this registration belongs to.
    #[inline]
    pub fn frame_id(&self) -> &FrameId {
        &self.frame_id
    }

    /// Card hosted by the frame.
    #[inline]
    pub fn card_id(&self) -> &CardId {
        &self.card_id
    }

    /// Registry-assigned generation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct Inner {
    frames: HashMap<FrameId, Registration>,
    next_generation: u64,
}

/// Shared map from frame ID to registration.
///
/// Lookups take a read lock and may run concurrently; register and
/// unregister take the write lock.
#[derive(Default)]
pub struct FrameRegistry {
    inner: RwLock<Inner>,
}

impl FrameRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a frame with a card.
    ///
    /// Fails with [`BusError::AlreadyRegistered`] if the frame already has a
    /// registration.
    pub fn register(&self, frame_id: FrameId, card_id: CardId) -> Result<Registration> {
        let mut inner = self.inner.write();

        if let Some(existing) = inner.frames.get(&frame_id) {
            return Err(BusError::AlreadyRegistered {
                frame_id,
                card_id: existing.card_id.clone(),
            });
        }

        inner.next_generation += 1;
        let registration = Registration {
            frame_id: frame_id.clone(),
            card_id,
            generation: inner.next_generation,
        };
        inner.frames.insert(frame_id, registration.clone());

        tracing::debug!(
            "Registered frame {} for card {}",
            registration.frame_id,
            registration.card_id
        );
        Ok(registration)
    }

    /// Remove a frame's registration.
    pub fn unregister(&self, frame_id: &str) -> Result<()> {
        match self.inner.write().frames.remove(frame_id) {
            Some(registration) => {
                tracing::debug!(
                    "Unregistered frame {} (card {})",
                    registration.frame_id,
                    registration.card_id
                );
                Ok(())
            }
            None => Err(BusError::NotRegistered(FrameId::from(frame_id))),
        }
    }

    /// Look up the current registration of a frame.
    pub fn lookup(&self, frame_id: &str) -> Result<Registration> {
        self.inner
            .read()
            .frames
            .get(frame_id)
            .cloned()
            .ok_or_else(|| BusError::NotRegistered(FrameId::from(frame_id)))
    }

    /// True if `registration` is still the live registration of its frame.
    pub fn is_current(&self, registration: &Registration) -> bool {
        self.inner
            .read()
            .frames
            .get(&registration.frame_id)
            .is_some_and(|current| current.generation == registration.generation)
    }

    /// Run `commit` only while `registration` is the live registration of
    /// its frame.
    ///
    /// The read lock is held while `commit` runs, so an unregister cannot
    /// slip in between the check and the commit. Fails with
    /// [`BusError::FrameGone`] otherwise.
    pub fn commit_if_current<R>(
        &self,
        registration: &Registration,
        commit: impl FnOnce() -> R,
    ) -> Result<R> {
        let inner = self.inner.read();
        match inner.frames.get(&registration.frame_id) {
            Some(current) if current.generation == registration.generation => Ok(commit()),
            _ => Err(BusError::FrameGone(registration.frame_id.clone())),
        }
    }

    /// Number of registered frames.
    pub fn len(&self) -> usize {
        self.inner.read().frames.len()
    }

    /// True if no frames are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registration together with the registry that issued it.
///
/// Transports receive one with every send and hand the message over through
/// [`LiveFrame::commit`], so nothing reaches a frame ID after its
/// registration has ended.
#[derive(Clone)]
pub struct LiveFrame {
    registration: Registration,
    frames: Arc<FrameRegistry>,
}

impl LiveFrame {
    pub fn new(registration: Registration, frames: Arc<FrameRegistry>) -> Self {
        Self {
            registration,
            frames,
        }
    }

    #[inline]
    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    #[inline]
    pub fn frame_id(&self) -> &FrameId {
        &self.registration.frame_id
    }

    #[inline]
    pub fn card_id(&self) -> &CardId {
        &self.registration.card_id
    }

    /// True while the registration is live.
    pub fn is_current(&self) -> bool {
        self.frames.is_current(&self.registration)
    }

    /// Run `commit` if the registration is still live, atomically with
    /// respect to unregistration.
    pub fn commit<R>(&self, commit: impl FnOnce() -> R) -> Result<R> {
        self.frames.commit_if_current(&self.registration, commit)
    }
}

impl std::fmt::Debug for LiveFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LiveFrame").field(&self.registration).finish()
    }
}
