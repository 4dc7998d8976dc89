//! Composite membership tracking
//!
//! Which participants currently contribute which producers. The map is
//! ordered by participant id so every rebuild sees the same input order,
//! which keeps the filter graph and argv deterministic for a given set.

use std::collections::BTreeMap;

use crate::router::{MediaKind, ProducerId};

/// One connected client's contribution
///
/// At most one video and one audio producer per participant; the entry is
/// dropped once both slots are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerSession {
    /// Video producer, if publishing
    pub video: Option<ProducerId>,
    /// Audio producer, if publishing
    pub audio: Option<ProducerId>,
}

impl ProducerSession {
    /// Whether both slots are empty
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}

/// All currently-contributing participants, keyed by participant id
#[derive(Debug, Clone, Default)]
pub struct CompositeMembership {
    participants: BTreeMap<String, ProducerSession>,
}

impl CompositeMembership {
    /// Create an empty membership
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a producer for a participant
    ///
    /// Replaces any previous producer in the same slot. Returns `true` when
    /// membership actually changed.
    pub fn set_producer(
        &mut self,
        participant: &str,
        kind: MediaKind,
        producer: ProducerId,
    ) -> bool {
        let entry = self.participants.entry(participant.to_string()).or_default();
        let slot = match kind {
            MediaKind::Video => &mut entry.video,
            MediaKind::Audio => &mut entry.audio,
        };
        if slot.as_ref() == Some(&producer) {
            return false;
        }
        *slot = Some(producer);
        true
    }

    /// Clear whichever slot holds `producer`
    ///
    /// Drops the participant entirely once both slots are empty. Returns
    /// `true` when membership changed.
    pub fn clear_producer(&mut self, producer: &ProducerId) -> bool {
        let mut owner: Option<String> = None;
        for (participant, session) in self.participants.iter_mut() {
            if session.video.as_ref() == Some(producer) {
                session.video = None;
                owner = Some(participant.clone());
                break;
            }
            if session.audio.as_ref() == Some(producer) {
                session.audio = None;
                owner = Some(participant.clone());
                break;
            }
        }
        match owner {
            Some(participant) => {
                if self
                    .participants
                    .get(&participant)
                    .is_some_and(ProducerSession::is_empty)
                {
                    self.participants.remove(&participant);
                }
                true
            }
            None => false,
        }
    }

    /// Remove a participant and everything they contributed
    pub fn remove_participant(&mut self, participant: &str) -> bool {
        self.participants.remove(participant).is_some()
    }

    /// Participants in deterministic (key) order
    pub fn participants(&self) -> impl Iterator<Item = (&String, &ProducerSession)> {
        self.participants.iter()
    }

    /// Number of contributing participants
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Whether no one is contributing
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
