// Player state machine and shared playback status

use crate::error::{PlayerError, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// No media open
    Idle,
    /// Media opened and decoder prepared, clock not running
    Ready,
    /// Clock running, ticks present units
    Playing,
    /// Clock paused at a position snapshot
    Paused,
    /// Playback stopped, position reset to zero
    Stopped,
    /// Open/prepare failed; only a fresh open is accepted
    Error,
}

impl PlayerState {
    /// Whether media is open and can be played, paused or seeked
    pub fn has_media(self) -> bool {
        matches!(
            self,
            PlayerState::Ready | PlayerState::Playing | PlayerState::Paused | PlayerState::Stopped
        )
    }

    /// Transition table of the state machine.
    ///
    /// Closing is legal from every state; everything else follows
    /// Idle -> Ready -> Playing <-> Paused -> Stopped with Error on failed opens.
    pub fn can_transition_to(self, to: PlayerState) -> bool {
        use PlayerState::*;

        if to == Idle {
            return true;
        }

        matches!(
            (self, to),
            (Idle, Ready)
                | (Idle, Error)
                | (Ready, Playing)
                | (Stopped, Playing)
                | (Playing, Paused)
                | (Paused, Playing)
                | (Playing, Stopped)
                | (Paused, Stopped)
        )
    }
}

/// Playback status snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    /// Last known playback position in seconds
    pub position_secs: f64,
    /// Media duration in seconds (0.0 when unknown)
    pub duration_secs: f64,
    /// Configured playback speed
    pub speed: f64,
    /// Audio volume (0.0 - 1.0)
    pub volume: f32,
    /// Whether audio is muted
    pub muted: bool,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            position_secs: 0.0,
            duration_secs: 0.0,
            speed: 1.0,
            volume: 1.0,
            muted: false,
        }
    }
}

/// Thread-safe player state container
#[derive(Clone)]
pub struct PlayerStateContainer {
    state: Arc<RwLock<PlayerState>>,
    status: Arc<RwLock<PlaybackStatus>>,
}

impl PlayerStateContainer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(PlayerState::Idle)),
            status: Arc::new(RwLock::new(PlaybackStatus::default())),
        }
    }

    pub fn get_state(&self) -> PlayerState {
        *self.state.read()
    }

    /// Move to `to` if the transition table allows it, returning the previous state
    pub fn transition(&self, to: PlayerState) -> Result<PlayerState> {
        let mut state = self.state.write();
        let from = *state;
        if from == to {
            return Ok(from);
        }
        if !from.can_transition_to(to) {
            return Err(PlayerError::InvalidState(format!(
                "Invalid state transition from {:?} to {:?}",
                from, to
            )));
        }
        *state = to;
        drop(state);
        log::debug!("Player state changed: {:?} -> {:?}", from, to);
        Ok(from)
    }

    pub fn get_status(&self) -> PlaybackStatus {
        self.status.read().clone()
    }

    pub fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut PlaybackStatus),
    {
        let mut status = self.status.write();
        f(&mut status);
    }
}

impl Default for PlayerStateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let states = PlayerStateContainer::new();
        assert_eq!(states.get_state(), PlayerState::Idle);

        states.transition(PlayerState::Ready).unwrap();
        states.transition(PlayerState::Playing).unwrap();
        states.transition(PlayerState::Paused).unwrap();
        states.transition(PlayerState::Playing).unwrap();
        let previous = states.transition(PlayerState::Stopped).unwrap();

        assert_eq!(previous, PlayerState::Playing);
        assert_eq!(states.get_state(), PlayerState::Stopped);
    }

    #[test]
    fn test_invalid_transition_keeps_state() {
        let states = PlayerStateContainer::new();
        let err = states.transition(PlayerState::Playing).unwrap_err();

        assert!(matches!(err, PlayerError::InvalidState(_)));
        assert_eq!(states.get_state(), PlayerState::Idle);
    }

    #[test]
    fn test_close_is_legal_from_everywhere() {
        use PlayerState::*;
        for state in [Idle, Ready, Playing, Paused, Stopped, Error] {
            assert!(state.can_transition_to(Idle), "{:?} -> Idle", state);
        }
    }

    #[test]
    fn test_error_only_leaves_through_idle() {
        use PlayerState::*;
        for to in [Ready, Playing, Paused, Stopped] {
            assert!(!Error.can_transition_to(to));
        }
        assert!(!Error.has_media());
    }
}
