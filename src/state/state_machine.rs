use thiserror::Error;

/// High-level phases a game session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Players gather in the lobby; the host may start the game.
    Waiting,
    /// A game is active and cycles through the per-question sub-phases.
    InProgress(RoundPhase),
    /// Final scores have been announced; the session is terminal.
    GameOver,
}

/// Fine-grained phase while a question round is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// A question is open and the deadline clock is armed.
    Asking,
    /// The correct answer is on display before the next question.
    Reveal,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A player started the game from the lobby.
    Start,
    /// The open question resolved (deadline hit or everyone answered).
    Resolve,
    /// The reveal pause elapsed and the next question opens.
    Advance,
    /// The question sequence is exhausted.
    Finish,
    /// The last player left mid-game.
    Abandon,
    /// A drained reserved session returns to the lobby for new joiners.
    Reset,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// State machine guarding a session's lifecycle.
///
/// Mutated only under the owning session's lock, so transitions apply
/// directly; validation failures come back as [`InvalidTransition`] and leave
/// the phase untouched.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Waiting,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether a game is currently running in this session.
    pub fn is_in_progress(&self) -> bool {
        matches!(self.phase, SessionPhase::InProgress(_))
    }

    /// Apply `event`, moving to the next phase when the transition is valid.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute the phase `event` would lead to without mutating anything.
    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Waiting, SessionEvent::Start) => {
                SessionPhase::InProgress(RoundPhase::Asking)
            }
            (SessionPhase::InProgress(RoundPhase::Asking), SessionEvent::Resolve) => {
                SessionPhase::InProgress(RoundPhase::Reveal)
            }
            (SessionPhase::InProgress(RoundPhase::Reveal), SessionEvent::Advance) => {
                SessionPhase::InProgress(RoundPhase::Asking)
            }
            (SessionPhase::InProgress(_), SessionEvent::Finish) => SessionPhase::GameOver,
            (SessionPhase::InProgress(_), SessionEvent::Abandon) => SessionPhase::GameOver,
            (SessionPhase::GameOver, SessionEvent::Reset) => SessionPhase::Waiting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = SessionStateMachine::new();
        assert_eq!(sm.phase(), SessionPhase::Waiting);
        assert!(!sm.is_in_progress());
    }

    #[test]
    fn full_happy_path_through_two_questions() {
        let mut sm = SessionStateMachine::new();

        assert_eq!(
            apply(&mut sm, SessionEvent::Start),
            SessionPhase::InProgress(RoundPhase::Asking)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Resolve),
            SessionPhase::InProgress(RoundPhase::Reveal)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Advance),
            SessionPhase::InProgress(RoundPhase::Asking)
        );
        assert_eq!(
            apply(&mut sm, SessionEvent::Resolve),
            SessionPhase::InProgress(RoundPhase::Reveal)
        );
        assert_eq!(apply(&mut sm, SessionEvent::Finish), SessionPhase::GameOver);
    }

    #[test]
    fn start_is_rejected_once_running() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);

        let err = sm.apply(SessionEvent::Start).unwrap_err();
        assert_eq!(err.from, SessionPhase::InProgress(RoundPhase::Asking));
        assert_eq!(err.event, SessionEvent::Start);
        // The failed transition leaves the phase untouched.
        assert!(sm.is_in_progress());
    }

    #[test]
    fn resolve_is_rejected_during_reveal() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Resolve);

        let err = sm.apply(SessionEvent::Resolve).unwrap_err();
        assert_eq!(err.from, SessionPhase::InProgress(RoundPhase::Reveal));
    }

    #[test]
    fn abandon_ends_the_game_from_any_running_phase() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        assert_eq!(apply(&mut sm, SessionEvent::Abandon), SessionPhase::GameOver);

        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Resolve);
        assert_eq!(apply(&mut sm, SessionEvent::Abandon), SessionPhase::GameOver);
    }

    #[test]
    fn reset_returns_a_finished_session_to_the_lobby() {
        let mut sm = SessionStateMachine::new();
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::Finish);
        assert_eq!(apply(&mut sm, SessionEvent::Reset), SessionPhase::Waiting);
    }

    #[test]
    fn reset_is_rejected_while_waiting() {
        let mut sm = SessionStateMachine::new();
        assert!(sm.apply(SessionEvent::Reset).is_err());
    }
}
