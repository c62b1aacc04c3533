//! Run phase definitions for the crawl coordinator
//!
//! A run moves `Idle -> Running -> {Completed, Aborted}`. An idle run may
//! also abort directly when setup fails before any work starts.
use std::fmt;

/// Represents the lifecycle phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunPhase {
    /// Created, nothing dispatched yet
    #[default]
    Idle,

    /// Workers are pulling from the frontier
    Running,

    // ===== Terminal States =====
    /// Frontier exhausted (or a limit hit) and in-flight work drained
    Completed,

    /// Non-recoverable configuration or filesystem error
    Aborted,
}

impl RunPhase {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Idle, Self::Aborted)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted)
        )
    }

    /// String form used in run metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
