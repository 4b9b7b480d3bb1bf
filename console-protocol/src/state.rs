#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Authenticating,
    Connecting,
    Open,
    Closed,
    Failed,
    /// The user declined to pick a server.
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Closed | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// Whether `self -> next` is a legal step.
    ///
    /// Terminal states accept nothing, which also covers a close event
    /// arriving after an error.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (Idle, Resolving)
            | (Resolving, Authenticating)
            | (Authenticating, Connecting)
            | (Connecting, Open)
            | (Connecting | Open, Closed) => true,
            (Resolving, Cancelled) => true,
            (_, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Authenticating => "authenticating",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
