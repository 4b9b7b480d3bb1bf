/// Every way a console run can end other than a local detach.
///
/// `Display` is the exact status text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsoleError {
    #[error("Console Info not found")]
    MissingTarget,

    #[error("Error: No servers available")]
    NoServersAvailable,

    #[error("Aborted ! Restart the console to try again")]
    UserCancelled,

    #[error("Error: {reason}")]
    Http { code: u16, reason: String },

    #[error("Error: {0}")]
    Request(String),

    #[error("Error: unexpected response ({0})")]
    MalformedResponse(String),

    #[error("Error: Incomplete console credential")]
    IncompleteCredential,

    #[error("Error: {message}")]
    Socket { message: String },

    #[error("Connection lost. Refresh to reconnect.")]
    SocketClosed,

    #[error("Please use a secure connection (https)")]
    InsecureConnection,

    #[error("Error: invalid console URL ({0})")]
    InvalidUrl(String),
}

impl ConsoleError {
    /// The user backed out; not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ConsoleError::UserCancelled)
    }
}
