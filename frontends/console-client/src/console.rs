use crate::broker::BrokerClient;
use crate::exchange::{request_credential, Grant};
use crate::picker::{pick, Prompt};
use crate::resolver::resolve;
use crate::session::ConsoleSession;
use crate::status::StatusLine;
use crate::terminal::{TerminalEvent, TerminalWidget};
use console_protocol::{
    ConsoleEndpoint, ConsoleError, ConsoleTarget, SentinelCodec, SessionCredential,
    SessionState,
};
use tokio::sync::mpsc;

/// One console attempt, from page URL to closed socket.
///
/// Built once per run; every stage borrows it.
pub struct Console<S> {
    broker: BrokerClient,
    status: S,
    state: SessionState,
}

impl<S: StatusLine> Console<S> {
    pub fn new(endpoint: ConsoleEndpoint, status: S) -> Result<Self, ConsoleError> {
        Ok(Self {
            broker: BrokerClient::new(endpoint)?,
            status,
            state: SessionState::Idle,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &S {
        &self.status
    }

    fn advance(&mut self, next: SessionState) {
        if self.state.can_advance_to(next) {
            tracing::debug!("Console {} -> {next}", self.state);
            self.state = next;
        }
    }

    /// Show a terminal error and record the matching end state.
    fn fail(&mut self, err: ConsoleError) -> ConsoleError {
        let next = match err {
            ConsoleError::UserCancelled => SessionState::Cancelled,
            ConsoleError::SocketClosed => SessionState::Closed,
            _ => SessionState::Failed,
        };
        self.advance(next);
        self.status.show(&err.to_string());
        tracing::warn!("Console ended: {err}");
        err
    }

    /// Resolve, pick and authenticate; stops short of connecting.
    pub async fn establish<P: Prompt>(&mut self, prompt: &mut P) -> Result<Grant, ConsoleError> {
        match self.try_establish(prompt).await {
            Ok(grant) => Ok(grant),
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_establish<P: Prompt>(&mut self, prompt: &mut P) -> Result<Grant, ConsoleError> {
        self.broker.endpoint().ensure_secure()?;
        self.advance(SessionState::Resolving);

        let query = self.broker.endpoint().query();
        let resolved = resolve(&self.broker, query, &mut self.status).await?;

        let server_id = match resolved.target {
            ConsoleTarget::Server { .. } => None,
            ConsoleTarget::Application { .. } => {
                let chosen = pick(&resolved.candidates, prompt, &mut self.status).await?;
                tracing::info!(
                    "Using server {} ({})",
                    chosen.display_name,
                    chosen.server_id
                );
                Some(chosen.server_id.clone())
            }
        };

        self.advance(SessionState::Authenticating);
        self.status.show("Authenticating...");
        request_credential(&self.broker, &resolved.target, server_id.as_deref()).await
    }

    /// Connect with `credential` and bridge until the console ends.
    pub async fn attach<T: TerminalWidget>(
        &mut self,
        credential: SessionCredential,
        terminal: &mut T,
        events: &mut mpsc::Receiver<TerminalEvent>,
    ) -> Result<(), ConsoleError> {
        self.advance(SessionState::Connecting);
        self.status.show("Connecting to server...");

        // Geometry is read now, right before the handshake
        let url = match self
            .broker
            .endpoint()
            .socket_url(&credential, terminal.geometry())
        {
            Ok(url) => url,
            Err(e) => return Err(self.fail(e)),
        };
        drop(credential);

        let socket = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((socket, _response)) => socket,
            Err(e) => {
                return Err(self.fail(ConsoleError::Socket {
                    message: e.to_string(),
                }))
            }
        };

        let mut session = ConsoleSession::new(terminal, SentinelCodec);
        let outcome = session.run(socket, events, &mut self.status).await;
        self.advance(SessionState::Open);
        self.advance(session.state());
        outcome
    }

    /// The whole flow: establish, title the terminal, attach.
    pub async fn run<P, T>(
        &mut self,
        prompt: &mut P,
        terminal: &mut T,
        events: &mut mpsc::Receiver<TerminalEvent>,
    ) -> Result<(), ConsoleError>
    where
        P: Prompt,
        T: TerminalWidget,
    {
        let grant = self.establish(prompt).await?;
        if let Some(target) = &grant.target {
            terminal.set_title(&format!("[Console] {}", target.label()));
        }
        self.attach(grant.credential, terminal, events).await
    }
}
