//! The attached part of a console: one WebSocket bridged to one terminal.

use crate::status::StatusLine;
use crate::terminal::{TerminalEvent, TerminalWidget};
use console_protocol::{ControlCodec, ConsoleError, SessionState};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

/// Drives an open socket until it closes, fails, or local input ends.
pub struct ConsoleSession<'t, T, C> {
    terminal: &'t mut T,
    codec: C,
    state: SessionState,
}

impl<'t, T, C> ConsoleSession<'t, T, C>
where
    T: TerminalWidget,
    C: ControlCodec,
{
    pub fn new(terminal: &'t mut T, codec: C) -> Self {
        Self {
            terminal,
            codec,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) {
        if self.state.can_advance_to(next) {
            tracing::debug!("Session {} -> {next}", self.state);
            self.state = next;
        } else {
            tracing::debug!("Session stays {} (ignored {next})", self.state);
        }
    }

    /// Run over an already connected socket.
    ///
    /// Returns `Ok(())` only when the local input stream ended and the
    /// socket was closed from this side.
    pub async fn run<W, S>(
        &mut self,
        socket: W,
        events: &mut mpsc::Receiver<TerminalEvent>,
        status: &mut S,
    ) -> Result<(), ConsoleError>
    where
        W: Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Unpin,
        S: StatusLine,
    {
        self.advance(SessionState::Open);
        status.hide();
        tracing::info!("Console attached");

        let (mut ws_sender, mut ws_receiver) = socket.split();

        let outcome = loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            if let Err(e) = self.terminal.write(&data) {
                                tracing::error!("Terminal write error: {e}");
                            }
                        }
                        Some(Ok(Message::Text(_))) => {
                            tracing::warn!("invalid data received: text frame dropped");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!("Console closed by peer: {frame:?}");
                            break Err(ConsoleError::SocketClosed);
                        }
                        // Ping/Pong are answered by tungstenite
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break Err(ConsoleError::Socket { message: e.to_string() });
                        }
                        None => break Err(ConsoleError::SocketClosed),
                    }
                }

                event = events.recv() => {
                    let frame = match event {
                        Some(TerminalEvent::Input(bytes)) => bytes,
                        Some(TerminalEvent::Resized) => {
                            let geometry = self.terminal.geometry();
                            tracing::debug!("Sending resize {geometry}");
                            self.codec.encode_resize(geometry)
                        }
                        None => {
                            tracing::info!("Terminal input ended, closing console");
                            let _ = ws_sender.send(Message::Close(None)).await;
                            break Ok(());
                        }
                    };
                    if let Err(e) = ws_sender.send(Message::Binary(frame.into())).await {
                        break Err(ConsoleError::Socket { message: e.to_string() });
                    }
                }
            }
        };

        match &outcome {
            Ok(()) | Err(ConsoleError::SocketClosed) => self.advance(SessionState::Closed),
            Err(_) => self.advance(SessionState::Failed),
        }
        if let Err(e) = &outcome {
            status.show(&e.to_string());
        }
        outcome
    }
}
