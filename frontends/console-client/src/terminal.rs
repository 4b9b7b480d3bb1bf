use console_protocol::Geometry;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, SetTitle};
use std::io::{self, Write};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// Events produced by the local terminal while a console is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Keystrokes or pasted text, already encoded.
    Input(Vec<u8>),
    /// The grid changed size. Read the new size from the widget.
    Resized,
}

/// The surface a console session renders into.
pub trait TerminalWidget {
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Current size, read at call time.
    fn geometry(&self) -> Geometry;

    fn set_title(&mut self, _title: &str) {}
}

/// The process's own TTY.
pub struct StdioTerminal {
    stdout: io::Stdout,
}

impl Default for StdioTerminal {
    fn default() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl TerminalWidget for StdioTerminal {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut out = self.stdout.lock();
        out.write_all(data)?;
        out.flush()
    }

    fn geometry(&self) -> Geometry {
        match crossterm::terminal::size() {
            Ok((cols, rows)) => Geometry { cols, rows },
            Err(e) => {
                tracing::debug!("Terminal size unavailable ({e}), using default");
                Geometry::default()
            }
        }
    }

    fn set_title(&mut self, title: &str) {
        if let Err(e) = crossterm::execute!(self.stdout, SetTitle(title)) {
            tracing::debug!("Could not set title: {e}");
        }
    }
}

/// Raw mode for the lifetime of the guard.
pub struct RawModeGuard(bool);

impl RawModeGuard {
    pub fn new() -> Self {
        match enable_raw_mode() {
            Ok(()) => Self(true),
            Err(e) => {
                tracing::warn!("Failed to enable raw mode: {e}");
                Self(false)
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.0 {
            let _ = disable_raw_mode();
        }
    }
}

/// Feed bytes from `input` and window-size changes into one channel.
///
/// The channel closes when `input` reaches EOF.
pub fn spawn_stdio_events<R>(mut input: R) -> mpsc::Receiver<TerminalEvent>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);

    let input_tx = tx.clone();
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match input.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if input_tx
                        .send(TerminalEvent::Input(buf[..n].to_vec()))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("stdin read error: {e}");
                    break;
                }
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let weak = tx.downgrade();
        match signal(SignalKind::window_change()) {
            Ok(mut winch) => {
                tokio::spawn(async move {
                    while winch.recv().await.is_some() {
                        // Don't keep the channel alive once input is gone
                        let Some(tx) = weak.upgrade() else { break };
                        if tx.send(TerminalEvent::Resized).await.is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => tracing::warn!("Resize notifications unavailable: {e}"),
        }
    }
    drop(tx);

    rx
}
