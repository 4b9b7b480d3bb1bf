use console_protocol::{ControlCodec, Frame, Geometry};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("failed to start console: {0}")]
    Spawn(String),
    #[error("failed to resize console: {0}")]
    Resize(String),
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where decoded client frames go.
pub trait ConsoleSink {
    fn write_input(&mut self, data: &[u8]) -> std::io::Result<()>;

    fn resize(&mut self, geometry: Geometry) -> Result<(), PtyError>;
}

/// Route one inbound frame: resize requests to `resize`, everything else to the shell.
///
/// A broken control frame is logged and dropped; only write errors are returned.
pub fn dispatch_frame<C, K>(codec: &C, frame: &[u8], sink: &mut K) -> std::io::Result<()>
where
    C: ControlCodec,
    K: ConsoleSink,
{
    match codec.decode(frame) {
        Ok(Frame::Resize(geometry)) => {
            if let Err(e) = sink.resize(geometry) {
                tracing::warn!("{e}");
            }
            Ok(())
        }
        Ok(Frame::Data(data)) => sink.write_input(data),
        Err(e) => {
            tracing::warn!("Dropping frame: {e}");
            Ok(())
        }
    }
}

/// A shell behind a pseudo terminal.
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if let Some(handle) = self.reader_handle.take() {
            handle.abort();
        }
        if let Err(e) = self.child.kill() {
            tracing::debug!("Console process already gone: {e}");
        }
        let _ = self.child.try_wait();
    }
}

impl PtySession {
    /// Start `argv` on a new PTY sized to `geometry`.
    ///
    /// Output is delivered on the returned channel, which closes when the
    /// process exits.
    pub fn spawn(
        argv: &[String],
        geometry: Geometry,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Vec<u8>>), PtyError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| PtyError::Spawn("empty command".to_string()))?;

        let pair = native_pty_system()
            .openpty(pty_size(geometry))
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        // Only the child keeps the slave side open, so EOF follows its exit
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let (tx, output_rx) = mpsc::unbounded_channel();
        let reader_handle = tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        // EIO means PTY closed (child exited)
                        if e.raw_os_error() != Some(libc::EIO) {
                            tracing::error!("PTY read error: {e}");
                        }
                        break;
                    }
                }
            }
        });

        tracing::info!(
            "Started {program} on a {geometry} PTY (pid {:?})",
            child.process_id()
        );

        Ok((
            Self {
                master: pair.master,
                writer,
                child,
                reader_handle: Some(reader_handle),
            },
            output_rx,
        ))
    }
}

impl ConsoleSink for PtySession {
    fn write_input(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()
    }

    fn resize(&mut self, geometry: Geometry) -> Result<(), PtyError> {
        tracing::debug!("Resizing console to {geometry}");
        self.master
            .resize(pty_size(geometry))
            .map_err(|e| PtyError::Resize(e.to_string()))
    }
}

fn pty_size(geometry: Geometry) -> PtySize {
    PtySize {
        rows: geometry.rows,
        cols: geometry.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}
