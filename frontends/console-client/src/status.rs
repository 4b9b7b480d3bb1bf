use std::io::Write;

/// The one-line status indicator shown while a console is not attached.
pub trait StatusLine {
    fn show(&mut self, text: &str);

    fn hide(&mut self);
}

/// Status written to stderr.
///
/// Uses `\r\n` and clears the line so it renders correctly in raw mode.
#[derive(Default)]
pub struct StderrStatus;

impl StatusLine for StderrStatus {
    fn show(&mut self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = write!(err, "\r\x1b[2K{text}\r\n");
        let _ = err.flush();
    }

    // Printed lines scroll away under the session output
    fn hide(&mut self) {}
}

/// Keeps every message, for tests and embedding.
#[derive(Debug, Default)]
pub struct RecordedStatus {
    pub history: Vec<String>,
    pub visible: bool,
}

impl RecordedStatus {
    pub fn last(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }
}

impl StatusLine for RecordedStatus {
    fn show(&mut self, text: &str) {
        self.history.push(text.to_string());
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}
