//! Terminal client for brokered consoles.
//!
//! The flow mirrors the hosted console page: read `server` or `application`
//! from the page URL, pick a server if needed, trade it for a one-time
//! credential and attach the local terminal to the console WebSocket.

pub mod broker;
pub mod console;
pub mod exchange;
pub mod picker;
pub mod resolver;
pub mod session;
pub mod status;
pub mod terminal;

pub use console::Console;
pub use picker::{LinePrompt, Prompt, StdinPrompt};
pub use status::{RecordedStatus, StatusLine, StderrStatus};
pub use terminal::{TerminalEvent, TerminalWidget};
