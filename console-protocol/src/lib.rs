//! Shared pieces of the console protocol.
//!
//! Both ends of a console connection agree on three things: how the target
//! is named (page query and broker paths), what a credential looks like, and
//! how resize requests are smuggled into the otherwise unframed byte stream.

pub mod control;
pub mod endpoint;
pub mod error;
pub mod state;
pub mod target;
pub mod types;

pub use control::{ControlCodec, ControlError, Frame, SentinelCodec, SENTINEL};
pub use endpoint::ConsoleEndpoint;
pub use error::ConsoleError;
pub use state::SessionState;
pub use target::ConsoleTarget;
pub use types::{Geometry, ServerCandidate, SessionCredential, TargetInfo};
