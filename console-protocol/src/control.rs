//! In-band control channel.
//!
//! Terminal traffic is sent as bare binary frames. A frame whose first byte
//! is [`SENTINEL`] (EOT) instead carries a JSON geometry update. Nothing else
//! is reserved, so a raw input frame that starts with EOT is ambiguous and
//! gets read as a (usually malformed) control frame.

use crate::types::Geometry;

/// ASCII End of Transmission.
pub const SENTINEL: u8 = 0x04;

#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Resize(Geometry),
    Data(&'a [u8]),
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("malformed control frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Framing used to interleave control messages with terminal bytes.
pub trait ControlCodec {
    fn encode_resize(&self, geometry: Geometry) -> Vec<u8>;

    fn decode<'a>(&self, frame: &'a [u8]) -> Result<Frame<'a>, ControlError>;
}

/// The sentinel-byte framing spoken by the console broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentinelCodec;

impl ControlCodec for SentinelCodec {
    fn encode_resize(&self, geometry: Geometry) -> Vec<u8> {
        encode_resize(geometry)
    }

    fn decode<'a>(&self, frame: &'a [u8]) -> Result<Frame<'a>, ControlError> {
        decode_frame(frame)
    }
}

pub fn encode_resize(geometry: Geometry) -> Vec<u8> {
    let Geometry { cols, rows } = geometry;
    let mut frame = vec![SENTINEL];
    frame.extend_from_slice(format!(r#"{{"cols":{cols},"rows":{rows}}}"#).as_bytes());
    frame
}

pub fn decode_frame(frame: &[u8]) -> Result<Frame<'_>, ControlError> {
    match frame.split_first() {
        Some((&SENTINEL, payload)) => {
            let geometry: Geometry = serde_json::from_slice(payload)?;
            Ok(Frame::Resize(geometry))
        }
        _ => Ok(Frame::Data(frame)),
    }
}
