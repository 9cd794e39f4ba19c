//! Bus frame: extended identifier plus up to 8 payload bytes.

use heapless::Vec;
use ilock_common::consts::{MAX_FRAME_PAYLOAD, MAX_IDENTIFIER};

use crate::error::FrameError;

/// Frame payload storage.
pub type Payload = Vec<u8, MAX_FRAME_PAYLOAD>;

/// One bus frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    id: u32,
    data: Payload,
}

impl Frame {
    /// Build a frame.
    ///
    /// # Errors
    ///
    /// - `FrameError::IdentifierOutOfRange` if `id` does not fit 29 bits
    /// - `FrameError::PayloadTooLong` if `data` is longer than 8 bytes
    pub fn new(id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_IDENTIFIER {
            return Err(FrameError::IdentifierOutOfRange(id));
        }
        let data = Payload::from_slice(data).map_err(|_| FrameError::PayloadTooLong(data.len()))?;
        Ok(Self { id, data })
    }

    /// Packed identifier.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Payload bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload length.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
