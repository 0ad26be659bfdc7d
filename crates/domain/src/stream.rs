//! Stream message framing.
//!
//! A text message longer than one attribute write is sent as a 4-byte
//! big-endian fragment-count header followed by that many fragments of at
//! most [`FRAGMENT_SIZE`] bytes. There is no per-fragment acknowledgment;
//! ordering relies on the link delivering frames in order.

use crate::error::StreamError;

/// Maximum payload bytes per fragment.
pub const FRAGMENT_SIZE: usize = 20;

/// Size of the fragment-count header.
pub const HEADER_LEN: usize = 4;

/// Number of fragments needed for a payload of `len` bytes.
#[must_use]
pub fn fragment_count(len: usize) -> usize {
    len.div_ceil(FRAGMENT_SIZE)
}

/// An encoded stream message: header plus fragments, ready to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrames {
    bytes: Vec<u8>,
}

impl StreamFrames {
    /// Encode `text` as UTF-8 and split it into fragments.
    ///
    /// # Panics
    ///
    /// Panics if the message needs more than `u32::MAX` fragments.
    #[must_use]
    pub fn encode(text: &str) -> Self {
        let bytes = text.as_bytes().to_vec();
        assert!(
            u32::try_from(fragment_count(bytes.len())).is_ok(),
            "stream message too large"
        );
        Self { bytes }
    }

    /// The fragment-count header.
    #[must_use]
    pub fn header(&self) -> [u8; HEADER_LEN] {
        // Bounded by the assertion in `encode`.
        #[allow(clippy::cast_possible_truncation)]
        let count = fragment_count(self.bytes.len()) as u32;
        count.to_be_bytes()
    }

    /// The payload fragments, in send order.
    pub fn fragments(&self) -> std::slice::Chunks<'_, u8> {
        self.bytes.chunks(FRAGMENT_SIZE)
    }

    /// Number of fragments following the header.
    #[must_use]
    pub fn len(&self) -> usize {
        fragment_count(self.bytes.len())
    }

    /// Whether the message has no fragments (empty text).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reassembles a stream message from its header and fragments.
#[derive(Debug)]
pub struct StreamAssembler {
    expected: u32,
    received: u32,
    payload: Vec<u8>,
}

impl StreamAssembler {
    /// Start reassembly from the first delivery of a stream.
    ///
    /// Only the first 4 bytes are read, as a big-endian fragment count.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ShortHeader`] when fewer than 4 bytes arrived.
    pub fn from_header(header: &[u8]) -> Result<Self, StreamError> {
        let Some(head) = header.first_chunk::<HEADER_LEN>() else {
            return Err(StreamError::ShortHeader {
                actual: header.len(),
            });
        };
        let expected = u32::from_be_bytes(*head);
        Ok(Self {
            expected,
            received: 0,
            payload: Vec::new(),
        })
    }

    /// Number of fragments announced by the header.
    #[must_use]
    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// Number of fragments still outstanding.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.expected - self.received
    }

    /// Whether every announced fragment has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received == self.expected
    }

    /// Append the next fragment in arrival order.
    ///
    /// Fragments beyond the announced count are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::OversizedFragment`] for a fragment longer than
    /// [`FRAGMENT_SIZE`]; the fragment is not appended.
    pub fn push(&mut self, fragment: &[u8]) -> Result<(), StreamError> {
        if fragment.len() > FRAGMENT_SIZE {
            return Err(StreamError::OversizedFragment {
                actual: fragment.len(),
            });
        }
        if self.is_complete() {
            return Ok(());
        }
        self.payload.extend_from_slice(fragment);
        self.received += 1;
        Ok(())
    }

    /// Decode the concatenated payload.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidUtf8`] when the payload is not UTF-8.
    pub fn finish(self) -> Result<String, StreamError> {
        Ok(String::from_utf8(self.payload)?)
    }
}
