//! Chunk reassembly of multi-frame TLV transfers.
//!
//! A transfer arrives as one FIRST frame followed by any number of
//! CONTINUATION frames. Length-prefixed transfers declare their total
//! size in the first two payload bytes of the FIRST frame (big-endian);
//! legacy transfers omit the prefix and complete when the dispatcher
//! is satisfied with what it has parsed so far.
//!
//! Exactly one assembly is alive device-wide. Starting a new FIRST
//! frame silently discards any incomplete previous assembly; there is
//! no explicit cancel message and no pipelining.

use alloc::vec::Vec;

use common::commands::ChunkRole;
use common::error::Error;
use common::message::CommandFrame;

/// Hard cap on a reassembled payload, enforced in both modes.
pub const MAX_ASSEMBLY_SIZE: usize = 1024;

/// One in-flight multi-frame transfer.
#[derive(Debug)]
pub struct Assembly {
    /// Command class this assembly belongs to.
    class: u8,
    /// Sub-selector this assembly belongs to.
    selector: u8,
    /// Declared total size, when the framing convention carries one.
    expected: Option<usize>,
    bytes: Vec<u8>,
}

impl Assembly {
    /// Starts a new assembly.
    ///
    /// `expected` is the declared total size for length-prefixed
    /// transfers, or `None` for incremental (parse-until-satisfied)
    /// transfers. A declared size above [`MAX_ASSEMBLY_SIZE`] is
    /// rejected up front.
    pub fn begin(class: u8, selector: u8, expected: Option<usize>) -> Result<Self, Error> {
        if let Some(size) = expected {
            if size > MAX_ASSEMBLY_SIZE {
                return Err(Error::ResourceOverflow);
            }
        }
        Ok(Self {
            class,
            selector,
            expected,
            bytes: Vec::new(),
        })
    }

    /// Appends one frame's payload bytes.
    ///
    /// Fails with `ResourceOverflow` if the append would exceed the
    /// declared size (when known) or the hard maximum.
    pub fn append(&mut self, payload: &[u8]) -> Result<(), Error> {
        let new_len = self.bytes.len() + payload.len();
        if let Some(expected) = self.expected {
            if new_len > expected {
                return Err(Error::ResourceOverflow);
            }
        }
        if new_len > MAX_ASSEMBLY_SIZE {
            return Err(Error::ResourceOverflow);
        }
        self.bytes.extend_from_slice(payload);
        Ok(())
    }

    /// True once the declared size has been fully received.
    ///
    /// Incremental assemblies never self-complete; their completion is
    /// decided by the TLV dispatcher satisfying all required tags.
    pub fn is_complete(&self) -> bool {
        match self.expected {
            Some(expected) => self.bytes.len() == expected,
            None => false,
        }
    }

    /// The bytes received so far.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn matches(&self, frame: &CommandFrame) -> bool {
        self.class == frame.class && self.selector == frame.selector
    }
}

/// Outcome of feeding one frame into the reassembly slot.
#[derive(Debug, PartialEq, Eq)]
pub enum Transfer {
    /// More frames are needed.
    Pending,
    /// The transfer is complete; the full payload is returned and the
    /// slot is empty again.
    Complete(Vec<u8>),
}

/// Feeds one frame of a length-prefixed transfer into the single
/// reassembly slot.
///
/// The FIRST frame's payload starts with a 2-byte big-endian total
/// size, consumed before accumulation begins. Any error empties the
/// slot so that no stale assembly survives a failed transfer.
pub fn ingest_sized(
    slot: &mut Option<Assembly>,
    frame: &CommandFrame,
) -> Result<Transfer, Error> {
    let result = ingest_sized_inner(slot, frame);
    if result.is_err() {
        *slot = None;
    }
    result
}

fn ingest_sized_inner(
    slot: &mut Option<Assembly>,
    frame: &CommandFrame,
) -> Result<Transfer, Error> {
    match frame.chunk {
        ChunkRole::First => {
            // A new FIRST frame discards any previous incomplete
            // assembly, for any class.
            if frame.payload.len() < 2 {
                return Err(Error::Truncated);
            }
            let declared = u16::from_be_bytes([frame.payload[0], frame.payload[1]]) as usize;
            let mut assembly = Assembly::begin(frame.class, frame.selector, Some(declared))?;
            assembly.append(&frame.payload[2..])?;
            *slot = Some(assembly);
        }
        ChunkRole::Continuation => {
            let Some(assembly) = slot.as_mut() else {
                return Err(Error::InvalidChunk);
            };
            if !assembly.matches(frame) {
                return Err(Error::InvalidChunk);
            }
            assembly.append(&frame.payload)?;
        }
    }

    let complete = slot.as_ref().is_some_and(Assembly::is_complete);
    if complete {
        let assembly = slot.take().ok_or(Error::InvalidChunk)?;
        Ok(Transfer::Complete(assembly.bytes))
    } else {
        Ok(Transfer::Pending)
    }
}

/// Feeds one frame of an incremental (no length prefix) transfer.
///
/// Completion is not decided here: the caller attempts a parse after
/// every frame and takes the bytes out once the dispatcher reports the
/// payload whole. Legacy-compatibility mode only.
pub fn ingest_incremental(
    slot: &mut Option<Assembly>,
    frame: &CommandFrame,
) -> Result<(), Error> {
    let result = ingest_incremental_inner(slot, frame);
    if result.is_err() {
        *slot = None;
    }
    result
}

fn ingest_incremental_inner(
    slot: &mut Option<Assembly>,
    frame: &CommandFrame,
) -> Result<(), Error> {
    match frame.chunk {
        ChunkRole::First => {
            let mut assembly = Assembly::begin(frame.class, frame.selector, None)?;
            assembly.append(&frame.payload)?;
            *slot = Some(assembly);
            Ok(())
        }
        ChunkRole::Continuation => {
            let Some(assembly) = slot.as_mut() else {
                return Err(Error::InvalidChunk);
            };
            if !assembly.matches(frame) {
                return Err(Error::InvalidChunk);
            }
            assembly.append(&frame.payload)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_chunking_scenario() {
        // FIRST declares 10 bytes and carries 4; one CONTINUATION
        // carries 6; completion happens exactly on the 10th byte and an
        // 11th byte overflows.
        let mut assembly = Assembly::begin(0x30, 0x00, Some(10)).unwrap();
        assembly.append(&[0xAA; 4]).unwrap();
        assert!(!assembly.is_complete());
        assembly.append(&[0xBB; 6]).unwrap();
        assert!(assembly.is_complete());
        assert_eq!(assembly.append(&[0xCC]), Err(Error::ResourceOverflow));
    }

    #[test]
    fn test_declared_size_consumed_from_first_frame() {
        let mut slot = None;
        let frame = CommandFrame::first(0x30, 0x00, vec![0x00, 0x04, 0x01, 0x02]);
        assert_eq!(ingest_sized(&mut slot, &frame), Ok(Transfer::Pending));
        let frame = CommandFrame::next(0x30, 0x00, vec![0x03, 0x04]);
        assert_eq!(
            ingest_sized(&mut slot, &frame),
            Ok(Transfer::Complete(vec![0x01, 0x02, 0x03, 0x04]))
        );
        assert!(slot.is_none());
    }

    #[test]
    fn test_continuation_without_first_rejected() {
        let mut slot = None;
        let frame = CommandFrame::next(0x30, 0x00, vec![0x01]);
        assert_eq!(ingest_sized(&mut slot, &frame), Err(Error::InvalidChunk));
    }

    #[test]
    fn test_new_first_discards_previous_assembly() {
        let mut slot = None;
        let frame = CommandFrame::first(0x30, 0x00, vec![0x00, 0x0A, 0x01]);
        assert_eq!(ingest_sized(&mut slot, &frame), Ok(Transfer::Pending));
        // Different class, fresh FIRST: the previous assembly is gone.
        let frame = CommandFrame::first(0x34, 0x00, vec![0x00, 0x01, 0x07]);
        assert_eq!(
            ingest_sized(&mut slot, &frame),
            Ok(Transfer::Complete(vec![0x07]))
        );
    }

    #[test]
    fn test_cross_class_continuation_rejected() {
        let mut slot = None;
        let frame = CommandFrame::first(0x30, 0x00, vec![0x00, 0x0A, 0x01]);
        assert_eq!(ingest_sized(&mut slot, &frame), Ok(Transfer::Pending));
        let frame = CommandFrame::next(0x34, 0x00, vec![0x02]);
        assert_eq!(ingest_sized(&mut slot, &frame), Err(Error::InvalidChunk));
    }

    #[test]
    fn test_truncated_size_prefix() {
        let mut slot = None;
        let frame = CommandFrame::first(0x30, 0x00, vec![0x00]);
        assert_eq!(ingest_sized(&mut slot, &frame), Err(Error::Truncated));
    }

    #[test]
    fn test_hard_cap_enforced_without_declared_size() {
        let mut assembly = Assembly::begin(0x0A, 0x00, None).unwrap();
        assembly.append(&[0u8; MAX_ASSEMBLY_SIZE]).unwrap();
        assert_eq!(assembly.append(&[0u8]), Err(Error::ResourceOverflow));
    }

    #[test]
    fn test_declared_size_above_cap_rejected() {
        assert!(matches!(
            Assembly::begin(0x30, 0x00, Some(MAX_ASSEMBLY_SIZE + 1)),
            Err(Error::ResourceOverflow)
        ));
    }
}
