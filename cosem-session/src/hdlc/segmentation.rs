//! Splitting PDUs into information fields and joining them back

use bytes::{Bytes, BytesMut};

/// Split `pdu` into information fields of at most `max_info` bytes.
///
/// `llc` is prepended to the first segment and counts against its size.
/// Every segment except the last must be sent with the segmentation bit.
pub fn split(pdu: &[u8], llc: Option<&[u8]>, max_info: usize) -> Vec<Vec<u8>> {
    let max_info = max_info.max(1);
    let mut data = Vec::with_capacity(pdu.len() + 3);
    if let Some(llc) = llc {
        data.extend_from_slice(llc);
    }
    data.extend_from_slice(pdu);
    if data.is_empty() {
        return vec![Vec::new()];
    }
    data.chunks(max_info).map(<[u8]>::to_vec).collect()
}

/// Collects information fields until a frame without the segmentation bit
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: BytesMut,
    segments: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one information field.
    ///
    /// # Returns
    ///
    /// The joined PDU once the final segment arrived.
    pub fn push(&mut self, information: &[u8], segmented: bool) -> Option<Bytes> {
        self.buffer.extend_from_slice(information);
        self.segments += 1;
        if segmented {
            return None;
        }
        self.segments = 0;
        Some(self.buffer.split().freeze())
    }

    /// Segments received for the PDU being assembled.
    pub fn pending_segments(&self) -> usize {
        self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.segments = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_counts_llc() {
        let pdu = vec![0x11; 300];
        let segments = split(&pdu, Some(&[0xE6, 0xE6, 0x00]), 128);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 128);
        assert_eq!(&segments[0][..3], &[0xE6, 0xE6, 0x00]);
        assert_eq!(segments[2].len(), 303 - 256);
    }

    #[test]
    fn test_small_pdu_single_segment() {
        let segments = split(&[1, 2, 3], None, 128);
        assert_eq!(segments, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn test_reassembly() {
        let pdu: Vec<u8> = (0..=255).collect();
        let segments = split(&pdu, None, 100);
        let mut reassembler = Reassembler::new();
        let last = segments.len() - 1;
        let mut result = None;
        for (i, segment) in segments.iter().enumerate() {
            result = reassembler.push(segment, i != last);
            if i != last {
                assert!(result.is_none());
                assert_eq!(reassembler.pending_segments(), i + 1);
            }
        }
        assert_eq!(result.unwrap().as_ref(), pdu.as_slice());
        assert!(reassembler.is_empty());
    }
}
