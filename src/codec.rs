use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::mask::apply_mask;

/// Largest possible frame header: 2 fixed bytes, 8 bytes of extended
/// length and 4 mask bytes.
pub const MAX_HEADER_SIZE: usize = 14;

/// The fixed-size leading part of every frame header.
pub const MIN_HEADER_SIZE: usize = 2;

/// Wire-level view of one frame header, decoded from the first bytes of a
/// buffer. The decode is split in two: parsing the header first tells a
/// stream reader exactly how many bytes the rest of the frame occupies, so
/// the body read can be issued with the right size and frame boundaries
/// are never straddled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub final_fragment: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    pub masked: bool,
    pub masking_key: [u8; 4],
    pub payload_len: u64,
    /// Bytes the header itself occupies on the wire.
    pub header_len: usize,
}

/// Number of extended-length bytes implied by the 7-bit length field.
pub fn extended_len_bytes(len7: u8) -> usize {
    match len7 {
        126 => 2,
        127 => 8,
        _ => 0,
    }
}

impl FrameHeader {
    /// Parses a header from the start of `buf`.
    ///
    /// Fails with [`Error::TruncatedFrame`] when `buf` is shorter than the
    /// header its own length fields call for; callers reading from a
    /// stream retry once more bytes are in.
    pub fn parse(buf: &[u8]) -> Result<FrameHeader, Error> {
        if buf.len() < MIN_HEADER_SIZE {
            return Err(Error::TruncatedFrame);
        }

        // Byte 0 packs fin/rsv1/rsv2/rsv3 into the high nibble and the
        // opcode into the low one; byte 1 packs the mask bit and the
        // 7-bit length.
        let final_fragment = (buf[0] & 0b1000_0000) != 0;
        let rsv1 = (buf[0] & 0b0100_0000) != 0;
        let rsv2 = (buf[0] & 0b0010_0000) != 0;
        let rsv3 = (buf[0] & 0b0001_0000) != 0;
        let opcode = OpCode::from(buf[0] & 0b0000_1111);

        let masked = (buf[1] & 0b1000_0000) != 0;
        let len7 = buf[1] & 0b0111_1111;

        let ext_bytes = extended_len_bytes(len7);
        let header_len = MIN_HEADER_SIZE + ext_bytes + if masked { 4 } else { 0 };
        if buf.len() < header_len {
            return Err(Error::TruncatedFrame);
        }

        // Extended lengths are in network order
        let payload_len = match ext_bytes {
            2 => u16::from_be_bytes([buf[2], buf[3]]) as u64,
            8 => u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]),
            _ => len7 as u64,
        };

        let mut masking_key = [0u8; 4];
        if masked {
            let key_start = MIN_HEADER_SIZE + ext_bytes;
            masking_key.copy_from_slice(&buf[key_start..key_start + 4]);
        }

        Ok(FrameHeader {
            final_fragment,
            rsv1,
            rsv2,
            rsv3,
            opcode,
            masked,
            masking_key,
            payload_len,
            header_len,
        })
    }

    /// Total on-wire size of the frame this header opens. Saturating, so
    /// a hostile 64-bit length can't overflow the arithmetic.
    pub fn frame_len(&self) -> u64 {
        (self.header_len as u64).saturating_add(self.payload_len)
    }

    /// Header-level RFC 6455 validation, shared by the buffer decoder and
    /// the stream reader.
    pub fn validate(&self, strict_opcodes: bool) -> Result<(), Error> {
        // Nonzero reserved bits need a negotiated extension, and this
        // implementation negotiates none
        if self.rsv1 || self.rsv2 || self.rsv3 {
            return Err(Error::RSVNotZero);
        }
        if strict_opcodes {
            if let OpCode::Reserved(value) = self.opcode {
                return Err(Error::ReservedOpcode(value));
            }
        }
        if self.opcode.is_control() {
            if !self.final_fragment {
                return Err(Error::ControlFramesFragmented);
            }
            // Control frames are only allowed a payload up to 125 octets
            if self.payload_len > 125 {
                return Err(Error::ControlFramePayloadSize);
            }
        }
        Ok(())
    }
}

/// Decodes one complete frame from `buf`, unmasking the payload when the
/// mask bit is set. `strict_opcodes` controls whether reserved opcodes
/// fail the decode or pass through as [`OpCode::Reserved`].
pub fn decode(buf: &[u8], strict_opcodes: bool) -> Result<Frame, Error> {
    let header = FrameHeader::parse(buf)?;
    header.validate(strict_opcodes)?;

    if (buf.len() as u64) < header.frame_len() {
        return Err(Error::TruncatedFrame);
    }

    let total = header.frame_len() as usize;
    let mut payload = buf[header.header_len..total].to_vec();
    if header.masked {
        apply_mask(header.masking_key, &mut payload);
    }

    Ok(Frame {
        final_fragment: header.final_fragment,
        opcode: header.opcode,
        payload,
    })
}

/// On-wire size of a frame with the given payload length.
pub fn encoded_len(payload_len: usize, masked: bool) -> usize {
    let ext = if payload_len <= 125 {
        0
    } else if payload_len <= u16::MAX as usize {
        2
    } else {
        8
    };
    MIN_HEADER_SIZE + ext + if masked { 4 } else { 0 } + payload_len
}

/// Encodes `frame` into a fresh buffer, choosing the smallest of the three
/// length encodings. With `mask` set the mask bit goes up, the key is
/// written after the length and the payload is XOR'd against it; servers
/// pass `None` and the payload is copied verbatim.
pub fn encode(frame: &Frame, mask: Option<[u8; 4]>) -> Vec<u8> {
    let payload_len = frame.payload.len();
    let mask_bit = if mask.is_some() { 0b1000_0000 } else { 0 };

    let mut out = Vec::with_capacity(encoded_len(payload_len, mask.is_some()));
    out.push((frame.final_fragment as u8) << 7 | frame.opcode.as_u8());

    if payload_len <= 125 {
        out.push(mask_bit | payload_len as u8);
    } else if payload_len <= u16::MAX as usize {
        out.push(mask_bit | 126);
        out.extend_from_slice(&(payload_len as u16).to_be_bytes());
    } else {
        out.push(mask_bit | 127);
        out.extend_from_slice(&(payload_len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            out.extend_from_slice(&key);
            let payload_start = out.len();
            out.extend_from_slice(&frame.payload);
            apply_mask(key, &mut out[payload_start..]);
        }
        None => out.extend_from_slice(&frame.payload),
    }

    out
}
