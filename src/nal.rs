//! H.264 NAL unit scanning and parameter-set handling.

use crate::error::Result;
use crate::utils::{read_length, reserve_blocks, write_length};

pub mod nal_type {
    pub const IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;
}

const START_CODE: [u8; 3] = [0, 0, 1];

/// How NAL units are delimited in a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NalFraming {
    /// Annex-B: each unit follows a `00 00 01` start code.
    AnnexB,
    /// Each unit is preceded by a big-endian length of this many bytes.
    LengthPrefixed(usize),
}

/// View of one NAL unit inside a bitstream buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NalUnit<'a> {
    offset: usize,
    data: &'a [u8],
}

impl<'a> NalUnit<'a> {
    /// Offset of the first payload byte (the NAL header) in the scanned buffer.
    pub fn start(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn nal_type(&self) -> u8 {
        self.data[0] & 0x1F
    }
}

/// Walks the NAL units of a buffer in stream order. Scanning never reads past
/// the end of the buffer; truncated trailing data ends the iteration.
pub struct NalScanner<'a> {
    buf: &'a [u8],
    pos: usize,
    framing: NalFraming,
}

impl<'a> NalScanner<'a> {
    pub fn new(buf: &'a [u8], framing: NalFraming) -> Self {
        Self {
            buf,
            pos: 0,
            framing,
        }
    }

    pub fn annex_b(buf: &'a [u8]) -> Self {
        Self::new(buf, NalFraming::AnnexB)
    }

    pub fn length_prefixed(buf: &'a [u8], width: usize) -> Self {
        Self::new(buf, NalFraming::LengthPrefixed(width))
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn next_annex_b(&mut self) -> Option<NalUnit<'a>> {
        loop {
            let start = find_start_code(self.buf, self.pos)? + START_CODE.len();
            let next = find_start_code(self.buf, start);
            let mut end = next.unwrap_or(self.buf.len());
            self.pos = end;
            // zero bytes before the next start code are stream padding
            // (or the leading byte of a 4-byte start code)
            while end > start && self.buf[end - 1] == 0 {
                end -= 1;
            }
            if end > start {
                return Some(NalUnit {
                    offset: start,
                    data: &self.buf[start..end],
                });
            }
            next?;
        }
    }

    fn next_length_prefixed(&mut self, width: usize) -> Option<NalUnit<'a>> {
        loop {
            let field_end = self.pos.checked_add(width)?;
            let field = self.buf.get(self.pos..field_end)?;
            let len = read_length(field);
            let end = field_end.checked_add(len)?;
            let data = self.buf.get(field_end..end)?;
            self.pos = end;
            if !data.is_empty() {
                return Some(NalUnit {
                    offset: field_end,
                    data,
                });
            }
        }
    }
}

impl<'a> Iterator for NalScanner<'a> {
    type Item = NalUnit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        match self.framing {
            NalFraming::AnnexB => self.next_annex_b(),
            NalFraming::LengthPrefixed(width) if width > 0 => self.next_length_prefixed(width),
            NalFraming::LengthPrefixed(_) => None,
        }
    }
}

/// Position of the next `00 00 01` at or after `from`.
pub fn find_start_code(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(START_CODE.len())
        .position(|w| w == START_CODE)
        .map(|p| p + from)
}

/// Profile, constraint flags and level carried in the first bytes of an SPS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpsInfo {
    pub profile: u8,
    pub compat: u8,
    pub level: u8,
}

impl SpsInfo {
    /// `sps` starts at the NAL header byte.
    pub fn parse(sps: &[u8]) -> Option<Self> {
        if sps.len() < 4 || sps[0] & 0x1F != nal_type::SPS {
            return None;
        }
        Some(Self {
            profile: sps[1],
            compat: sps[2],
            level: sps[3],
        })
    }

    /// Codec string such as `avc1.42e01e`.
    pub fn codec_string(&self) -> String {
        format!(
            "avc1.{:02x}{:02x}{:02x}",
            self.profile, self.compat, self.level
        )
    }
}

/// Decoded picture size of an SPS, if it parses.
pub fn sps_dimensions(sps: &[u8]) -> Option<(u32, u32)> {
    use h264_reader::{
        nal::sps::SeqParameterSet,
        rbsp::{decode_nal, BitReader},
    };

    let rbsp = decode_nal(sps).ok()?;
    let sps = SeqParameterSet::from_bits(BitReader::new(&rbsp[..])).ok()?;
    sps.pixel_dimensions().ok()
}

/// First SPS and first PPS of a stream, each stored with a length prefix.
/// Append-only: once a kind has been captured, later units of that kind are ignored.
#[derive(Debug)]
pub struct ParamSetCache {
    buf: Vec<u8>,
    length_size: usize,
    has_sps: bool,
    has_pps: bool,
}

impl ParamSetCache {
    pub fn new(length_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            length_size,
            has_sps: false,
            has_pps: false,
        }
    }

    pub fn has_sps(&self) -> bool {
        self.has_sps
    }

    pub fn has_pps(&self) -> bool {
        self.has_pps
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Stores `unit` if it is the first SPS or first PPS seen; returns whether it was stored.
    pub fn capture(&mut self, unit: &NalUnit<'_>) -> Result<bool> {
        let flag = match unit.nal_type() {
            nal_type::SPS if !self.has_sps => &mut self.has_sps,
            nal_type::PPS if !self.has_pps => &mut self.has_pps,
            _ => return Ok(false),
        };
        let (prefix, width) = write_length(unit.len(), self.length_size)?;
        reserve_blocks(&mut self.buf, width + unit.len())?;
        self.buf.extend_from_slice(&prefix[..width]);
        self.buf.extend_from_slice(unit.data());
        *flag = true;
        Ok(true)
    }

    pub fn units(&self) -> NalScanner<'_> {
        NalScanner::length_prefixed(&self.buf, self.length_size)
    }

    pub fn sps(&self) -> Option<&[u8]> {
        self.find(nal_type::SPS)
    }

    pub fn pps(&self) -> Option<&[u8]> {
        self.find(nal_type::PPS)
    }

    fn find(&self, kind: u8) -> Option<&[u8]> {
        self.units()
            .find(|nal| nal.nal_type() == kind)
            .map(|nal| nal.data())
    }
}
