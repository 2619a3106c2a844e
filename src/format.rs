//! Media format descriptors offered by the host pipeline.
//!
//! The format blocks follow the little-endian layouts used by DirectShow-style
//! pipelines (`VIDEOINFOHEADER`, `VIDEOINFOHEADER2`, `MPEG2VIDEOINFO`,
//! `WAVEFORMATEX`). They are decoded field by field into owned structs; nothing
//! here aliases raw memory.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{MuxError, Result};

pub const WAVE_FORMAT_PCM: u16 = 0x0001;
pub const WAVE_FORMAT_ALAW: u16 = 0x0006;
pub const WAVE_FORMAT_MULAW: u16 = 0x0007;
pub const WAVE_FORMAT_AAC: u16 = 0x00FF;
pub const WAVE_FORMAT_AAC_ENCODER: u16 = 0x1234;

/// Four-character code stored in reading order, e.g. `b"avc1"`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Value as stored in a little-endian `DWORD` (first character in the low byte).
    pub fn to_le_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    pub fn from_le_u32(v: u32) -> Self {
        Self(v.to_le_bytes())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MajorType {
    Video,
    Audio,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Subtype {
    /// A subtype derived from a four-character pixel/codec code.
    FourCc(FourCc),
    /// The Broadcom/Cyberlink H.264 byte-stream subtype, which has no four-character form.
    H264ByteStream,
    Guid([u8; 16]),
}

impl Subtype {
    pub fn fourcc(&self) -> Option<FourCc> {
        match self {
            Subtype::FourCc(fcc) => Some(*fcc),
            _ => None,
        }
    }
}

/// `BITMAPINFOHEADER` fields used by the handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitmapInfo {
    pub width: i32,
    /// Negative for top-down images.
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
}

impl BitmapInfo {
    pub const SIZE: usize = 40;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        need(raw, Self::SIZE, "BITMAPINFOHEADER")?;
        Ok(Self {
            width: LittleEndian::read_i32(&raw[4..8]),
            height: LittleEndian::read_i32(&raw[8..12]),
            planes: LittleEndian::read_u16(&raw[12..14]),
            bit_count: LittleEndian::read_u16(&raw[14..16]),
            compression: LittleEndian::read_u32(&raw[16..20]),
            size_image: LittleEndian::read_u32(&raw[20..24]),
        })
    }

    pub fn abs_height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    /// Uncompressed frame size: DWORD-aligned stride times the absolute height.
    pub fn image_size(&self) -> u64 {
        let bits = self.width.unsigned_abs() as u64 * self.bit_count as u64;
        let stride = ((bits + 31) & !31) / 8;
        stride * self.abs_height() as u64
    }
}

/// Basic (`VIDEOINFOHEADER`) or extended (`VIDEOINFOHEADER2`) geometry block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoInfo {
    /// Average frame duration in 100-ns units.
    pub avg_time_per_frame: i64,
    pub bmi: BitmapInfo,
    /// Out-of-band configuration bytes trailing the fixed header.
    pub extra: Vec<u8>,
}

impl VideoInfo {
    pub const SIZE: usize = 88;
    pub const SIZE_V2: usize = 112;

    pub fn new(width: i32, height: i32, bit_count: u16) -> Self {
        Self {
            avg_time_per_frame: 0,
            bmi: BitmapInfo {
                width,
                height,
                planes: 1,
                bit_count,
                compression: 0,
                size_image: 0,
            },
            extra: Vec::new(),
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self> {
        need(raw, Self::SIZE, "VIDEOINFOHEADER")?;
        Ok(Self {
            avg_time_per_frame: LittleEndian::read_i64(&raw[40..48]),
            bmi: BitmapInfo::parse(&raw[48..Self::SIZE])?,
            extra: raw[Self::SIZE..].to_vec(),
        })
    }

    pub fn parse_v2(raw: &[u8]) -> Result<Self> {
        need(raw, Self::SIZE_V2, "VIDEOINFOHEADER2")?;
        Ok(Self {
            avg_time_per_frame: LittleEndian::read_i64(&raw[40..48]),
            bmi: BitmapInfo::parse(&raw[72..Self::SIZE_V2])?,
            extra: raw[Self::SIZE_V2..].to_vec(),
        })
    }
}

/// `MPEG2VIDEOINFO` as used for length-prepended H.264.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Mpeg2VideoInfo {
    pub header: VideoInfo,
    pub profile: u32,
    pub level: u32,
    /// For H.264 this holds the width of the NAL length field.
    pub flags: u32,
    /// Parameter sets, each preceded by a 2-byte big-endian length.
    pub sequence_header: Vec<u8>,
}

impl Mpeg2VideoInfo {
    const SEQUENCE_HEADER_OFFSET: usize = 132;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        need(raw, Self::SEQUENCE_HEADER_OFFSET, "MPEG2VIDEOINFO")?;
        let mut header = VideoInfo::parse_v2(&raw[..VideoInfo::SIZE_V2])?;
        header.extra.clear();
        let cb_sequence_header = LittleEndian::read_u32(&raw[116..120]) as usize;
        let start = Self::SEQUENCE_HEADER_OFFSET;
        let end = start
            .checked_add(cb_sequence_header)
            .filter(|end| *end <= raw.len())
            .ok_or_else(|| {
                MuxError::invalid_format(format!(
                    "MPEG2VIDEOINFO sequence header of {} bytes overruns block of {} bytes",
                    cb_sequence_header,
                    raw.len()
                ))
            })?;
        Ok(Self {
            header,
            profile: LittleEndian::read_u32(&raw[120..124]),
            level: LittleEndian::read_u32(&raw[124..128]),
            flags: LittleEndian::read_u32(&raw[128..132]),
            sequence_header: raw[start..end].to_vec(),
        })
    }
}

/// `WAVEFORMATEX` header plus its extension bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaveFormat {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub extra: Vec<u8>,
}

impl WaveFormat {
    pub const SIZE: usize = 18;

    pub fn pcm(channels: u16, samples_per_sec: u32, bits_per_sample: u16) -> Self {
        let block_align = channels * bits_per_sample.div_ceil(8);
        Self {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            samples_per_sec,
            avg_bytes_per_sec: samples_per_sec * block_align as u32,
            block_align,
            bits_per_sample,
            extra: Vec::new(),
        }
    }

    /// Decodes the header; extension bytes are taken from whatever trails the
    /// fixed part, bounded by the declared `cbSize`.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        need(raw, Self::SIZE, "WAVEFORMATEX")?;
        let cb_size = LittleEndian::read_u16(&raw[16..18]) as usize;
        let trailing = &raw[Self::SIZE..];
        Ok(Self {
            format_tag: LittleEndian::read_u16(&raw[0..2]),
            channels: LittleEndian::read_u16(&raw[2..4]),
            samples_per_sec: LittleEndian::read_u32(&raw[4..8]),
            avg_bytes_per_sec: LittleEndian::read_u32(&raw[8..12]),
            block_align: LittleEndian::read_u16(&raw[12..14]),
            bits_per_sample: LittleEndian::read_u16(&raw[14..16]),
            extra: trailing[..cb_size.min(trailing.len())].to_vec(),
        })
    }

    /// Encodes the full header followed by the extension bytes, `cbSize` set to their length.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let cb_size = u16::try_from(self.extra.len())
            .map_err(|_| MuxError::invalid_format("WAVEFORMATEX extension exceeds 65535 bytes"))?;
        let mut out = Vec::new();
        out.try_reserve_exact(Self::SIZE + self.extra.len())?;
        let mut header = [0u8; Self::SIZE];
        LittleEndian::write_u16(&mut header[0..2], self.format_tag);
        LittleEndian::write_u16(&mut header[2..4], self.channels);
        LittleEndian::write_u32(&mut header[4..8], self.samples_per_sec);
        LittleEndian::write_u32(&mut header[8..12], self.avg_bytes_per_sec);
        LittleEndian::write_u16(&mut header[12..14], self.block_align);
        LittleEndian::write_u16(&mut header[14..16], self.bits_per_sample);
        LittleEndian::write_u16(&mut header[16..18], cb_size);
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.extra);
        Ok(out)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatBlock {
    VideoInfo(VideoInfo),
    VideoInfo2(VideoInfo),
    Mpeg2Video(Mpeg2VideoInfo),
    WaveFormatEx(WaveFormat),
    None,
}

impl FormatBlock {
    /// Geometry header of any of the video block kinds.
    pub fn video_info(&self) -> Option<&VideoInfo> {
        match self {
            FormatBlock::VideoInfo(vi) | FormatBlock::VideoInfo2(vi) => Some(vi),
            FormatBlock::Mpeg2Video(m2) => Some(&m2.header),
            _ => None,
        }
    }

    pub fn wave_format(&self) -> Option<&WaveFormat> {
        match self {
            FormatBlock::WaveFormatEx(wfx) => Some(wfx),
            _ => None,
        }
    }
}

/// A candidate stream encoding offered by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaFormat {
    pub major: MajorType,
    pub subtype: Subtype,
    pub block: FormatBlock,
    /// Declared fixed sample size in bytes, 0 when samples vary in size.
    pub sample_size: u32,
}

impl MediaFormat {
    pub fn video(subtype: Subtype, block: FormatBlock) -> Self {
        Self {
            major: MajorType::Video,
            subtype,
            block,
            sample_size: 0,
        }
    }

    pub fn audio(wfx: WaveFormat) -> Self {
        Self {
            major: MajorType::Audio,
            subtype: Subtype::FourCc(FourCc::from_le_u32(wfx.format_tag as u32)),
            block: FormatBlock::WaveFormatEx(wfx),
            sample_size: 0,
        }
    }

    pub fn with_sample_size(mut self, sample_size: u32) -> Self {
        self.sample_size = sample_size;
        self
    }
}

fn need(raw: &[u8], len: usize, what: &str) -> Result<()> {
    if raw.len() < len {
        return Err(MuxError::invalid_format(format!(
            "{} needs {} bytes, got {}",
            what,
            len,
            raw.len()
        )));
    }
    Ok(())
}
