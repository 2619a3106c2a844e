//! Fixed headers of visual and audio sample entries (ISO/IEC 14496-12 12.1.3, 12.2.3).
//! All multi-byte fields are written big-endian.

pub const VISUAL_ENTRY_SIZE: usize = 78;
pub const AUDIO_ENTRY_SIZE: usize = 28;

/// 72 dpi in 16.16 fixed point
const RESOLUTION_72_DPI: u32 = 0x0048_0000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisualSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    /// Shown by players; stored as a Pascal string of at most 31 characters.
    pub compressor_name: String,
    pub depth: u16,
}

impl VisualSampleEntry {
    /// Sizes beyond the 16-bit fields saturate at 65535.
    pub fn new(data_reference_index: u16, width: u32, height: u32) -> Self {
        Self {
            data_reference_index,
            width: u16::try_from(width).unwrap_or(u16::MAX),
            height: u16::try_from(height).unwrap_or(u16::MAX),
            compressor_name: String::new(),
            depth: 0x0018,
        }
    }

    pub fn encode(&self) -> [u8; VISUAL_ENTRY_SIZE] {
        let mut payload = Vec::with_capacity(VISUAL_ENTRY_SIZE);
        payload.extend_from_slice(&[0u8; 6]); // reserved
        payload.extend_from_slice(&self.data_reference_index.to_be_bytes());

        payload.extend_from_slice(&0u16.to_be_bytes()); // pre_defined
        payload.extend_from_slice(&0u16.to_be_bytes()); // reserved
        payload.extend_from_slice(&[0u8; 12]); // pre_defined[3]

        payload.extend_from_slice(&self.width.to_be_bytes());
        payload.extend_from_slice(&self.height.to_be_bytes());

        payload.extend_from_slice(&RESOLUTION_72_DPI.to_be_bytes());
        payload.extend_from_slice(&RESOLUTION_72_DPI.to_be_bytes());

        payload.extend_from_slice(&0u32.to_be_bytes()); // reserved
        payload.extend_from_slice(&1u16.to_be_bytes()); // frame_count

        let mut name = [0u8; 32];
        let len = self.compressor_name.len().min(31);
        name[0] = len as u8;
        name[1..=len].copy_from_slice(&self.compressor_name.as_bytes()[..len]);
        payload.extend_from_slice(&name);

        payload.extend_from_slice(&self.depth.to_be_bytes());
        payload.extend_from_slice(&0xFFFFu16.to_be_bytes()); // pre_defined = -1

        let mut out = [0u8; VISUAL_ENTRY_SIZE];
        out.copy_from_slice(&payload);
        out
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// Integer part of the 16.16 sample-rate field.
    pub sample_rate: u16,
}

impl AudioSampleEntry {
    /// Template values of a version-0 entry: stereo, 16-bit.
    pub fn new(data_reference_index: u16, sample_rate: u16) -> Self {
        Self {
            data_reference_index,
            channel_count: 2,
            sample_size: 16,
            sample_rate,
        }
    }

    pub fn encode(&self) -> [u8; AUDIO_ENTRY_SIZE] {
        let mut b = [0u8; AUDIO_ENTRY_SIZE];
        b[6..8].copy_from_slice(&self.data_reference_index.to_be_bytes());
        // 8..16 version, revision level, vendor
        b[16..18].copy_from_slice(&self.channel_count.to_be_bytes());
        b[18..20].copy_from_slice(&self.sample_size.to_be_bytes());
        // 20..24 pre_defined, reserved
        b[24..26].copy_from_slice(&self.sample_rate.to_be_bytes());
        b
    }
}
