use super::{Handler, SampleWrite, TrackKind};
use crate::atom::AtomWriter;
use crate::config::{DecoderConfig, MuxConfig};
use crate::descriptor::{esds_payload, object_type, write_esds, EsParams, StreamType};
use crate::error::Result;
use crate::format::{FormatBlock, FourCc, MediaFormat};
use crate::nal::find_start_code;
use crate::sample_entry::VisualSampleEntry;

/// `video_object_layer_start_code`
const VOL_START_CODE: u8 = 0x20;

/// MPEG-4 Part 2 (DivX/Xvid) video stored as `mp4v`.
pub struct Mpeg4Handler {
    width: u32,
    height: u32,
    frame_duration: i64,
    scale: u32,
    decoder: DecoderConfig,
    /// VOL header, from the format block or captured from the first sample.
    config: Vec<u8>,
}

impl Mpeg4Handler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let FormatBlock::VideoInfo(vi) = &format.block else {
            return None;
        };
        Some(Self {
            width: vi.bmi.width.unsigned_abs(),
            height: vi.bmi.abs_height(),
            frame_duration: vi.avg_time_per_frame,
            scale: cfg.video_timescale,
            decoder: cfg.decoder.clone(),
            config: vi.extra.clone(),
        })
    }

    pub fn config(&self) -> &[u8] {
        &self.config
    }
}

/// Locates the Video Object Layer header in an MPEG-4 visual bitstream: from
/// the VOL start code up to (not including) the next start code.
pub fn extract_vol(data: &[u8]) -> Option<&[u8]> {
    let mut pos = 0usize;
    let mut vol = None;
    while let Some(sc) = find_start_code(data, pos) {
        let Some(&code) = data.get(sc + 3) else {
            break;
        };
        match vol {
            None if code == VOL_START_CODE => vol = Some(sc),
            None => {}
            Some(begin) => return Some(&data[begin..sc]),
        }
        pos = sc + 4;
    }
    None
}

impl Handler for Mpeg4Handler {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_duration(&self) -> Option<i64> {
        Some(self.frame_duration)
    }

    fn ready(&self) -> bool {
        !self.config.is_empty()
    }

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        track_id: u16,
        data_ref: u16,
        _scale: u32,
    ) -> Result<()> {
        if self.config.is_empty() {
            tracing::warn!("[mpeg4] writing mp4v entry without VOL header");
        }
        let entry = VisualSampleEntry::new(data_ref, self.width, self.height).encode();
        let esds = esds_payload(&EsParams {
            es_id: track_id,
            object_type: object_type::MPEG4_VISUAL,
            stream_type: StreamType::Visual,
            decoder: &self.decoder,
            specific_info: &self.config,
        })?;

        atom.open_child(FourCc::new(b"mp4v"))?;
        atom.append(&entry)?;
        write_esds(atom, &esds)?;
        atom.close()
    }

    fn transform_sample(&mut self, atom: &mut dyn AtomWriter, data: &[u8]) -> Result<SampleWrite> {
        if self.config.is_empty() {
            if let Some(vol) = extract_vol(data) {
                let mut config = Vec::new();
                config.try_reserve_exact(vol.len())?;
                config.extend_from_slice(vol);
                self.config = config;
                tracing::debug!("[mpeg4] captured {} byte VOL header in-band", vol.len());
            }
        }
        atom.append(data)?;
        Ok(SampleWrite {
            written: data.len(),
            consumed: data.len(),
        })
    }
}
