use super::{Handler, SampleWrite, TrackKind};
use crate::atom::AtomWriter;
use crate::config::MuxConfig;
use crate::error::{MuxError, Result};
use crate::format::{FormatBlock, FourCc, MediaFormat, Mpeg2VideoInfo};
use crate::nal::{nal_type, sps_dimensions, NalScanner, ParamSetCache, SpsInfo};
use crate::sample_entry::VisualSampleEntry;
use crate::utils::write_length;

/// Parameter sets inside avcC always carry 2-byte lengths, whatever the stream uses.
const PARAM_SET_LENGTH_SIZE: usize = 2;

/// Payload of an `avcC` box (AVCDecoderConfigurationRecord) with one SPS and at most one PPS.
pub fn build_avcc(
    profile: u8,
    compat: u8,
    level: u8,
    length_size: usize,
    sps: &[u8],
    pps: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let (sps_len, _) = write_length(sps.len(), PARAM_SET_LENGTH_SIZE)?;
    let pps_len = pps
        .map(|pps| write_length(pps.len(), PARAM_SET_LENGTH_SIZE))
        .transpose()?;

    let mut payload = Vec::new();
    payload.try_reserve_exact(6 + 2 + sps.len() + pps.map_or(0, |p| 3 + p.len()))?;
    payload.extend_from_slice(&[
        1u8, // configurationVersion
        profile,
        compat,
        level,
        0xFC | (length_size as u8 - 1), // 6 bits reserved + lengthSizeMinusOne
        0xE1,                           // 3 bits reserved + one SPS
    ]);
    payload.extend_from_slice(&sps_len[..PARAM_SET_LENGTH_SIZE]);
    payload.extend_from_slice(sps);

    if let (Some(pps), Some((pps_len, _))) = (pps, pps_len) {
        payload.push(1); // one PPS
        payload.extend_from_slice(&pps_len[..PARAM_SET_LENGTH_SIZE]);
        payload.extend_from_slice(pps);
    }
    Ok(payload)
}

fn write_avc1(
    atom: &mut dyn AtomWriter,
    data_ref: u16,
    width: u32,
    height: u32,
    avcc: &[u8],
) -> Result<()> {
    let entry = VisualSampleEntry::new(data_ref, width, height).encode();
    atom.open_child(FourCc::new(b"avc1"))?;
    atom.append(&entry)?;
    atom.open_child(FourCc::new(b"avcC"))?;
    atom.append(avcc)?;
    atom.close()?;
    atom.close()
}

/// H.264 that already arrives length-prepended, with its parameter sets in
/// the MPEG-2 style format block. Samples are stored as they are.
pub struct H264Handler {
    width: u32,
    height: u32,
    scale: u32,
    info: Mpeg2VideoInfo,
}

impl H264Handler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let FormatBlock::Mpeg2Video(info) = &format.block else {
            return None;
        };
        Some(Self {
            width: info.header.bmi.width.unsigned_abs(),
            height: info.header.bmi.abs_height(),
            scale: cfg.video_timescale,
            info: info.clone(),
        })
    }

    /// Width of the length prefix of the stream's NAL units.
    pub fn length_size(&self) -> usize {
        match self.info.flags {
            1 | 2 | 4 => self.info.flags as usize,
            other => {
                tracing::warn!("[h264] invalid NAL length size {}, assuming 4", other);
                4
            }
        }
    }
}

impl Handler for H264Handler {
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
        Some(self.info.header.avg_time_per_frame)
    }

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        _track_id: u16,
        data_ref: u16,
        _scale: u32,
    ) -> Result<()> {
        let seq = &self.info.sequence_header;
        let sps = NalScanner::length_prefixed(seq, PARAM_SET_LENGTH_SIZE)
            .find(|nal| nal.nal_type() == nal_type::SPS)
            .ok_or(MuxError::MissingParameterSets)?;
        let pps = NalScanner::length_prefixed(seq, PARAM_SET_LENGTH_SIZE)
            .find(|nal| nal.nal_type() == nal_type::PPS);
        if pps.is_none() {
            tracing::warn!("[h264] sequence header has no complete PPS, omitting it from avcC");
        }

        let compat = sps.data().get(2).copied().unwrap_or(0);
        let avcc = build_avcc(
            self.info.profile as u8,
            compat,
            self.info.level as u8,
            self.length_size(),
            sps.data(),
            pps.map(|p| p.data()),
        )?;
        write_avc1(atom, data_ref, self.width, self.height, &avcc)
    }
}

/// H.264 in Annex-B byte-stream form. Start codes are replaced by length
/// prefixes and the first SPS and PPS are kept for the avcC box.
pub struct H264ByteStreamHandler {
    width: u32,
    height: u32,
    frame_duration: i64,
    scale: u32,
    length_size: usize,
    param_sets: ParamSetCache,
}

impl H264ByteStreamHandler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let vi = format.block.video_info()?;
        let length_size = cfg.nal_length_size as usize;
        Some(Self {
            width: vi.bmi.width.unsigned_abs(),
            height: vi.bmi.abs_height(),
            frame_duration: vi.avg_time_per_frame,
            scale: cfg.video_timescale,
            length_size,
            param_sets: ParamSetCache::new(length_size),
        })
    }

    pub fn param_sets(&self) -> &ParamSetCache {
        &self.param_sets
    }

    fn on_sps_captured(&mut self, sps: &[u8]) {
        let info = SpsInfo::parse(sps);
        tracing::debug!(
            "[h264] captured SPS ({} bytes, {})",
            sps.len(),
            info.map(|i| i.codec_string())
                .unwrap_or_else(|| "avc1".to_string())
        );
        if self.width == 0 || self.height == 0 {
            if let Some((w, h)) = sps_dimensions(sps) {
                tracing::debug!("[h264] geometry block has no size, using SPS {}x{}", w, h);
                self.width = w;
                self.height = h;
            }
        }
    }
}

impl Handler for H264ByteStreamHandler {
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
        self.param_sets.has_sps()
    }

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        _track_id: u16,
        data_ref: u16,
        _scale: u32,
    ) -> Result<()> {
        let sps = self.param_sets.sps().ok_or(MuxError::MissingParameterSets)?;
        let info = SpsInfo::parse(sps)
            .ok_or_else(|| MuxError::invalid_format("captured SPS is too short"))?;
        let pps = self.param_sets.pps();
        if pps.is_none() {
            tracing::warn!("[h264] no PPS seen in stream, omitting it from avcC");
        }

        let avcc = build_avcc(
            info.profile,
            info.compat,
            info.level,
            self.length_size,
            sps,
            pps,
        )?;
        write_avc1(atom, data_ref, self.width, self.height, &avcc)
    }

    fn transform_sample(&mut self, atom: &mut dyn AtomWriter, data: &[u8]) -> Result<SampleWrite> {
        let mut out = Vec::new();
        out.try_reserve(data.len() + self.length_size)?;
        let mut candidates = Vec::new();

        for nal in NalScanner::annex_b(data) {
            let (prefix, width) = write_length(nal.len(), self.length_size)?;
            out.try_reserve(width + nal.len())?;
            out.extend_from_slice(&prefix[..width]);
            out.extend_from_slice(nal.data());

            if matches!(nal.nal_type(), nal_type::SPS | nal_type::PPS) {
                candidates.try_reserve(1)?;
                candidates.push(nal);
            }
        }

        atom.append(&out)?;

        // only parameter sets of a sample that reached the container are kept
        for nal in candidates {
            if self.param_sets.capture(&nal)? {
                if nal.nal_type() == nal_type::SPS {
                    self.on_sps_captured(nal.data());
                } else {
                    tracing::debug!("[h264] captured PPS ({} bytes)", nal.len());
                }
            }
        }

        Ok(SampleWrite {
            written: out.len(),
            consumed: data.len(),
        })
    }
}
