use bytes::Buf;

use super::{Handler, MediaSample, TrackKind, UNITS};
use crate::atom::AtomWriter;
use crate::config::{DecoderConfig, MuxConfig};
use crate::descriptor::{esds_payload, object_type, write_esds, EsParams, StreamType};
use crate::error::Result;
use crate::format::{
    FourCc, MediaFormat, WaveFormat, WAVE_FORMAT_ALAW, WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM,
};
use crate::sample_entry::AudioSampleEntry;

/// The sample-entry rate field holds only the integer part of a 16.16 value,
/// so rates above 65535 are replaced by `fallback`.
fn audio_scale(rate: u32, fallback: u32) -> u32 {
    if rate > u16::MAX as u32 {
        fallback
    } else {
        rate
    }
}

fn write_audio_entry(
    atom: &mut dyn AtomWriter,
    code: FourCc,
    data_ref: u16,
    rate: u32,
    es: &EsParams<'_>,
) -> Result<()> {
    // a fallback that does not fit either is rejected by MuxConfig::validate
    let rate = u16::try_from(rate).unwrap_or(u16::MAX);
    let entry = AudioSampleEntry::new(data_ref, rate).encode();
    let esds = esds_payload(es)?;
    atom.open_child(code)?;
    atom.append(&entry)?;
    write_esds(atom, &esds)?;
    atom.close()
}

/// Number of 100-ns units spanning `samples` samples at `rate`, rounded up.
pub fn units_for_samples(samples: u64, rate: u32) -> i64 {
    let units = (samples as i128 * UNITS as i128 + rate as i128 - 1) / rate as i128;
    units as i64
}

/// Bytes covering `delta` 100-ns units of PCM audio, in whole blocks.
pub fn excess_bytes(delta: i64, rate: u32, block_align: u16) -> usize {
    if delta <= 0 {
        return 0;
    }
    let samples = delta as i128 * rate as i128 / UNITS as i128;
    (samples * block_align as i128).min(usize::MAX as i128) as usize
}

/// AAC audio stored as `mp4a`; the format block's extension bytes are the
/// AudioSpecificConfig.
pub struct AacHandler {
    wfx: WaveFormat,
    scale: u32,
    fallback_scale: u32,
    decoder: DecoderConfig,
}

impl AacHandler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let wfx = format.block.wave_format()?.clone();
        Some(Self {
            scale: audio_scale(wfx.samples_per_sec, cfg.audio_fallback_scale),
            fallback_scale: cfg.audio_fallback_scale,
            wfx,
            decoder: cfg.decoder.clone(),
        })
    }
}

impl Handler for AacHandler {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        track_id: u16,
        data_ref: u16,
        scale: u32,
    ) -> Result<()> {
        if self.wfx.extra.is_empty() {
            tracing::warn!("[audio] AAC format has no AudioSpecificConfig");
        }
        write_audio_entry(
            atom,
            FourCc::new(b"mp4a"),
            data_ref,
            audio_scale(scale, self.fallback_scale),
            &EsParams {
                es_id: track_id,
                object_type: object_type::AAC,
                stream_type: StreamType::Audio,
                decoder: &self.decoder,
                specific_info: &self.wfx.extra,
            },
        )
    }
}

/// PCM, A-law and mu-law audio. The whole wave header travels as
/// decoder-specific info.
pub struct WaveHandler {
    wfx: WaveFormat,
    scale: u32,
    fallback_scale: u32,
    decoder: DecoderConfig,
}

impl WaveHandler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let wfx = format.block.wave_format()?.clone();
        Some(Self {
            scale: audio_scale(wfx.samples_per_sec, cfg.audio_fallback_scale),
            fallback_scale: cfg.audio_fallback_scale,
            wfx,
            decoder: cfg.decoder.clone(),
        })
    }

    fn entry_code(&self) -> FourCc {
        match self.wfx.format_tag {
            WAVE_FORMAT_MULAW => FourCc::new(b"ulaw"),
            WAVE_FORMAT_ALAW => FourCc::new(b"alaw"),
            _ => FourCc::new(b"lpcm"),
        }
    }
}

impl Handler for WaveHandler {
    fn kind(&self) -> TrackKind {
        TrackKind::Audio
    }

    fn scale(&self) -> u32 {
        self.scale
    }

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        track_id: u16,
        data_ref: u16,
        scale: u32,
    ) -> Result<()> {
        let header = self.wfx.to_bytes()?;
        write_audio_entry(
            atom,
            self.entry_code(),
            data_ref,
            audio_scale(scale, self.fallback_scale),
            &EsParams {
                es_id: track_id,
                object_type: object_type::PRIVATE,
                stream_type: StreamType::Audio,
                decoder: &self.decoder,
                specific_info: &header,
            },
        )
    }

    fn can_truncate(&self) -> bool {
        self.wfx.format_tag == WAVE_FORMAT_PCM
    }

    fn truncate(&self, sample: &mut MediaSample, new_start: i64) -> bool {
        if !self.can_truncate() || new_start <= sample.start {
            return false;
        }
        let excess = excess_bytes(
            new_start - sample.start,
            self.wfx.samples_per_sec,
            self.wfx.block_align,
        )
        .min(sample.data.len());
        sample.data.advance(excess);
        sample.start = new_start;
        tracing::debug!(
            "[audio] truncated {} bytes, {} left",
            excess,
            sample.data.len()
        );
        true
    }
}
