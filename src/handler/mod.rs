pub mod audio;
pub mod h264;
pub mod mpeg4;
pub mod yuv;

use audio::{AacHandler, WaveHandler};
use bytes::BytesMut;
use h264::{H264ByteStreamHandler, H264Handler};
use mpeg4::Mpeg4Handler;
use yuv::YuvHandler;

use crate::atom::AtomWriter;
use crate::config::MuxConfig;
use crate::error::Result;
use crate::format::{
    FormatBlock, FourCc, MajorType, MediaFormat, Subtype, WAVE_FORMAT_AAC,
    WAVE_FORMAT_AAC_ENCODER, WAVE_FORMAT_ALAW, WAVE_FORMAT_MULAW, WAVE_FORMAT_PCM,
};

/// Reference time unit: 100 ns.
pub const UNITS: i64 = 10_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// Outcome of pushing one sample through a handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleWrite {
    /// Bytes appended to the container.
    pub written: usize,
    /// Input bytes consumed.
    pub consumed: usize,
}

/// A host sample whose payload and start time may be edited in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaSample {
    pub data: BytesMut,
    /// Start and end in 100-ns units.
    pub start: i64,
    pub end: i64,
}

/// Per-stream codec handler: turns samples into their on-disk form and emits
/// the codec's sample-description entry.
pub trait Handler: Send {
    fn kind(&self) -> TrackKind;

    /// Media handler code of the track (`vide` / `soun`).
    fn handler_type(&self) -> FourCc {
        match self.kind() {
            TrackKind::Video => FourCc::new(b"vide"),
            TrackKind::Audio => FourCc::new(b"soun"),
        }
    }

    fn is_video(&self) -> bool {
        self.kind() == TrackKind::Video
    }

    fn is_audio(&self) -> bool {
        self.kind() == TrackKind::Audio
    }

    /// Media timescale of the track.
    fn scale(&self) -> u32;

    /// Approximate samples per second, used for interleaving decisions.
    fn sample_rate(&self) -> u32 {
        match self.kind() {
            TrackKind::Video => 30,
            TrackKind::Audio => 50,
        }
    }

    fn width(&self) -> u32 {
        0
    }

    fn height(&self) -> u32 {
        0
    }

    /// Average frame duration in 100-ns units, if the format declares one.
    fn frame_duration(&self) -> Option<i64> {
        None
    }

    /// Whether everything the sample entry needs has been collected.
    fn ready(&self) -> bool {
        true
    }

    /// Writes the sample-entry box for this stream under the current box (`stsd`).
    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        track_id: u16,
        data_ref: u16,
        scale: u32,
    ) -> Result<()>;

    /// Appends `data` to the current box in its on-disk form.
    fn transform_sample(&mut self, atom: &mut dyn AtomWriter, data: &[u8]) -> Result<SampleWrite> {
        atom.append(data)?;
        Ok(SampleWrite {
            written: data.len(),
            consumed: data.len(),
        })
    }

    fn can_truncate(&self) -> bool {
        false
    }

    /// Drops the part of `sample` that lies before `new_start`.
    /// Returns false, leaving the sample untouched, when not applicable.
    fn truncate(&self, sample: &mut MediaSample, new_start: i64) -> bool {
        let _ = (sample, new_start);
        false
    }
}

/// Handler variant chosen for a media format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Mpeg4,
    H264,
    H264ByteStream,
    Yuv,
    Aac,
    Wave,
}

const MPEG4_CODES: [FourCc; 4] = [
    FourCc::new(b"xvid"),
    FourCc::new(b"XVID"),
    FourCc::new(b"DIVX"),
    FourCc::new(b"DX50"),
];

const H264_CODES: [FourCc; 4] = [
    FourCc::new(b"x264"),
    FourCc::new(b"H264"),
    FourCc::new(b"h264"),
    FourCc::new(b"avc1"),
];

const YUV_CODES: [FourCc; 5] = [
    FourCc::new(b"YUY2"),
    FourCc::new(b"UYVY"),
    FourCc::new(b"YV12"),
    FourCc::new(b"NV12"),
    FourCc::new(b"I420"),
];

/// Picks the handler variant for `format`; first matching rule wins.
pub fn select(format: &MediaFormat) -> Option<HandlerKind> {
    match format.major {
        MajorType::Video => select_video(format),
        MajorType::Audio => select_audio(format),
        MajorType::Other => None,
    }
}

fn select_video(format: &MediaFormat) -> Option<HandlerKind> {
    let fourcc = format.subtype.fourcc();

    if fourcc.is_some_and(|f| MPEG4_CODES.contains(&f))
        && matches!(format.block, FormatBlock::VideoInfo(_))
    {
        return Some(HandlerKind::Mpeg4);
    }

    let is_h264 = format.subtype == Subtype::H264ByteStream
        || fourcc.is_some_and(|f| H264_CODES.contains(&f));
    if is_h264 {
        match format.block {
            FormatBlock::VideoInfo(_) | FormatBlock::VideoInfo2(_) => {
                return Some(HandlerKind::H264ByteStream)
            }
            FormatBlock::Mpeg2Video(_) => return Some(HandlerKind::H264),
            _ => {}
        }
    }

    // uncompressed: only an explicit list of packed/planar YUV layouts
    if let (Some(fcc), FormatBlock::VideoInfo(vi)) = (fourcc, &format.block) {
        if vi.bmi.bit_count > 0
            && vi.bmi.image_size() == format.sample_size as u64
            && YUV_CODES.contains(&fcc)
        {
            return Some(HandlerKind::Yuv);
        }
    }
    None
}

fn select_audio(format: &MediaFormat) -> Option<HandlerKind> {
    // the format tag identifies the codec; the subtype adds nothing
    let wfx = format.block.wave_format()?;
    match wfx.format_tag {
        WAVE_FORMAT_AAC | WAVE_FORMAT_AAC_ENCODER => Some(HandlerKind::Aac),
        WAVE_FORMAT_PCM | WAVE_FORMAT_ALAW | WAVE_FORMAT_MULAW => Some(HandlerKind::Wave),
        _ => None,
    }
}

pub fn can_support(format: &MediaFormat) -> bool {
    select(format).is_some()
}

/// Creates the handler for `format` with the default configuration.
pub fn make(format: &MediaFormat) -> Option<Box<dyn Handler>> {
    make_with_config(format, &MuxConfig::default())
}

/// Returns `None` for unsupported formats and for a config that fails validation.
pub fn make_with_config(format: &MediaFormat, config: &MuxConfig) -> Option<Box<dyn Handler>> {
    if let Err(e) = config.validate() {
        tracing::warn!("[dispatch] rejecting invalid config: {}", e);
        return None;
    }
    let Some(kind) = select(format) else {
        tracing::debug!(
            "[dispatch] unsupported format {:?}/{:?}",
            format.major,
            format.subtype
        );
        return None;
    };
    tracing::info!("[dispatch] {:?} handler for {:?}", kind, format.subtype);

    let handler: Box<dyn Handler> = match kind {
        HandlerKind::Mpeg4 => Box::new(Mpeg4Handler::new(format, config)?),
        HandlerKind::H264 => Box::new(H264Handler::new(format, config)?),
        HandlerKind::H264ByteStream => Box::new(H264ByteStreamHandler::new(format, config)?),
        HandlerKind::Yuv => Box::new(YuvHandler::new(format, config)?),
        HandlerKind::Aac => Box::new(AacHandler::new(format, config)?),
        HandlerKind::Wave => Box::new(WaveHandler::new(format, config)?),
    };
    Some(handler)
}
