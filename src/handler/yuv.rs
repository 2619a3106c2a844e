use super::{Handler, TrackKind};
use crate::atom::AtomWriter;
use crate::config::MuxConfig;
use crate::error::Result;
use crate::format::{FourCc, MediaFormat};
use crate::sample_entry::VisualSampleEntry;

const COMPRESSOR_NAME: &str = "YUV Video";

/// Uncompressed YUV frames, stored under their pixel-format code with no
/// codec configuration.
pub struct YuvHandler {
    fourcc: FourCc,
    width: u32,
    height: u32,
    depth: u16,
    frame_duration: i64,
    scale: u32,
}

impl YuvHandler {
    pub fn new(format: &MediaFormat, cfg: &MuxConfig) -> Option<Self> {
        let fourcc = format.subtype.fourcc()?;
        let vi = format.block.video_info()?;
        Some(Self {
            fourcc,
            width: vi.bmi.width.unsigned_abs(),
            height: vi.bmi.abs_height(),
            depth: vi.bmi.bit_count,
            frame_duration: vi.avg_time_per_frame,
            scale: cfg.video_timescale,
        })
    }
}

impl Handler for YuvHandler {
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

    fn write_descriptor(
        &self,
        atom: &mut dyn AtomWriter,
        _track_id: u16,
        data_ref: u16,
        _scale: u32,
    ) -> Result<()> {
        let mut entry = VisualSampleEntry::new(data_ref, self.width, self.height);
        entry.compressor_name = COMPRESSOR_NAME.to_string();
        entry.depth = self.depth;
        tracing::debug!(
            "[yuv] {} entry {}x{} depth {}",
            self.fourcc,
            self.width,
            self.height,
            self.depth
        );

        atom.open_child(self.fourcc)?;
        atom.append(&entry.encode())?;
        atom.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomBuffer;
    use crate::format::{FormatBlock, Subtype, VideoInfo};

    #[test]
    fn test_yuv_entry_is_fixed_78_bytes() {
        let vi = VideoInfo::new(320, -240, 16);
        let size = vi.bmi.image_size() as u32;
        let format = MediaFormat::video(
            Subtype::FourCc(FourCc::new(b"YUY2")),
            FormatBlock::VideoInfo(vi),
        )
        .with_sample_size(size);
        let handler = YuvHandler::new(&format, &MuxConfig::default()).unwrap();

        let mut atom = AtomBuffer::new();
        handler.write_descriptor(&mut atom, 1, 1, 90_000).unwrap();
        let out = atom.into_inner().unwrap();

        assert_eq!(out.len(), 8 + 78);
        assert_eq!(&out[0..4], &86u32.to_be_bytes());
        assert_eq!(&out[4..8], b"YUY2");
        let entry = &out[8..];
        assert_eq!(&entry[6..8], &[0, 1]);
        assert_eq!(&entry[24..26], &320u16.to_be_bytes());
        assert_eq!(&entry[26..28], &240u16.to_be_bytes());
        assert_eq!(entry[42], 9);
        assert_eq!(&entry[43..52], b"YUV Video");
        assert_eq!(&entry[74..76], &16u16.to_be_bytes());
        assert_eq!(&entry[76..78], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_yuv_samples_pass_through() {
        let format = MediaFormat::video(
            Subtype::FourCc(FourCc::new(b"NV12")),
            FormatBlock::VideoInfo(VideoInfo::new(4, 2, 12)),
        );
        let mut handler = YuvHandler::new(&format, &MuxConfig::default()).unwrap();
        let frame = [0x10u8; 12];
        let mut atom = AtomBuffer::new();
        let written = handler.transform_sample(&mut atom, &frame).unwrap();
        assert_eq!(written.written, 12);
        assert_eq!(atom.as_bytes(), &frame);
    }
}
