use bytes::BytesMut;

use crate::atom::{box_body, AtomBuffer, AtomWriter};
use crate::config::{DecoderConfig, MuxConfig};
use crate::descriptor::{build_es_descriptor, object_type, size_field_len, EsParams, StreamType};
use crate::format::{
    FormatBlock, FourCc, MajorType, MediaFormat, Mpeg2VideoInfo, Subtype, VideoInfo, WaveFormat,
    WAVE_FORMAT_AAC_ENCODER, WAVE_FORMAT_ALAW, WAVE_FORMAT_MULAW,
};
use crate::handler::audio::units_for_samples;
use crate::handler::{can_support, make, make_with_config, select, HandlerKind, MediaSample};
use crate::nal::{nal_type, NalScanner};

const SPS: [u8; 7] = [0x67, 0x4D, 0x40, 0x1F, 0xE8, 0x80, 0x28];
const PPS: [u8; 4] = [0x68, 0xEB, 0xEC, 0xB2];
const SEI: [u8; 5] = [0x06, 0x05, 0x11, 0xB8, 0x80];
const IDR: [u8; 6] = [0x65, 0x88, 0x84, 0x21, 0xA0, 0x7F];

fn annex_b(units: &[&[u8]]) -> Vec<u8> {
    units
        .iter()
        .flat_map(|unit| [&[0u8, 0, 0, 1][..], *unit].concat())
        .collect()
}

fn avc1(block: FormatBlock) -> MediaFormat {
    MediaFormat::video(Subtype::FourCc(FourCc::new(b"avc1")), block)
}

fn mpeg2_block() -> FormatBlock {
    let mut seq = Vec::new();
    for unit in [&SPS[..], &PPS[..]] {
        seq.extend_from_slice(&(unit.len() as u16).to_be_bytes());
        seq.extend_from_slice(unit);
    }
    FormatBlock::Mpeg2Video(Mpeg2VideoInfo {
        header: VideoInfo::new(1280, 720, 24),
        profile: 77,
        level: 31,
        flags: 4,
        sequence_header: seq,
    })
}

fn yuv(code: &[u8; 4], bit_count: u16, sample_size: Option<u32>) -> MediaFormat {
    let vi = VideoInfo::new(640, 480, bit_count);
    let size = sample_size.unwrap_or(vi.bmi.image_size() as u32);
    MediaFormat::video(Subtype::FourCc(FourCc::new(code)), FormatBlock::VideoInfo(vi))
        .with_sample_size(size)
}

#[test]
fn test_avc1_block_kind_picks_framing() {
    assert_eq!(select(&avc1(mpeg2_block())), Some(HandlerKind::H264));
    assert_eq!(
        select(&avc1(FormatBlock::VideoInfo(VideoInfo::new(1280, 720, 24)))),
        Some(HandlerKind::H264ByteStream)
    );
    assert_eq!(
        select(&avc1(FormatBlock::VideoInfo2(VideoInfo::new(1280, 720, 24)))),
        Some(HandlerKind::H264ByteStream)
    );

    let bytestream = MediaFormat::video(
        Subtype::H264ByteStream,
        FormatBlock::VideoInfo(VideoInfo::new(640, 360, 24)),
    );
    assert_eq!(select(&bytestream), Some(HandlerKind::H264ByteStream));
}

#[test]
fn test_mpeg4_codes_need_basic_geometry_block() {
    for code in [b"xvid", b"XVID", b"DIVX", b"DX50"] {
        let format = MediaFormat::video(
            Subtype::FourCc(FourCc::new(code)),
            FormatBlock::VideoInfo(VideoInfo::new(352, 288, 12)),
        );
        assert_eq!(select(&format), Some(HandlerKind::Mpeg4), "{:?}", code);
    }

    let divx2 = MediaFormat::video(
        Subtype::FourCc(FourCc::new(b"DIVX")),
        FormatBlock::VideoInfo2(VideoInfo::new(352, 288, 12)),
    );
    assert_ne!(select(&divx2), Some(HandlerKind::Mpeg4));
    assert!(!can_support(&divx2));
}

#[test]
fn test_companded_audio_selects_wave() {
    for tag in [WAVE_FORMAT_ALAW, WAVE_FORMAT_MULAW] {
        let mut wfx = WaveFormat::pcm(1, 8_000, 8);
        wfx.format_tag = tag;
        assert_eq!(select(&MediaFormat::audio(wfx)), Some(HandlerKind::Wave));
    }
    let pcm = MediaFormat::audio(WaveFormat::pcm(2, 48_000, 16));
    assert_eq!(select(&pcm), Some(HandlerKind::Wave));
}

#[test]
fn test_invalid_config_makes_no_handler() {
    let format = avc1(FormatBlock::VideoInfo(VideoInfo::new(1280, 720, 24)));
    let cfg = MuxConfig {
        nal_length_size: 3,
        ..Default::default()
    };
    assert!(make_with_config(&format, &cfg).is_none());

    let cfg = MuxConfig {
        audio_fallback_scale: 70_000,
        ..Default::default()
    };
    let pcm = MediaFormat::audio(WaveFormat::pcm(2, 96_000, 16));
    assert!(make_with_config(&pcm, &cfg).is_none());
    assert!(make_with_config(&pcm, &MuxConfig::default()).is_some());
}

#[test]
fn test_raw_yuv_needs_depth_and_matching_size() {
    assert_eq!(select(&yuv(b"YUY2", 16, None)), Some(HandlerKind::Yuv));
    assert!(!can_support(&yuv(b"YUY2", 0, None)));
    assert!(!can_support(&yuv(b"YUY2", 16, Some(1234))));
    assert!(!can_support(&yuv(b"RGBA", 32, None)));
}

#[test]
fn test_unsupported_formats_have_no_handler() {
    let other = MediaFormat {
        major: MajorType::Other,
        subtype: Subtype::FourCc(FourCc::new(b"text")),
        block: FormatBlock::None,
        sample_size: 0,
    };
    assert!(make(&other).is_none());

    // MPEG-4 ASP code without a geometry block
    let xvid = MediaFormat::video(Subtype::FourCc(FourCc::new(b"XVID")), FormatBlock::None);
    assert!(make(&xvid).is_none());

    let mut mp3 = WaveFormat::pcm(2, 44_100, 16);
    mp3.format_tag = 0x0055;
    assert!(!can_support(&MediaFormat::audio(mp3)));
}

#[test]
fn test_made_handlers_report_their_kind() {
    let video = make(&avc1(mpeg2_block())).unwrap();
    assert!(video.is_video());
    assert!(!video.is_audio());
    assert_eq!(video.handler_type(), FourCc::new(b"vide"));
    assert_eq!(video.scale(), 90_000);
    assert_eq!((video.width(), video.height()), (1280, 720));
    assert_eq!(video.sample_rate(), 30);

    let mut aac = WaveFormat::pcm(2, 48_000, 16);
    aac.format_tag = WAVE_FORMAT_AAC_ENCODER;
    let audio = make(&MediaFormat::audio(aac)).unwrap();
    assert!(audio.is_audio());
    assert_eq!(audio.handler_type(), FourCc::new(b"soun"));
    assert_eq!(audio.scale(), 48_000);
    assert_eq!(audio.sample_rate(), 50);
    assert!(!audio.can_truncate());
}

#[test]
fn test_reformat_then_rescan_recovers_units() {
    let slice: Vec<u8> = (1..=200u8).collect();
    let units: [&[u8]; 5] = [&SPS, &PPS, &SEI, &IDR, &slice];
    let input = annex_b(&units);

    let format = avc1(FormatBlock::VideoInfo(VideoInfo::new(1280, 720, 24)));
    let mut handler = make(&format).unwrap();
    let mut atom = AtomBuffer::new();
    let written = handler.transform_sample(&mut atom, &input).unwrap();
    let out = atom.into_inner().unwrap();

    assert_eq!(written.consumed, input.len());
    assert_eq!(written.written, out.len());
    // each 4-byte start code became a 4-byte length
    assert_eq!(out.len(), input.len());

    let rescanned: Vec<_> = NalScanner::length_prefixed(&out, 4).collect();
    assert_eq!(rescanned.len(), units.len());
    for (unit, expected) in rescanned.iter().zip(units.iter()) {
        assert_eq!(unit.data(), *expected);
        assert_eq!(unit.nal_type(), expected[0] & 0x1F);
    }
}

#[test]
fn test_reformat_with_two_byte_lengths() {
    let cfg = MuxConfig {
        nal_length_size: 2,
        ..Default::default()
    };
    let format = avc1(FormatBlock::VideoInfo(VideoInfo::new(1280, 720, 24)));
    let mut handler = make_with_config(&format, &cfg).unwrap();
    let mut atom = AtomBuffer::new();
    handler
        .transform_sample(&mut atom, &annex_b(&[&SPS, &PPS, &IDR]))
        .unwrap();
    let out = atom.into_inner().unwrap();
    let types: Vec<_> = NalScanner::length_prefixed(&out, 2)
        .map(|unit| unit.nal_type())
        .collect();
    assert_eq!(types, vec![nal_type::SPS, nal_type::PPS, nal_type::IDR]);
}

#[test]
fn test_first_sps_wins_across_samples() {
    let format = avc1(FormatBlock::VideoInfo(VideoInfo::new(1280, 720, 24)));
    let mut handler = make(&format).unwrap();
    assert!(!handler.ready());

    let mut samples = AtomBuffer::new();
    handler
        .transform_sample(&mut samples, &annex_b(&[&SPS, &PPS, &IDR]))
        .unwrap();
    assert!(handler.ready());

    let later_sps = [0x67, 0x64, 0x00, 0x28, 0xAC, 0xD9];
    handler
        .transform_sample(&mut samples, &annex_b(&[&later_sps, &IDR]))
        .unwrap();

    let mut stsd = AtomBuffer::new();
    stsd.open_child(FourCc::new(b"stsd")).unwrap();
    handler.write_descriptor(&mut stsd, 1, 1, 90_000).unwrap();
    stsd.close().unwrap();
    let out = stsd.into_inner().unwrap();

    let avcc = box_body(&out, b"avcC").unwrap();
    assert_eq!(&avcc[..6], &[1, 0x4D, 0x40, 0x1F, 0xFF, 0xE1]);
    assert_eq!(&avcc[6..8], &(SPS.len() as u16).to_be_bytes());
    assert_eq!(&avcc[8..8 + SPS.len()], &SPS);
    let pps_at = 8 + SPS.len();
    assert_eq!(&avcc[pps_at..pps_at + 3], &[1, 0, PPS.len() as u8]);
    assert_eq!(&avcc[pps_at + 3..], &PPS);
}

#[test]
fn test_length_prepended_descriptor_from_format_block() {
    let handler = make(&avc1(mpeg2_block())).unwrap();
    let mut atom = AtomBuffer::new();
    handler.write_descriptor(&mut atom, 1, 1, 90_000).unwrap();
    let out = atom.into_inner().unwrap();

    assert_eq!(&out[4..8], b"avc1");
    let avcc = box_body(&out, b"avcC").unwrap();
    // profile and level from the block, compatibility from the SPS
    assert_eq!(&avcc[..6], &[1, 77, 0x40, 31, 0xFF, 0xE1]);
    assert_eq!(avcc.len(), 6 + 2 + SPS.len() + 1 + 2 + PPS.len());
}

#[test]
fn test_descriptor_length_matches_serialized_size() {
    let decoder = DecoderConfig::default();
    for dsi_len in [0usize, 1, 2, 100, 127, 128, 200, 16_383, 16_384, 20_000] {
        let info = vec![0xA5u8; dsi_len];
        let es = build_es_descriptor(&EsParams {
            es_id: 1,
            object_type: object_type::PRIVATE,
            stream_type: StreamType::Audio,
            decoder: &decoder,
            specific_info: &info,
        })
        .unwrap();
        let bytes = es.to_bytes().unwrap();
        assert_eq!(bytes.len(), es.len(), "dsi of {} bytes", dsi_len);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(
            bytes.len(),
            1 + size_field_len(es.body().len()) + es.body().len()
        );
    }
}

#[test]
fn test_pcm_truncation_through_dispatch() {
    let format = MediaFormat::audio(WaveFormat::pcm(2, 44_100, 16));
    let handler = make(&format).unwrap();
    assert!(handler.can_truncate());

    let mut sample = MediaSample {
        data: BytesMut::from(&[7u8; 4_410][..]),
        start: 0,
        end: 250_000,
    };
    let new_start = units_for_samples(1, 44_100);
    assert!(handler.truncate(&mut sample, new_start));
    assert_eq!(sample.data.len(), 4_406);
    assert_eq!(sample.start, new_start);

    // a delta beyond the payload empties it
    assert!(handler.truncate(&mut sample, 10 * new_start + 1_000_000));
    assert!(sample.data.is_empty());
}

#[test]
fn test_samples_written_inside_mdat() {
    let format = yuv(b"UYVY", 16, None);
    let mut handler = make(&format).unwrap();
    let frame = vec![0x80u8; format.sample_size as usize];

    let mut atom = AtomBuffer::new();
    atom.open_child(FourCc::new(b"mdat")).unwrap();
    let written = handler.transform_sample(&mut atom, &frame).unwrap();
    atom.close().unwrap();
    let out = atom.into_inner().unwrap();

    assert_eq!(written.written, frame.len());
    assert_eq!(out.len(), 8 + frame.len());
    assert_eq!(box_body(&out, b"mdat").unwrap().len(), frame.len());
}
