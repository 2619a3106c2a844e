use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use mp4mux::format::VideoInfo;
use mp4mux::handler::UNITS;
use mp4mux::{
    make_with_config, AtomBuffer, AtomWriter, FormatBlock, FourCc, MediaFormat, MuxConfig, Subtype,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Codec {
    /// Annex-B H.264 byte stream
    H264,
    /// MPEG-4 Part 2 visual elementary stream
    Mpeg4,
}

impl Codec {
    fn format(self, width: i32, height: i32, fps: u32) -> MediaFormat {
        let (subtype, bit_count) = match self {
            Codec::H264 => (Subtype::H264ByteStream, 24),
            Codec::Mpeg4 => (Subtype::FourCc(FourCc::new(b"XVID")), 12),
        };
        let mut vi = VideoInfo::new(width, height, bit_count);
        vi.avg_time_per_frame = UNITS / fps.max(1) as i64;
        MediaFormat::video(subtype, FormatBlock::VideoInfo(vi))
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Elementary stream file, fed to the handler as one sample
    input: PathBuf,
    #[arg(short, long, value_enum)]
    codec: Codec,
    /// 0 takes the size from the first SPS (H.264 only)
    #[arg(long, default_value_t = 0)]
    width: i32,
    #[arg(long, default_value_t = 0)]
    height: i32,
    #[arg(long, default_value_t = 25)]
    fps: u32,
    #[arg(long, default_value_t = 1)]
    track_id: u16,
    /// Where to write the reformatted sample bytes
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Where to write the `stsd` box holding the sample entry
    #[arg(short, long)]
    entry: Option<PathBuf>,
    /// Mux configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => MuxConfig::load(path)?,
        None => MuxConfig::default(),
    };
    utils::set_log(utils::log_filter(&cfg.log.level, &["mp4mux", "stsdgen"]));

    let data =
        fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let format = args.codec.format(args.width, args.height, args.fps);
    let mut handler = make_with_config(&format, &cfg)
        .ok_or_else(|| anyhow!("no handler for {:?}", args.codec))?;

    let mut samples = AtomBuffer::new();
    let written = handler.transform_sample(&mut samples, &data)?;
    tracing::info!(
        "[stsdgen] {} bytes in, {} bytes out, {}x{}",
        written.consumed,
        written.written,
        handler.width(),
        handler.height()
    );

    if let Some(path) = &args.output {
        fs::write(path, samples.into_inner()?)
            .with_context(|| format!("write {}", path.display()))?;
    }

    if !handler.ready() {
        return Err(anyhow!(
            "stream carries no codec configuration, cannot write a sample entry"
        ));
    }
    let mut stsd = AtomBuffer::new();
    stsd.open_child(FourCc::new(b"stsd"))?;
    stsd.append(&0u32.to_be_bytes())?; // version & flags
    stsd.append(&1u32.to_be_bytes())?; // entry count
    handler.write_descriptor(&mut stsd, args.track_id, 1, handler.scale())?;
    stsd.close()?;
    let stsd = stsd.into_inner()?;

    match &args.entry {
        Some(path) => {
            fs::write(path, &stsd).with_context(|| format!("write {}", path.display()))?;
        }
        None => println!("{}", hex(&stsd)),
    }
    Ok(())
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
