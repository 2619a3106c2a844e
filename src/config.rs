use std::{env, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MuxConfig {
    /// Width in bytes of the length prefix written in front of every reformatted NAL unit.
    #[serde(default = "default_nal_length_size")]
    pub nal_length_size: u8,
    #[serde(default = "default_video_timescale")]
    pub video_timescale: u32,
    /// Audio scale used when the sample rate does not fit the 16-bit sample-entry field.
    #[serde(default = "default_audio_fallback_scale")]
    pub audio_fallback_scale: u32,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub log: Log,
}

/// Fields written into every decoder-config descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecoderConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,
    #[serde(default = "default_max_bitrate")]
    pub max_bitrate: u32,
    /// 0 means variable bitrate
    #[serde(default)]
    pub avg_bitrate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_nal_length_size() -> u8 {
    4
}

fn default_video_timescale() -> u32 {
    90_000
}

fn default_audio_fallback_scale() -> u32 {
    45_000
}

fn default_buffer_size() -> u32 {
    15_000
}

fn default_max_bitrate() -> u32 {
    1_500_000
}

fn default_log_level() -> String {
    env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    })
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            nal_length_size: default_nal_length_size(),
            video_timescale: default_video_timescale(),
            audio_fallback_scale: default_audio_fallback_scale(),
            decoder: Default::default(),
            log: Default::default(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_bitrate: default_max_bitrate(),
            avg_bitrate: 0,
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl MuxConfig {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let cfg: MuxConfig = toml::from_str(content).context("parse mux config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.nal_length_size, 1 | 2 | 4) {
            anyhow::bail!(
                "nal_length_size must be 1, 2 or 4, got {}",
                self.nal_length_size
            );
        }
        if self.video_timescale == 0 {
            anyhow::bail!("video_timescale must be positive");
        }
        if self.audio_fallback_scale == 0 || self.audio_fallback_scale > u16::MAX as u32 {
            anyhow::bail!(
                "audio_fallback_scale must be within 1..=65535, got {}",
                self.audio_fallback_scale
            );
        }
        if self.decoder.buffer_size > 0x00FF_FFFF {
            anyhow::bail!(
                "decoder.buffer_size must fit in 24 bits, got {}",
                self.decoder.buffer_size
            );
        }
        Ok(())
    }
}
