use serde::{Deserialize, Serialize};

use crate::codec::ModeId;

/// Codec defaults, baked in from `config.toml` and overridable on the
/// command line.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CodecConfig {
    pub mode: ModeId,
    pub channels: u32,
    pub quality: i32,
    pub complexity: i32,
    pub vbr: bool,
    pub vad: bool,
    pub dtx: bool,
    pub enhancement: bool,
    pub frames_per_packet: u32,
}

impl CodecConfig {
    /// Checks the values the codec cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=2).contains(&self.channels) {
            anyhow::bail!("Unsupported channel count {}, expected 1 or 2", self.channels);
        }
        if !(0..=10).contains(&self.quality) {
            anyhow::bail!("Quality {} out of range 0..=10", self.quality);
        }
        if !(1..=10).contains(&self.complexity) {
            anyhow::bail!("Complexity {} out of range 1..=10", self.complexity);
        }
        if !(1..=10).contains(&self.frames_per_packet) {
            anyhow::bail!(
                "Frames per packet {} out of range 1..=10",
                self.frames_per_packet
            );
        }
        Ok(())
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mode: ModeId::WideBand,
            channels: 1,
            quality: 8,
            complexity: 3,
            vbr: false,
            vad: false,
            dtx: false,
            enhancement: true,
            frames_per_packet: 1,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Config {
    // 应用信息
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 编解码器配置
    pub codec: CodecConfig,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            codec: CodecConfig {
                mode: env!("CODEC_MODE")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_MODE")?,
                channels: env!("CODEC_CHANNELS")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_CHANNELS")?,
                quality: env!("CODEC_QUALITY")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_QUALITY")?,
                complexity: env!("CODEC_COMPLEXITY")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_COMPLEXITY")?,
                vbr: env!("CODEC_VBR")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_VBR")?,
                vad: env!("CODEC_VAD")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_VAD")?,
                dtx: env!("CODEC_DTX")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_DTX")?,
                enhancement: env!("CODEC_ENHANCEMENT")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_ENHANCEMENT")?,
                frames_per_packet: env!("CODEC_FRAMES_PER_PACKET")
                    .parse()
                    .map_err(|_| "Failed to parse CODEC_FRAMES_PER_PACKET")?,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            log::warn!("{}, using built-in codec defaults", e);
            Self {
                app_name: env!("CARGO_PKG_NAME"),
                app_version: env!("CARGO_PKG_VERSION"),
                codec: CodecConfig::default(),
            }
        })
    }
}
