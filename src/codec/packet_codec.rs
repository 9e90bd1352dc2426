//! Speex packet encoder/decoder: several frames per packet, optional
//! intensity stereo, terminator-padded packets.
//!
//! - Encoder: interleaved PCM → per-frame stereo downmix → Speex encode → packet
//! - Decoder: packet → Speex decode → stereo expansion → interleaved PCM

use anyhow::{Context, Result};

use super::bits::SpeexBits;
use super::control::ControlFunctions;
use super::decoder::DynamicDecoder;
use super::encoder::DynamicEncoder;
use super::error::DecoderError;
use super::header::SpeexHeader;
use super::mode::ModeId;
use super::stereo::encode_stereo_int;
use super::stream_decoder::StreamDecoder;
use crate::config::CodecConfig;

/// Most frames a packet may carry.
pub const MAX_FRAMES_PER_PACKET: u32 = 10;

// ======================== Packet Encoder ========================

pub struct PacketEncoder {
    encoder: DynamicEncoder,
    bits: SpeexBits<'static>,
    channels: u32,
    frames_per_packet: u32,
    vbr: bool,
    frame: Vec<i16>,
}

impl PacketEncoder {
    /// Create an encoder from codec settings.
    ///
    /// * `mode`              - band mode (nb / wb / uwb)
    /// * `channels`          - 1, or 2 for intensity stereo
    /// * `frames_per_packet` - frames packed into each packet
    /// * `quality`, `complexity`, `vbr`, `vad`, `dtx` - encoder controls
    pub fn new(config: &CodecConfig) -> Result<Self> {
        config.validate()?;

        let mut encoder = DynamicEncoder::new(config.mode)?;
        encoder.set_quality(config.quality)?;
        encoder.set_complexity(config.complexity)?;
        if config.vbr {
            encoder.set_vbr(true)?;
            encoder.set_vbr_quality(config.quality as f32)?;
        }
        if config.vad {
            encoder.set_vad(true)?;
        }
        if config.dtx {
            encoder.set_dtx(true)?;
        }

        let frame = vec![0i16; encoder.frame_size() * config.channels as usize];
        log::info!(
            "Speex encoder: mode {}, {} ch, quality {}, {} frame(s)/packet",
            config.mode,
            config.channels,
            config.quality,
            config.frames_per_packet
        );

        Ok(Self {
            encoder,
            bits: SpeexBits::new(),
            channels: config.channels,
            frames_per_packet: config.frames_per_packet,
            vbr: config.vbr,
            frame,
        })
    }

    pub fn mode(&self) -> ModeId {
        self.encoder.mode()
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Samples per channel in one Speex frame.
    pub fn frame_size(&self) -> usize {
        self.encoder.frame_size()
    }

    /// Total number of interleaved i16 samples per packet.
    pub fn input_frame_samples(&self) -> usize {
        self.frame_size() * self.channels as usize * self.frames_per_packet as usize
    }

    /// Header describing the packets this encoder produces.
    pub fn header(&mut self) -> SpeexHeader {
        let mode = self.mode();
        let mut header = SpeexHeader::new(mode.sample_rate() as i32, self.channels as i32, mode);
        header.set_frames_per_packet(self.frames_per_packet as i32);
        header.set_vbr(self.vbr);
        if let Ok(bitrate) = self.encoder.get_bitrate() {
            header.set_bitrate(bitrate);
        }
        header
    }

    /// Encode one packet of interleaved PCM.
    ///
    /// Input length must equal `input_frame_samples()`.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<Vec<u8>> {
        let expected = self.input_frame_samples();
        if pcm.len() != expected {
            anyhow::bail!(
                "Packet needs {} interleaved samples, got {}",
                expected,
                pcm.len()
            );
        }

        let frame_size = self.frame_size();
        let frame_samples = frame_size * self.channels as usize;
        self.bits.reset();

        let mut skipped = 0;
        for chunk in pcm.chunks_exact(frame_samples) {
            self.frame.copy_from_slice(chunk);
            if self.channels == 2 {
                encode_stereo_int(&mut self.frame, frame_size, &mut self.bits)?;
            }
            let transmit = self
                .encoder
                .encode_int(&mut self.frame[..frame_size], &mut self.bits)?;
            if !transmit {
                skipped += 1;
            }
        }
        if skipped > 0 {
            log::trace!("DTX marked {} frame(s) as silent", skipped);
        }

        self.bits.insert_terminator()?;
        Ok(self.bits.to_vec())
    }
}

// ======================== Packet Decoder ========================

pub struct PacketDecoder {
    decoder: DynamicDecoder,
    channels: u32,
    frames_per_packet: u32,
}

impl PacketDecoder {
    /// Create a decoder.
    ///
    /// * `mode`              - band mode of the stream
    /// * `channels`          - 1, or 2 to expand intensity stereo
    /// * `frames_per_packet` - frames expected in each packet
    /// * `enhancement`       - perceptual post-filter
    pub fn new(mode: ModeId, channels: u32, frames_per_packet: u32, enhancement: bool) -> Result<Self> {
        if !(1..=2).contains(&channels) {
            anyhow::bail!("Unsupported channel count {}, expected 1 or 2", channels);
        }
        if !(1..=MAX_FRAMES_PER_PACKET).contains(&frames_per_packet) {
            anyhow::bail!(
                "Frames per packet {} out of range 1..={}",
                frames_per_packet,
                MAX_FRAMES_PER_PACKET
            );
        }
        let mut decoder = DynamicDecoder::new(mode)?;
        decoder.set_enhancement(enhancement)?;
        if channels == 2 {
            decoder.enable_stereo()?;
        }
        Ok(Self {
            decoder,
            channels,
            frames_per_packet,
        })
    }

    /// Create a decoder matching a stream header.
    ///
    /// The header usually comes from a file, so its channel count and
    /// frames per packet are range-checked rather than trusted.
    pub fn from_header(header: &SpeexHeader, enhancement: bool) -> Result<Self> {
        let mode = header.mode().context("Header names an unknown mode")?;
        let channels = u32::try_from(header.channels())
            .with_context(|| format!("Header has {} channels", header.channels()))?;
        let frames = u32::try_from(header.frames_per_packet()).with_context(|| {
            format!("Header has {} frames per packet", header.frames_per_packet())
        })?;
        log::info!(
            "Speex decoder: mode {}, {} Hz, {} ch, {} frame(s)/packet",
            mode,
            header.rate(),
            channels,
            frames
        );
        Self::new(mode, channels, frames, enhancement)
    }

    pub fn mode(&self) -> ModeId {
        self.decoder.mode()
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Total number of interleaved samples a full packet decodes to.
    pub fn output_frame_samples(&self) -> usize {
        self.decoder.frame_size() * self.channels as usize * self.frames_per_packet as usize
    }

    fn decode_packet(&mut self, data: &[u8]) -> Result<Vec<i16>> {
        let frame_samples = self.decoder.frame_size() * self.channels as usize;
        let mut bits = SpeexBits::from_bytes(data);
        let mut pcm = Vec::with_capacity(self.output_frame_samples());
        let mut frame = vec![0i16; frame_samples];

        for index in 0..self.frames_per_packet {
            let result = if self.channels == 2 {
                self.decoder.decode_stereo_int(&mut bits, &mut frame)
            } else {
                self.decoder.decode_int(&mut bits, &mut frame)
            };
            match result {
                Ok(()) => pcm.extend_from_slice(&frame),
                Err(DecoderError::EndOfStream) => {
                    if index == 0 {
                        anyhow::bail!("Packet holds no Speex frame");
                    }
                    log::debug!("Packet ended after {} of {} frames", index, self.frames_per_packet);
                    break;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to decode frame {}", index));
                }
            }
            if bits.is_overflowed() {
                anyhow::bail!("Decoding overflowed the packet at frame {}", index);
            }
        }
        Ok(pcm)
    }

    fn conceal(&mut self) -> Result<Vec<i16>> {
        let frame_samples = self.decoder.frame_size() * self.channels as usize;
        let mut pcm = Vec::with_capacity(self.output_frame_samples());
        let mut frame = vec![0i16; frame_samples];
        for _ in 0..self.frames_per_packet {
            if self.channels == 2 {
                self.decoder.decode_lost_stereo_int(&mut frame)?;
            } else {
                self.decoder.decode_lost_int(&mut frame)?;
            }
            pcm.extend_from_slice(&frame);
        }
        Ok(pcm)
    }
}

impl StreamDecoder for PacketDecoder {
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>> {
        self.decode_packet(data)
    }

    fn decode_lost(&mut self) -> Result<Vec<i16>> {
        self.conceal()
    }
}
