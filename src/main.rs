use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use speex_rs::codec::{ModeId, PacketDecoder, PacketEncoder, StreamDecoder};
use speex_rs::config::{CodecConfig, Config};
use speex_rs::stream::{StreamReader, StreamWriter};
use speex_rs::LibraryInfo;

#[derive(Parser, Debug)]
#[command(name = "speex_rs")]
#[command(version)]
#[command(about = "Encode and decode raw PCM with the Speex speech codec")]
#[command(long_about = "Encode and decode raw PCM with the Speex speech codec.\n\n\
    Raw audio is signed 16-bit little-endian, channels interleaved.\n\n\
    EXAMPLES:\n    \
    speex_rs info --json\n    \
    speex_rs encode speech.raw speech.spxs --mode nb --quality 6\n    \
    speex_rs decode speech.spxs speech.raw")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the linked library version and mode parameters
    Info {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Encode raw PCM into a .spxs stream
    Encode {
        /// Input raw PCM file (s16le)
        input: PathBuf,

        /// Output .spxs file
        output: PathBuf,

        /// Band mode (nb, wb, uwb)
        #[arg(long)]
        mode: Option<ModeId>,

        /// Number of interleaved input channels (1 or 2)
        #[arg(long)]
        channels: Option<u32>,

        /// Quality 0-10
        #[arg(long)]
        quality: Option<i32>,

        /// Encoder complexity 1-10
        #[arg(long)]
        complexity: Option<i32>,

        /// Frames per packet
        #[arg(long)]
        frames_per_packet: Option<u32>,

        /// Variable bit-rate
        #[arg(long)]
        vbr: bool,

        /// Voice activity detection
        #[arg(long)]
        vad: bool,

        /// Discontinuous transmission
        #[arg(long)]
        dtx: bool,
    },

    /// Decode a .spxs stream into raw PCM
    Decode {
        /// Input .spxs file
        input: PathBuf,

        /// Output raw PCM file (s16le)
        output: PathBuf,

        /// Disable the perceptual enhancer
        #[arg(long)]
        no_enhancement: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().unwrap_or_default();
    let args = Args::parse();

    match args.command {
        Command::Info { json } => print_info(json),
        Command::Encode {
            input,
            output,
            mode,
            channels,
            quality,
            complexity,
            frames_per_packet,
            vbr,
            vad,
            dtx,
        } => {
            // 命令行参数覆盖编译时配置
            let mut codec = config.codec.clone();
            if let Some(mode) = mode {
                codec.mode = mode;
            }
            if let Some(channels) = channels {
                codec.channels = channels;
            }
            if let Some(quality) = quality {
                codec.quality = quality;
            }
            if let Some(complexity) = complexity {
                codec.complexity = complexity;
            }
            if let Some(frames) = frames_per_packet {
                codec.frames_per_packet = frames;
            }
            codec.vbr |= vbr;
            codec.vad |= vad;
            codec.dtx |= dtx;
            encode_file(&input, &output, &codec)
        }
        Command::Decode {
            input,
            output,
            no_enhancement,
        } => decode_file(&input, &output, config.codec.enhancement && !no_enhancement),
    }
}

fn print_info(json: bool) -> anyhow::Result<()> {
    let info = LibraryInfo::collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("Speex {}", info.version);
    for mode in &info.modes {
        println!(
            "  {:<4} {:>5} Hz  {:>3} samples/frame  {}",
            mode.mode.to_string(),
            mode.sample_rate,
            mode.frame_size,
            mode.name
        );
    }
    Ok(())
}

fn encode_file(input: &Path, output: &Path, codec: &CodecConfig) -> anyhow::Result<()> {
    let mut encoder = PacketEncoder::new(codec)?;
    let header = encoder.header();

    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    let out = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = StreamWriter::new(BufWriter::new(out), &header)?;

    let samples = encoder.input_frame_samples();
    let mut raw = vec![0u8; samples * 2];
    let mut pcm = vec![0i16; samples];
    loop {
        let got = read_chunk(&mut reader, &mut raw)?;
        if got == 0 {
            break;
        }
        // Pad the last packet with silence.
        raw[got..].fill(0);
        for (sample, bytes) in pcm.iter_mut().zip(raw.chunks_exact(2)) {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        let packet = encoder.encode(&pcm)?;
        writer.write_packet(&packet)?;
        if got < raw.len() {
            break;
        }
    }

    let packets = writer.packets();
    writer.finish()?;
    log::info!(
        "Encoded {} into {} packets ({})",
        input.display(),
        packets,
        output.display()
    );
    Ok(())
}

fn decode_file(input: &Path, output: &Path, enhancement: bool) -> anyhow::Result<()> {
    let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let mut reader = StreamReader::new(BufReader::new(file))?;
    let mut decoder = PacketDecoder::from_header(reader.header(), enhancement)?;

    let out = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(out);

    let mut packets = 0u64;
    while let Some(packet) = reader.next_packet()? {
        let pcm = match decoder.decode(&packet) {
            Ok(pcm) => pcm,
            Err(e) => {
                log::warn!("Packet {} undecodable, concealing: {:#}", packets, e);
                decoder.decode_lost()?
            }
        };
        for sample in pcm {
            writer.write_all(&sample.to_le_bytes())?;
        }
        packets += 1;
    }
    writer.flush()?;
    log::info!("Decoded {} packets into {}", packets, output.display());
    Ok(())
}

/// Fills `buf` unless the input ends first.
fn read_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> anyhow::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
