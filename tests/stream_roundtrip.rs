use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};

use speex_rs::codec::{ModeId, PacketDecoder, PacketEncoder, StreamDecoder};
use speex_rs::config::CodecConfig;
use speex_rs::codec::SpeexHeader;
use speex_rs::stream::{STREAM_MAGIC, StreamReader, StreamWriter};

fn speech_like(samples: usize, channels: usize) -> Vec<i16> {
    (0..samples)
        .flat_map(|i| {
            let t = i as f32;
            let s = ((t * 0.031).sin() * 4000.0 + (t * 0.113).sin() * 2000.0) as i16;
            std::iter::repeat_n(s, channels)
        })
        .collect()
}

fn encode_to_file(path: &std::path::Path, codec: &CodecConfig, packets: usize) -> usize {
    let mut encoder = PacketEncoder::new(codec).expect("Failed to create encoder");
    let header = encoder.header();
    let file = File::create(path).unwrap();
    let mut writer = StreamWriter::new(BufWriter::new(file), &header).unwrap();

    let per_packet = encoder.input_frame_samples();
    let pcm = speech_like(per_packet * packets / codec.channels as usize, codec.channels as usize);
    for chunk in pcm.chunks_exact(per_packet) {
        let packet = encoder.encode(chunk).unwrap();
        assert!(!packet.is_empty());
        writer.write_packet(&packet).unwrap();
    }
    assert_eq!(writer.packets(), packets as u64);
    writer.finish().unwrap();
    per_packet
}

#[test]
fn test_narrowband_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("speech.spxs");
    let codec = CodecConfig {
        mode: ModeId::NarrowBand,
        channels: 1,
        quality: 6,
        frames_per_packet: 2,
        ..CodecConfig::default()
    };
    let per_packet = encode_to_file(&path, &codec, 10);

    let reader = StreamReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    let header = *reader.header();
    assert_eq!(header.mode(), Ok(ModeId::NarrowBand));
    assert_eq!(header.rate(), 8000);
    assert_eq!(header.frames_per_packet(), 2);

    let mut decoder = PacketDecoder::from_header(&header, true).unwrap();
    let mut total = 0;
    for packet in reader {
        let pcm = decoder.decode(&packet.unwrap()).unwrap();
        assert_eq!(pcm.len(), per_packet);
        total += pcm.len();
    }
    assert_eq!(total, per_packet * 10);
}

#[test]
fn test_wideband_stereo_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.spxs");
    let codec = CodecConfig {
        mode: ModeId::WideBand,
        channels: 2,
        vbr: true,
        ..CodecConfig::default()
    };
    let per_packet = encode_to_file(&path, &codec, 5);
    assert_eq!(per_packet, 640);

    let mut reader = StreamReader::new(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(reader.header().channels(), 2);
    assert!(reader.header().vbr());

    let mut decoder = PacketDecoder::from_header(reader.header(), true).unwrap();
    let mut packets = 0;
    while let Some(packet) = reader.next_packet().unwrap() {
        let pcm = decoder.decode(&packet).unwrap();
        assert_eq!(pcm.len(), 640);
        packets += 1;
    }
    assert_eq!(packets, 5);
}

#[test]
fn test_lost_packets_keep_stream_length() {
    let codec = CodecConfig {
        mode: ModeId::UltraWideBand,
        ..CodecConfig::default()
    };
    let mut encoder = PacketEncoder::new(&codec).unwrap();
    let mut decoder = PacketDecoder::from_header(&encoder.header(), true).unwrap();

    let pcm = speech_like(640 * 4, 1);
    let mut out = Vec::new();
    for (i, chunk) in pcm.chunks_exact(640).enumerate() {
        let packet = encoder.encode(chunk).unwrap();
        if i == 2 {
            out.extend(decoder.decode_lost().unwrap());
        } else {
            out.extend(decoder.decode(&packet).unwrap());
        }
    }
    assert_eq!(out.len(), pcm.len());
}

#[test]
fn test_tampered_frames_per_packet_is_rejected() {
    let header = SpeexHeader::new(8000, 1, ModeId::NarrowBand);
    let mut writer = StreamWriter::new(Vec::new(), &header).unwrap();
    writer.write_packet(&[0u8; 20]).unwrap();
    let mut stream = writer.finish().unwrap();

    // magic, record length, then frames_per_packet at offset 64 of the header
    let offset = STREAM_MAGIC.len() + 4 + 64;
    stream[offset..offset + 4].copy_from_slice(&i32::MAX.to_le_bytes());

    let reader = StreamReader::new(Cursor::new(stream)).unwrap();
    assert_eq!(reader.header().frames_per_packet(), i32::MAX);
    assert!(PacketDecoder::from_header(reader.header(), true).is_err());
}
