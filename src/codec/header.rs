//! The 80-byte stream header that precedes Speex audio packets.

use std::ffi::{c_char, c_int, c_void};
use std::mem::MaybeUninit;

use serde::Serialize;

use crate::sys;

use super::error::{HeaderError, ModeError};
use super::mode::ModeId;

/// Size of a serialized header.
pub const HEADER_SIZE: usize = std::mem::size_of::<sys::SpeexHeader>();

const MODE_OFFSET: usize = 40;

/// Describes a Speex stream: rate, mode, channels and framing.
#[derive(Clone, Copy)]
pub struct SpeexHeader {
    raw: sys::SpeexHeader,
}

impl SpeexHeader {
    pub const MAGIC: &'static [u8; 8] = b"Speex   ";

    /// Header for a stream at `rate` Hz with `channels` channels in `mode`.
    pub fn new(rate: i32, channels: i32, mode: ModeId) -> Self {
        let raw = unsafe {
            let mut uninit: MaybeUninit<sys::SpeexHeader> = MaybeUninit::zeroed();
            sys::speex_init_header(uninit.as_mut_ptr(), rate, channels, mode.get_mode());
            uninit.assume_init()
        };
        Self { raw }
    }

    /// Parses a header packet.
    pub fn from_packet(packet: &[u8]) -> Result<Self, HeaderError> {
        if packet.len() < HEADER_SIZE {
            return Err(HeaderError::TooShort(packet.len()));
        }
        if &packet[..Self::MAGIC.len()] != Self::MAGIC {
            return Err(HeaderError::BadMagic);
        }
        let mut mode_bytes = [0u8; 4];
        mode_bytes.copy_from_slice(&packet[MODE_OFFSET..MODE_OFFSET + 4]);
        let mode = i32::from_le_bytes(mode_bytes);
        if ModeId::try_from(mode).is_err() {
            return Err(HeaderError::InvalidMode(mode));
        }

        // The library takes a mutable pointer but only reads the packet.
        let mut copy = packet.to_vec();
        let ptr = unsafe {
            sys::speex_packet_to_header(copy.as_mut_ptr() as *mut c_char, copy.len() as c_int)
        };
        if ptr.is_null() {
            return Err(HeaderError::Rejected);
        }
        let raw = unsafe {
            let raw = *ptr;
            sys::speex_header_free(ptr as *mut c_void);
            raw
        };
        Ok(Self { raw })
    }

    /// Serializes the header into an 80-byte little-endian packet.
    pub fn to_packet(&self) -> Vec<u8> {
        let mut raw = self.raw;
        let mut size: c_int = 0;
        let ptr = unsafe { sys::speex_header_to_packet(&mut raw, &mut size) };
        if ptr.is_null() {
            return Vec::new();
        }
        unsafe {
            let packet = std::slice::from_raw_parts(ptr as *const u8, size.max(0) as usize).to_vec();
            sys::speex_header_free(ptr as *mut c_void);
            packet
        }
    }

    /// Version string of the library that wrote the header.
    pub fn version(&self) -> String {
        let bytes: Vec<u8> = self
            .raw
            .speex_version
            .iter()
            .map(|&c| c as u8)
            .take_while(|&b| b != 0)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn version_id(&self) -> i32 {
        self.raw.speex_version_id
    }

    pub fn header_size(&self) -> i32 {
        self.raw.header_size
    }

    pub fn rate(&self) -> i32 {
        self.raw.rate
    }

    pub fn mode(&self) -> Result<ModeId, ModeError> {
        ModeId::try_from(self.raw.mode)
    }

    pub fn mode_bitstream_version(&self) -> i32 {
        self.raw.mode_bitstream_version
    }

    pub fn channels(&self) -> i32 {
        self.raw.nb_channels
    }

    /// Nominal bit-rate, -1 when unknown.
    pub fn bitrate(&self) -> i32 {
        self.raw.bitrate
    }

    pub fn set_bitrate(&mut self, bitrate: i32) {
        self.raw.bitrate = bitrate;
    }

    /// Samples per frame.
    pub fn frame_size(&self) -> i32 {
        self.raw.frame_size
    }

    pub fn vbr(&self) -> bool {
        self.raw.vbr != 0
    }

    pub fn set_vbr(&mut self, vbr: bool) {
        self.raw.vbr = vbr as i32;
    }

    pub fn frames_per_packet(&self) -> i32 {
        self.raw.frames_per_packet
    }

    pub fn set_frames_per_packet(&mut self, frames: i32) {
        self.raw.frames_per_packet = frames;
    }

    /// Number of additional header packets following this one.
    pub fn extra_headers(&self) -> i32 {
        self.raw.extra_headers
    }

    pub fn set_extra_headers(&mut self, extra: i32) {
        self.raw.extra_headers = extra;
    }

    pub fn info(&self) -> HeaderInfo {
        HeaderInfo {
            version: self.version(),
            version_id: self.version_id(),
            rate: self.rate(),
            mode: self.mode().ok(),
            mode_bitstream_version: self.mode_bitstream_version(),
            channels: self.channels(),
            bitrate: self.bitrate(),
            frame_size: self.frame_size(),
            vbr: self.vbr(),
            frames_per_packet: self.frames_per_packet(),
            extra_headers: self.extra_headers(),
        }
    }
}

impl std::fmt::Debug for SpeexHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.info().fmt(f)
    }
}

/// Reporting view of a header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderInfo {
    pub version: String,
    pub version_id: i32,
    pub rate: i32,
    pub mode: Option<ModeId>,
    pub mode_bitstream_version: i32,
    pub channels: i32,
    pub bitrate: i32,
    pub frame_size: i32,
    pub vbr: bool,
    pub frames_per_packet: i32,
    pub extra_headers: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_header_describes_mode() {
        let header = SpeexHeader::new(8000, 1, ModeId::NarrowBand);
        assert_eq!(header.rate(), 8000);
        assert_eq!(header.channels(), 1);
        assert_eq!(header.mode(), Ok(ModeId::NarrowBand));
        assert_eq!(header.frame_size(), 160);
        assert_eq!(header.header_size(), HEADER_SIZE as i32);
        assert!(!header.version().is_empty());
    }

    #[test]
    fn packet_round_trip() {
        let mut header = SpeexHeader::new(16000, 2, ModeId::WideBand);
        header.set_vbr(true);
        header.set_frames_per_packet(3);
        header.set_bitrate(24000);

        let packet = header.to_packet();
        assert_eq!(packet.len(), 80);
        assert_eq!(&packet[..8], SpeexHeader::MAGIC);

        let parsed = SpeexHeader::from_packet(&packet).unwrap();
        assert_eq!(parsed.info(), header.info());
        assert_eq!(parsed.mode(), Ok(ModeId::WideBand));
        assert_eq!(parsed.frame_size(), 320);
    }

    #[test]
    fn rejects_short_packet() {
        let packet = SpeexHeader::new(8000, 1, ModeId::NarrowBand).to_packet();
        assert_eq!(
            SpeexHeader::from_packet(&packet[..40]).unwrap_err(),
            HeaderError::TooShort(40)
        );
    }

    #[test]
    fn rejects_bad_magic() {
        let mut packet = SpeexHeader::new(8000, 1, ModeId::NarrowBand).to_packet();
        packet[0] = b'X';
        assert_eq!(
            SpeexHeader::from_packet(&packet).unwrap_err(),
            HeaderError::BadMagic
        );
    }

    #[test]
    fn rejects_unknown_mode() {
        let mut packet = SpeexHeader::new(8000, 1, ModeId::NarrowBand).to_packet();
        packet[40..44].copy_from_slice(&7i32.to_le_bytes());
        assert_eq!(
            SpeexHeader::from_packet(&packet).unwrap_err(),
            HeaderError::InvalidMode(7)
        );
    }

    #[test]
    fn info_serializes() {
        let info = SpeexHeader::new(32000, 1, ModeId::UltraWideBand).info();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["mode"], "uwb");
        assert_eq!(json["rate"], 32000);
    }
}
