//! `speex_header.h`: the stream header.

use std::ffi::{c_char, c_int, c_void};

use super::speex::SpeexMode;
use super::types::spx_int32_t;

pub const SPEEX_HEADER_STRING_LENGTH: usize = 8;
pub const SPEEX_HEADER_VERSION_LENGTH: usize = 20;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeexHeader {
    pub speex_string: [c_char; SPEEX_HEADER_STRING_LENGTH],
    pub speex_version: [c_char; SPEEX_HEADER_VERSION_LENGTH],
    pub speex_version_id: spx_int32_t,
    pub header_size: spx_int32_t,
    pub rate: spx_int32_t,
    pub mode: spx_int32_t,
    pub mode_bitstream_version: spx_int32_t,
    pub nb_channels: spx_int32_t,
    pub bitrate: spx_int32_t,
    pub frame_size: spx_int32_t,
    pub vbr: spx_int32_t,
    pub frames_per_packet: spx_int32_t,
    pub extra_headers: spx_int32_t,
    pub reserved1: spx_int32_t,
    pub reserved2: spx_int32_t,
}

unsafe extern "C" {
    pub fn speex_init_header(
        header: *mut SpeexHeader,
        rate: c_int,
        nb_channels: c_int,
        m: *const SpeexMode,
    );
    pub fn speex_header_to_packet(header: *mut SpeexHeader, size: *mut c_int) -> *mut c_char;
    pub fn speex_packet_to_header(packet: *mut c_char, size: c_int) -> *mut SpeexHeader;
    pub fn speex_header_free(ptr: *mut c_void);
}
