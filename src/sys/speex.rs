//! `speex.h`: modes, codec lifecycle, encode/decode and control requests.

use std::ffi::{c_char, c_float, c_int, c_void};

use super::bits::SpeexBits;
use super::types::spx_int16_t;

// Encoder/decoder control requests
pub const SPEEX_SET_ENH: c_int = 0;
pub const SPEEX_GET_ENH: c_int = 1;
pub const SPEEX_GET_FRAME_SIZE: c_int = 3;
pub const SPEEX_SET_QUALITY: c_int = 4;
pub const SPEEX_SET_MODE: c_int = 6;
pub const SPEEX_GET_MODE: c_int = 7;
pub const SPEEX_SET_LOW_MODE: c_int = 8;
pub const SPEEX_GET_LOW_MODE: c_int = 9;
pub const SPEEX_SET_HIGH_MODE: c_int = 10;
pub const SPEEX_GET_HIGH_MODE: c_int = 11;
pub const SPEEX_SET_VBR: c_int = 12;
pub const SPEEX_GET_VBR: c_int = 13;
pub const SPEEX_SET_VBR_QUALITY: c_int = 14;
pub const SPEEX_GET_VBR_QUALITY: c_int = 15;
pub const SPEEX_SET_COMPLEXITY: c_int = 16;
pub const SPEEX_GET_COMPLEXITY: c_int = 17;
pub const SPEEX_SET_BITRATE: c_int = 18;
pub const SPEEX_GET_BITRATE: c_int = 19;
pub const SPEEX_SET_HANDLER: c_int = 20;
pub const SPEEX_SET_USER_HANDLER: c_int = 22;
pub const SPEEX_SET_SAMPLING_RATE: c_int = 24;
pub const SPEEX_GET_SAMPLING_RATE: c_int = 25;
pub const SPEEX_RESET_STATE: c_int = 26;
pub const SPEEX_GET_RELATIVE_QUALITY: c_int = 29;
pub const SPEEX_SET_VAD: c_int = 30;
pub const SPEEX_GET_VAD: c_int = 31;
pub const SPEEX_SET_ABR: c_int = 32;
pub const SPEEX_GET_ABR: c_int = 33;
pub const SPEEX_SET_DTX: c_int = 34;
pub const SPEEX_GET_DTX: c_int = 35;
pub const SPEEX_SET_SUBMODE_ENCODING: c_int = 36;
pub const SPEEX_GET_SUBMODE_ENCODING: c_int = 37;
pub const SPEEX_GET_LOOKAHEAD: c_int = 39;
pub const SPEEX_SET_PLC_TUNING: c_int = 40;
pub const SPEEX_GET_PLC_TUNING: c_int = 41;
pub const SPEEX_SET_VBR_MAX_BITRATE: c_int = 42;
pub const SPEEX_GET_VBR_MAX_BITRATE: c_int = 43;
pub const SPEEX_SET_HIGHPASS: c_int = 44;
pub const SPEEX_GET_HIGHPASS: c_int = 45;
pub const SPEEX_GET_ACTIVITY: c_int = 47;

// Preserved for backward compatibility
pub const SPEEX_SET_PF: c_int = 0;
pub const SPEEX_GET_PF: c_int = 1;

// Mode queries
pub const SPEEX_MODE_FRAME_SIZE: c_int = 0;
pub const SPEEX_SUBMODE_BITS_PER_FRAME: c_int = 1;

// Library queries
pub const SPEEX_LIB_GET_MAJOR_VERSION: c_int = 1;
pub const SPEEX_LIB_GET_MINOR_VERSION: c_int = 3;
pub const SPEEX_LIB_GET_MICRO_VERSION: c_int = 5;
pub const SPEEX_LIB_GET_EXTRA_VERSION: c_int = 7;
pub const SPEEX_LIB_GET_VERSION_STRING: c_int = 9;

pub const SPEEX_MODEID_NB: c_int = 0;
pub const SPEEX_MODEID_WB: c_int = 1;
pub const SPEEX_MODEID_UWB: c_int = 2;
pub const SPEEX_NB_MODES: c_int = 3;

/// Static description of a codec mode. The function-pointer members are
/// only ever called by the library, so they are kept opaque here.
#[repr(C)]
#[derive(Debug)]
pub struct SpeexMode {
    pub mode: *const c_void,
    pub query: *const c_void,
    pub modeName: *const c_char,
    pub modeID: c_int,
    pub bitstream_version: c_int,
    pub enc_init: *const c_void,
    pub enc_destroy: *const c_void,
    pub enc: *const c_void,
    pub dec_init: *const c_void,
    pub dec_destroy: *const c_void,
    pub dec: *const c_void,
    pub enc_ctl: *const c_void,
    pub dec_ctl: *const c_void,
}

// Modes are immutable constants inside the library.
unsafe impl Sync for SpeexMode {}

unsafe extern "C" {
    pub fn speex_encoder_init(mode: *const SpeexMode) -> *mut c_void;
    pub fn speex_encoder_destroy(state: *mut c_void);
    pub fn speex_encode(state: *mut c_void, input: *mut c_float, bits: *mut SpeexBits) -> c_int;
    pub fn speex_encode_int(
        state: *mut c_void,
        input: *mut spx_int16_t,
        bits: *mut SpeexBits,
    ) -> c_int;
    pub fn speex_encoder_ctl(state: *mut c_void, request: c_int, ptr: *mut c_void) -> c_int;

    pub fn speex_decoder_init(mode: *const SpeexMode) -> *mut c_void;
    pub fn speex_decoder_destroy(state: *mut c_void);
    pub fn speex_decode(state: *mut c_void, bits: *mut SpeexBits, out: *mut c_float) -> c_int;
    pub fn speex_decode_int(
        state: *mut c_void,
        bits: *mut SpeexBits,
        out: *mut spx_int16_t,
    ) -> c_int;
    pub fn speex_decoder_ctl(state: *mut c_void, request: c_int, ptr: *mut c_void) -> c_int;

    pub fn speex_mode_query(mode: *const SpeexMode, request: c_int, ptr: *mut c_void) -> c_int;
    pub fn speex_lib_ctl(request: c_int, ptr: *mut c_void) -> c_int;
    pub fn speex_lib_get_mode(mode: c_int) -> *const SpeexMode;
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;
    use std::mem::size_of;
    use std::ptr::null;

    use super::*;
    use crate::sys::{SpeexHeader, SpeexStereoState};

    #[test]
    fn header_layout_matches_packet_size() {
        assert_eq!(size_of::<SpeexHeader>(), 80);
        assert_eq!(size_of::<SpeexStereoState>(), 24);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn bits_layout_on_64_bit() {
        assert_eq!(size_of::<SpeexBits>(), 48);
    }

    #[test]
    fn linked_correctly() {
        let mut char_ptr: *const c_char = null();
        let ret = unsafe {
            speex_lib_ctl(
                SPEEX_LIB_GET_VERSION_STRING,
                &mut char_ptr as *mut *const c_char as *mut c_void,
            )
        };
        assert_eq!(ret, 0);
        assert!(!char_ptr.is_null());
        let version = unsafe { CStr::from_ptr(char_ptr) };
        assert!(!version.to_bytes().is_empty());
    }

    #[test]
    fn every_mode_id_resolves() {
        for id in 0..SPEEX_NB_MODES {
            let mode = unsafe { speex_lib_get_mode(id) };
            assert!(!mode.is_null());
            assert_eq!(unsafe { (*mode).modeID }, id);
        }
    }
}
