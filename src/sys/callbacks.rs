//! `speex_callbacks.h`: in-band request dispatch.

use std::ffi::{c_int, c_void};

use super::bits::SpeexBits;

pub const SPEEX_MAX_CALLBACKS: usize = 16;

pub const SPEEX_INBAND_ENH_REQUEST: c_int = 0;
pub const SPEEX_INBAND_RESERVED1: c_int = 1;
pub const SPEEX_INBAND_MODE_REQUEST: c_int = 2;
pub const SPEEX_INBAND_LOW_MODE_REQUEST: c_int = 3;
pub const SPEEX_INBAND_HIGH_MODE_REQUEST: c_int = 4;
pub const SPEEX_INBAND_VBR_QUALITY_REQUEST: c_int = 5;
pub const SPEEX_INBAND_ACKNOWLEDGE_REQUEST: c_int = 6;
pub const SPEEX_INBAND_VBR_REQUEST: c_int = 7;
pub const SPEEX_INBAND_CHAR: c_int = 8;
pub const SPEEX_INBAND_STEREO: c_int = 9;
pub const SPEEX_INBAND_MAX_BITRATE: c_int = 10;
pub const SPEEX_INBAND_ACKNOWLEDGE: c_int = 12;

pub type speex_callback_func =
    Option<unsafe extern "C" fn(bits: *mut SpeexBits, state: *mut c_void, data: *mut c_void) -> c_int>;

/// Handler registration passed to `SPEEX_SET_HANDLER` / `SPEEX_SET_USER_HANDLER`.
/// The decoder copies it, so it may live on the stack.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeexCallback {
    pub callback_id: c_int,
    pub func: speex_callback_func,
    pub data: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: c_int,
}

unsafe extern "C" {
    pub fn speex_inband_handler(
        bits: *mut SpeexBits,
        callback_list: *mut SpeexCallback,
        state: *mut c_void,
    ) -> c_int;
    pub fn speex_std_mode_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_high_mode_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_char_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_default_user_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_low_mode_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_vbr_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_enh_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
    pub fn speex_std_vbr_quality_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
}
