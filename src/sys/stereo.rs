//! `speex_stereo.h`: intensity stereo on top of a mono stream.

use std::ffi::{c_float, c_int, c_void};

use super::bits::SpeexBits;
use super::types::spx_int16_t;

/// Public layout of the stereo state. Always allocated by the library.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeexStereoState {
    pub balance: c_float,
    pub e_ratio: c_float,
    pub smooth_left: c_float,
    pub smooth_right: c_float,
    pub reserved1: c_float,
    pub reserved2: c_float,
}

unsafe extern "C" {
    pub fn speex_stereo_state_init() -> *mut SpeexStereoState;
    pub fn speex_stereo_state_reset(stereo: *mut SpeexStereoState);
    pub fn speex_stereo_state_destroy(stereo: *mut SpeexStereoState);
    pub fn speex_encode_stereo(data: *mut c_float, frame_size: c_int, bits: *mut SpeexBits);
    pub fn speex_encode_stereo_int(
        data: *mut spx_int16_t,
        frame_size: c_int,
        bits: *mut SpeexBits,
    );
    pub fn speex_decode_stereo(
        data: *mut c_float,
        frame_size: c_int,
        stereo: *mut SpeexStereoState,
    );
    pub fn speex_decode_stereo_int(
        data: *mut spx_int16_t,
        frame_size: c_int,
        stereo: *mut SpeexStereoState,
    );
    pub fn speex_std_stereo_request_handler(
        bits: *mut SpeexBits,
        state: *mut c_void,
        data: *mut c_void,
    ) -> c_int;
}
