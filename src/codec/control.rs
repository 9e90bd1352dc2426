//! The control requests shared by encoders and decoders.

use std::ffi::{c_float, c_int, c_void};

use crate::sys;

use super::error::ControlError;

pub(crate) mod private {
    pub trait Sealed {}
}

/// Maps a native control return code to a result.
pub(crate) fn check_error(request: c_int, code: c_int) -> Result<(), ControlError> {
    match code {
        0 => Ok(()),
        -1 => Err(ControlError::UnknownRequest(request)),
        -2 => Err(ControlError::InvalidParameter(request)),
        code => Err(ControlError::Unexpected { request, code }),
    }
}

// Raw int/float requests. Crate-private: the request code decides how much
// the library reads or writes through the pointer, so only typed wrappers
// may pick it.

pub(crate) fn get_int<C: ControlFunctions + ?Sized>(
    coder: &mut C,
    request: c_int,
) -> Result<i32, ControlError> {
    let mut value: c_int = 0;
    unsafe { coder.ctl(request, &mut value as *mut c_int as *mut c_void)? };
    Ok(value)
}

pub(crate) fn set_int<C: ControlFunctions + ?Sized>(
    coder: &mut C,
    request: c_int,
    value: i32,
) -> Result<(), ControlError> {
    let mut value: c_int = value;
    unsafe { coder.ctl(request, &mut value as *mut c_int as *mut c_void) }
}

pub(crate) fn get_float<C: ControlFunctions + ?Sized>(
    coder: &mut C,
    request: c_int,
) -> Result<f32, ControlError> {
    let mut value: c_float = 0.0;
    unsafe { coder.ctl(request, &mut value as *mut c_float as *mut c_void)? };
    Ok(value)
}

pub(crate) fn set_float<C: ControlFunctions + ?Sized>(
    coder: &mut C,
    request: c_int,
    value: f32,
) -> Result<(), ControlError> {
    let mut value: c_float = value;
    unsafe { coder.ctl(request, &mut value as *mut c_float as *mut c_void) }
}

/// Control functions common to the encoder and decoder.
///
/// `ctl` is the only required method; every other method is a typed request
/// built on it. Not every request is meaningful on both sides: the library
/// answers unsupported ones with [`ControlError::UnknownRequest`].
///
/// This trait is sealed and cannot be implemented outside this crate. Raw
/// requests go through the `unsafe` [`ctl`](ControlFunctions::ctl) only:
///
/// ```compile_fail
/// use speex_rs::codec::{ControlFunctions, NbMode, SpeexDecoder};
///
/// let mut decoder = SpeexDecoder::<NbMode>::new().unwrap();
/// decoder.set_int(20, 0).unwrap();
/// ```
pub trait ControlFunctions: private::Sealed {
    /// Sends a raw request to the underlying state.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a value of the type the library expects for
    /// `request` (usually a 32-bit int, sometimes a float or a callback
    /// struct), valid for reads and writes for the duration of the call.
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError>;

    /// Frame size in samples.
    fn get_frame_size(&mut self) -> Result<usize, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_FRAME_SIZE)?.max(0) as usize)
    }

    /// Enables or disables variable bit-rate.
    fn set_vbr(&mut self, vbr: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_VBR, vbr as i32)
    }

    fn get_vbr(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_VBR)? != 0)
    }

    /// VBR quality, 0.0 to 10.0.
    fn set_vbr_quality(&mut self, quality: f32) -> Result<(), ControlError> {
        set_float(self, sys::SPEEX_SET_VBR_QUALITY, quality)
    }

    fn get_vbr_quality(&mut self) -> Result<f32, ControlError> {
        get_float(self, sys::SPEEX_GET_VBR_QUALITY)
    }

    /// Enables or disables voice activity detection.
    fn set_vad(&mut self, vad: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_VAD, vad as i32)
    }

    fn get_vad(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_VAD)? != 0)
    }

    /// Enables or disables discontinuous transmission.
    fn set_dtx(&mut self, dtx: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_DTX, dtx as i32)
    }

    fn get_dtx(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_DTX)? != 0)
    }

    /// Average bit-rate target in bits per second. Turns VBR on.
    fn set_abr(&mut self, abr: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_ABR, abr)
    }

    fn get_abr(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_ABR)
    }

    /// Overall quality, 0 to 10. Default is 8.
    fn set_quality(&mut self, quality: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_QUALITY, quality)
    }

    /// Picks the highest submode whose bit-rate does not exceed `bitrate`.
    fn set_bitrate(&mut self, bitrate: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_BITRATE, bitrate)
    }

    /// Bit-rate of the current submode in bits per second.
    fn get_bitrate(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_BITRATE)
    }

    /// Sampling rate used for bit-rate computation.
    fn set_sampling_rate(&mut self, sampling_rate: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_SAMPLING_RATE, sampling_rate)
    }

    fn get_sampling_rate(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_SAMPLING_RATE)
    }

    /// Resets the codec memories to zero.
    fn reset_state(&mut self) -> Result<(), ControlError> {
        unsafe { self.ctl(sys::SPEEX_RESET_STATE, std::ptr::null_mut()) }
    }

    /// Whether the submode is encoded in each frame. Turning it off breaks
    /// compatibility with standard decoders.
    fn set_submode_encoding(&mut self, submode: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_SUBMODE_ENCODING, submode as i32)
    }

    fn get_submode_encoding(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_SUBMODE_ENCODING)? != 0)
    }

    /// Lookahead in samples. Encoder and decoder lookahead add up to the
    /// total algorithmic delay.
    fn get_lookahead(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_LOOKAHEAD)
    }

    /// Expected packet loss percentage, used to tune loss robustness.
    fn set_plc_tuning(&mut self, tuning: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_PLC_TUNING, tuning)
    }

    fn get_plc_tuning(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_PLC_TUNING)
    }

    /// Upper bound on the bit-rate in VBR mode.
    fn set_vbr_max_bitrate(&mut self, max_bitrate: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_VBR_MAX_BITRATE, max_bitrate)
    }

    fn get_vbr_max_bitrate(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_VBR_MAX_BITRATE)
    }

    /// High-pass filtering of the input/output.
    fn set_highpass(&mut self, highpass: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_HIGHPASS, highpass as i32)
    }

    fn get_highpass(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_HIGHPASS)? != 0)
    }

    /// Quality of the last encoded frame relative to the VBR target.
    fn get_relative_quality(&mut self) -> Result<f32, ControlError> {
        get_float(self, sys::SPEEX_GET_RELATIVE_QUALITY)
    }

    /// Speech activity of the last frame, 0 to 100.
    fn get_activity(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_ACTIVITY)
    }
}
