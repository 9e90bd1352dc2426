//! Speex decoder handles, packet loss concealment, stereo expansion and
//! the in-band hooks that let a stream reconfigure its receiver.

use std::collections::HashMap;
use std::ffi::{c_int, c_void};
use std::marker::PhantomData;

use crate::sys;

use super::bits::SpeexBits;
use super::callbacks::{
    InbandId, InbandSlot, UserSlot, callback_record, inband_trampoline, user_callback_record,
};
use super::control::{ControlFunctions, check_error, get_int, private, set_int};
use super::error::{ControlError, DecoderError, InbandError};
use super::mode::{
    CoderMode, ModeId, NbMode, NbSubmodeId, UwbMode, WbMode, WbSubmodeId,
};
use super::stereo::StereoState;

// ======================== Typed decoder ========================

/// Speex decoder for the band mode `M`.
pub struct SpeexDecoder<M: CoderMode> {
    state: *mut c_void,
    frame_size: usize,
    inband: HashMap<u8, Box<InbandSlot>>,
    user: Option<Box<UserSlot>>,
    stereo: Option<StereoState>,
    _mode: PhantomData<M>,
}

// The decoder state and the handlers it points to are only reached through &mut self
unsafe impl<M: CoderMode> Send for SpeexDecoder<M> {}

fn map_decode(ret: c_int) -> Result<(), DecoderError> {
    match ret {
        0 => Ok(()),
        -1 => Err(DecoderError::EndOfStream),
        -2 => Err(DecoderError::CorruptStream),
        other => Err(DecoderError::Unexpected(other)),
    }
}

impl<M: CoderMode> SpeexDecoder<M> {
    /// Allocates a decoder with the perceptual enhancer on.
    pub fn new() -> Result<Self, DecoderError> {
        let state = unsafe { sys::speex_decoder_init(M::MODE.get_mode()) };
        if state.is_null() {
            return Err(DecoderError::Allocation);
        }
        let mut decoder = Self {
            state,
            frame_size: 0,
            inband: HashMap::new(),
            user: None,
            stereo: None,
            _mode: PhantomData,
        };
        decoder.frame_size = decoder.get_frame_size()?;
        log::debug!(
            "Speex {} decoder ready, {} samples per frame",
            M::MODE,
            decoder.frame_size
        );
        Ok(decoder)
    }

    pub fn mode(&self) -> ModeId {
        M::MODE
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Perceptual enhancement post-filter.
    pub fn set_enhancement(&mut self, enhancement: bool) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_ENH, enhancement as i32)
    }

    pub fn get_enhancement(&mut self) -> Result<bool, ControlError> {
        Ok(get_int(self, sys::SPEEX_GET_ENH)? != 0)
    }

    // ---------- decoding ----------

    /// Decodes one frame into `out` (float samples in 16-bit range).
    pub fn decode(&mut self, bits: &mut SpeexBits<'_>, out: &mut [f32]) -> Result<(), DecoderError> {
        self.check_out(out.len(), self.frame_size)?;
        let ret = unsafe { sys::speex_decode(self.state, bits.as_mut_ptr(), out.as_mut_ptr()) };
        map_decode(ret)
    }

    /// Decodes one frame into 16-bit samples.
    pub fn decode_int(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [i16],
    ) -> Result<(), DecoderError> {
        self.check_out(out.len(), self.frame_size)?;
        let ret = unsafe { sys::speex_decode_int(self.state, bits.as_mut_ptr(), out.as_mut_ptr()) };
        map_decode(ret)
    }

    pub fn decode_to_owned(&mut self, bits: &mut SpeexBits<'_>) -> Result<Vec<f32>, DecoderError> {
        let mut out = vec![0.0; self.frame_size];
        self.decode(bits, &mut out)?;
        Ok(out)
    }

    pub fn decode_int_to_owned(
        &mut self,
        bits: &mut SpeexBits<'_>,
    ) -> Result<Vec<i16>, DecoderError> {
        let mut out = vec![0; self.frame_size];
        self.decode_int(bits, &mut out)?;
        Ok(out)
    }

    /// Fills `out` with a concealment frame for a lost packet.
    pub fn decode_lost(&mut self, out: &mut [f32]) -> Result<(), DecoderError> {
        self.check_out(out.len(), self.frame_size)?;
        let ret =
            unsafe { sys::speex_decode(self.state, std::ptr::null_mut(), out.as_mut_ptr()) };
        map_decode(ret)
    }

    pub fn decode_lost_int(&mut self, out: &mut [i16]) -> Result<(), DecoderError> {
        self.check_out(out.len(), self.frame_size)?;
        let ret =
            unsafe { sys::speex_decode_int(self.state, std::ptr::null_mut(), out.as_mut_ptr()) };
        map_decode(ret)
    }

    fn check_out(&self, got: usize, needed: usize) -> Result<(), DecoderError> {
        if got < needed {
            return Err(DecoderError::TooSmallBuffer);
        }
        Ok(())
    }

    // ---------- stereo ----------

    /// Creates a stereo state fed by the stream's in-band stereo messages.
    pub fn enable_stereo(&mut self) -> Result<(), InbandError> {
        if self.stereo.is_some() {
            return Ok(());
        }
        let mut stereo = StereoState::new()?;
        unsafe {
            self.register_native(
                InbandId::Stereo,
                Some(sys::speex_std_stereo_request_handler),
                stereo.as_mut_ptr() as *mut c_void,
            )?;
        }
        self.stereo = Some(stereo);
        Ok(())
    }

    pub fn stereo(&self) -> Option<&StereoState> {
        self.stereo.as_ref()
    }

    /// Decodes a frame and expands it to `2 * frame_size` interleaved samples.
    pub fn decode_stereo(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [f32],
    ) -> Result<(), DecoderError> {
        let frame_size = self.frame_size;
        self.check_out(out.len(), frame_size * 2)?;
        if self.stereo.is_none() {
            return Err(DecoderError::StereoDisabled);
        }
        self.decode(bits, &mut out[..frame_size])?;
        let stereo = self.stereo.as_mut().ok_or(DecoderError::StereoDisabled)?;
        stereo
            .expand(out, frame_size)
            .map_err(|_| DecoderError::TooSmallBuffer)
    }

    pub fn decode_stereo_int(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [i16],
    ) -> Result<(), DecoderError> {
        let frame_size = self.frame_size;
        self.check_out(out.len(), frame_size * 2)?;
        if self.stereo.is_none() {
            return Err(DecoderError::StereoDisabled);
        }
        self.decode_int(bits, &mut out[..frame_size])?;
        let stereo = self.stereo.as_mut().ok_or(DecoderError::StereoDisabled)?;
        stereo
            .expand_int(out, frame_size)
            .map_err(|_| DecoderError::TooSmallBuffer)
    }

    /// Concealment frame expanded with the last known stereo parameters.
    pub fn decode_lost_stereo_int(&mut self, out: &mut [i16]) -> Result<(), DecoderError> {
        let frame_size = self.frame_size;
        self.check_out(out.len(), frame_size * 2)?;
        if self.stereo.is_none() {
            return Err(DecoderError::StereoDisabled);
        }
        self.decode_lost_int(&mut out[..frame_size])?;
        let stereo = self.stereo.as_mut().ok_or(DecoderError::StereoDisabled)?;
        stereo
            .expand_int(out, frame_size)
            .map_err(|_| DecoderError::TooSmallBuffer)
    }

    // ---------- in-band hooks ----------

    /// Calls `handler` with the payload of every in-band request `id`.
    ///
    /// A panic inside `handler` is caught and the frame reports
    /// [`DecoderError::CorruptStream`].
    pub fn set_inband_callback<F>(&mut self, id: InbandId, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let mut slot = InbandSlot::new(id, Box::new(handler));
        let data = &mut *slot as *mut InbandSlot as *mut c_void;
        let mut record = callback_record(id.code() as c_int, Some(inband_trampoline), data);
        unsafe { self.ctl(sys::SPEEX_SET_HANDLER, &mut record as *mut _ as *mut c_void)? };
        // Registered first, so the library never sees a freed slot.
        self.inband.insert(id.code(), slot);
        if id == InbandId::Stereo {
            self.stereo = None;
        }
        Ok(())
    }

    /// Calls `handler` with the bytes of every user in-band message.
    pub fn set_user_handler<F>(&mut self, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let mut slot = UserSlot::new(Box::new(handler));
        let data = &mut *slot as *mut UserSlot as *mut c_void;
        let mut record = user_callback_record(data);
        unsafe { self.ctl(sys::SPEEX_SET_USER_HANDLER, &mut record as *mut _ as *mut c_void)? };
        self.user = Some(slot);
        Ok(())
    }

    /// Lets the remote side switch this decoder's enhancer on and off.
    pub fn accept_enhancement_requests(&mut self) -> Result<(), InbandError> {
        let state = self.state;
        unsafe {
            self.register_native(
                InbandId::Enhancement,
                Some(sys::speex_std_enh_request_handler),
                state,
            )
        }
    }

    /// Installs one of the library's standard handlers for `id`.
    ///
    /// # Safety
    ///
    /// `data` must stay valid for as long as the handler is registered.
    pub(crate) unsafe fn register_native(
        &mut self,
        id: InbandId,
        func: sys::speex_callback_func,
        data: *mut c_void,
    ) -> Result<(), InbandError> {
        let mut record = callback_record(id.code() as c_int, func, data);
        unsafe { self.ctl(sys::SPEEX_SET_HANDLER, &mut record as *mut _ as *mut c_void)? };
        self.inband.remove(&id.code());
        Ok(())
    }
}

impl<M: CoderMode> private::Sealed for SpeexDecoder<M> {}

impl<M: CoderMode> ControlFunctions for SpeexDecoder<M> {
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError> {
        let code = unsafe { sys::speex_decoder_ctl(self.state, request, ptr) };
        check_error(request, code)
    }
}

impl<M: CoderMode> Drop for SpeexDecoder<M> {
    fn drop(&mut self) {
        // Handler slots and the stereo state outlive the native state.
        unsafe {
            sys::speex_decoder_destroy(self.state);
        }
    }
}

impl<M: CoderMode> std::fmt::Debug for SpeexDecoder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeexDecoder")
            .field("mode", &M::MODE)
            .field("frame_size", &self.frame_size)
            .field("inband_handlers", &self.inband.len())
            .field("user_handler", &self.user.is_some())
            .field("stereo", &self.stereo)
            .finish()
    }
}

// ======================== Submode selection ========================

impl SpeexDecoder<NbMode> {
    pub fn set_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_MODE, submode as i32)
    }

    pub fn get_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_MODE)?;
        Ok(NbSubmodeId::try_from(raw).ok())
    }
}

impl SpeexDecoder<WbMode> {
    pub fn set_low_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_LOW_MODE, submode as i32)
    }

    pub fn get_low_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_LOW_MODE)?;
        Ok(NbSubmodeId::try_from(raw).ok())
    }

    pub fn set_high_submode(&mut self, submode: WbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_HIGH_MODE, submode as i32)
    }

    pub fn get_high_submode(&mut self) -> Result<Option<WbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_HIGH_MODE)?;
        Ok(WbSubmodeId::try_from(raw).ok())
    }
}

impl SpeexDecoder<UwbMode> {
    pub fn set_low_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_LOW_MODE, submode as i32)
    }

    pub fn get_low_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_LOW_MODE)?;
        Ok(NbSubmodeId::try_from(raw).ok())
    }
}

// ======================== Run-time mode choice ========================

/// A decoder whose mode is picked at run time.
#[derive(Debug)]
pub enum DynamicDecoder {
    Nb(SpeexDecoder<NbMode>),
    Wb(SpeexDecoder<WbMode>),
    Uwb(SpeexDecoder<UwbMode>),
}

macro_rules! dispatch {
    ($self:expr, $dec:ident => $body:expr) => {
        match $self {
            DynamicDecoder::Nb($dec) => $body,
            DynamicDecoder::Wb($dec) => $body,
            DynamicDecoder::Uwb($dec) => $body,
        }
    };
}

impl DynamicDecoder {
    pub fn new(mode: ModeId) -> Result<Self, DecoderError> {
        Ok(match mode {
            ModeId::NarrowBand => DynamicDecoder::Nb(SpeexDecoder::new()?),
            ModeId::WideBand => DynamicDecoder::Wb(SpeexDecoder::new()?),
            ModeId::UltraWideBand => DynamicDecoder::Uwb(SpeexDecoder::new()?),
        })
    }

    pub fn mode(&self) -> ModeId {
        dispatch!(self, dec => dec.mode())
    }

    pub fn frame_size(&self) -> usize {
        dispatch!(self, dec => dec.frame_size())
    }

    pub fn set_enhancement(&mut self, enhancement: bool) -> Result<(), ControlError> {
        dispatch!(self, dec => dec.set_enhancement(enhancement))
    }

    pub fn get_enhancement(&mut self) -> Result<bool, ControlError> {
        dispatch!(self, dec => dec.get_enhancement())
    }

    pub fn decode(&mut self, bits: &mut SpeexBits<'_>, out: &mut [f32]) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode(bits, out))
    }

    pub fn decode_int(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [i16],
    ) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_int(bits, out))
    }

    pub fn decode_to_owned(&mut self, bits: &mut SpeexBits<'_>) -> Result<Vec<f32>, DecoderError> {
        dispatch!(self, dec => dec.decode_to_owned(bits))
    }

    pub fn decode_int_to_owned(
        &mut self,
        bits: &mut SpeexBits<'_>,
    ) -> Result<Vec<i16>, DecoderError> {
        dispatch!(self, dec => dec.decode_int_to_owned(bits))
    }

    pub fn decode_lost(&mut self, out: &mut [f32]) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_lost(out))
    }

    pub fn decode_lost_int(&mut self, out: &mut [i16]) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_lost_int(out))
    }

    pub fn enable_stereo(&mut self) -> Result<(), InbandError> {
        dispatch!(self, dec => dec.enable_stereo())
    }

    pub fn decode_stereo(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [f32],
    ) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_stereo(bits, out))
    }

    pub fn decode_stereo_int(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [i16],
    ) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_stereo_int(bits, out))
    }

    pub fn decode_lost_stereo_int(&mut self, out: &mut [i16]) -> Result<(), DecoderError> {
        dispatch!(self, dec => dec.decode_lost_stereo_int(out))
    }

    pub fn set_inband_callback<F>(&mut self, id: InbandId, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        dispatch!(self, dec => dec.set_inband_callback(id, handler))
    }

    pub fn set_user_handler<F>(&mut self, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        dispatch!(self, dec => dec.set_user_handler(handler))
    }

    pub fn accept_enhancement_requests(&mut self) -> Result<(), InbandError> {
        dispatch!(self, dec => dec.accept_enhancement_requests())
    }

    pub fn into_nb(self) -> Option<SpeexDecoder<NbMode>> {
        match self {
            DynamicDecoder::Nb(dec) => Some(dec),
            _ => None,
        }
    }

    pub fn into_wb(self) -> Option<SpeexDecoder<WbMode>> {
        match self {
            DynamicDecoder::Wb(dec) => Some(dec),
            _ => None,
        }
    }

    pub fn into_uwb(self) -> Option<SpeexDecoder<UwbMode>> {
        match self {
            DynamicDecoder::Uwb(dec) => Some(dec),
            _ => None,
        }
    }
}

impl private::Sealed for DynamicDecoder {}

impl ControlFunctions for DynamicDecoder {
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError> {
        dispatch!(self, dec => unsafe { dec.ctl(request, ptr) })
    }
}
