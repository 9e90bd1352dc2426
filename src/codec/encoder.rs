//! Speex encoder handles, one type per band mode.

use std::ffi::{c_int, c_void};
use std::marker::PhantomData;

use crate::sys;

use super::bits::SpeexBits;
use super::control::{ControlFunctions, check_error, get_int, private, set_int};
use super::error::{ControlError, EncodeError};
use super::mode::{
    CoderMode, ModeId, NbMode, NbSubmodeId, UwbMode, WbMode, WbSubmodeId,
};

// ======================== Typed encoder ========================

/// Speex encoder for the band mode `M`.
pub struct SpeexEncoder<M: CoderMode> {
    state: *mut c_void,
    frame_size: usize,
    max_frame_bits: u32,
    _mode: PhantomData<M>,
}

// The encoder state is only touched through &mut self
unsafe impl<M: CoderMode> Send for SpeexEncoder<M> {}

impl<M: CoderMode> SpeexEncoder<M> {
    /// Allocates an encoder with the library defaults (quality 8,
    /// complexity 2, CBR).
    pub fn new() -> Result<Self, EncodeError> {
        let state = unsafe { sys::speex_encoder_init(M::MODE.get_mode()) };
        if state.is_null() {
            return Err(EncodeError::Allocation);
        }
        let mut encoder = Self {
            state,
            frame_size: 0,
            max_frame_bits: M::MODE.max_frame_bits(),
            _mode: PhantomData,
        };
        encoder.frame_size = encoder.get_frame_size()?;
        log::debug!(
            "Speex {} encoder ready, {} samples per frame",
            M::MODE,
            encoder.frame_size
        );
        Ok(encoder)
    }

    pub fn mode(&self) -> ModeId {
        M::MODE
    }

    /// Samples per frame, cached at construction.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Encoder complexity, 1 to 10. Higher values cost more CPU.
    pub fn set_complexity(&mut self, complexity: i32) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_COMPLEXITY, complexity)
    }

    pub fn get_complexity(&mut self) -> Result<i32, ControlError> {
        get_int(self, sys::SPEEX_GET_COMPLEXITY)
    }

    /// Encodes one frame of float samples (16-bit range) into `bits`.
    ///
    /// The input is used as scratch space by the library. Returns `false`
    /// when DTX decided the frame need not be transmitted. A borrowed
    /// `bits` must have room for the largest frame of the mode.
    pub fn encode(
        &mut self,
        input: &mut [f32],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        self.check_frame(input.len())?;
        self.check_room(bits)?;
        let ret = unsafe { sys::speex_encode(self.state, input.as_mut_ptr(), bits.as_mut_ptr()) };
        Ok(ret != 0)
    }

    /// Encodes one frame of 16-bit samples into `bits`.
    pub fn encode_int(
        &mut self,
        input: &mut [i16],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        self.check_frame(input.len())?;
        self.check_room(bits)?;
        let ret =
            unsafe { sys::speex_encode_int(self.state, input.as_mut_ptr(), bits.as_mut_ptr()) };
        Ok(ret != 0)
    }

    fn check_frame(&self, got: usize) -> Result<(), EncodeError> {
        if got < self.frame_size {
            return Err(EncodeError::FrameSize {
                needed: self.frame_size,
                got,
            });
        }
        Ok(())
    }

    // The library silently drops whatever does not fit a borrowed buffer.
    fn check_room(&self, bits: &SpeexBits<'_>) -> Result<(), EncodeError> {
        if bits.capacity().is_some() {
            bits.check_writable(self.max_frame_bits)?;
        }
        Ok(())
    }

    /// Raw state pointer, for the standard in-band handlers.
    pub(crate) fn state_ptr(&mut self) -> *mut c_void {
        self.state
    }
}

impl<M: CoderMode> private::Sealed for SpeexEncoder<M> {}

impl<M: CoderMode> ControlFunctions for SpeexEncoder<M> {
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError> {
        let code = unsafe { sys::speex_encoder_ctl(self.state, request, ptr) };
        check_error(request, code)
    }
}

impl<M: CoderMode> Drop for SpeexEncoder<M> {
    fn drop(&mut self) {
        unsafe {
            sys::speex_encoder_destroy(self.state);
        }
    }
}

impl<M: CoderMode> std::fmt::Debug for SpeexEncoder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeexEncoder")
            .field("mode", &M::MODE)
            .field("frame_size", &self.frame_size)
            .finish()
    }
}

// ======================== Submode selection ========================

impl SpeexEncoder<NbMode> {
    pub fn set_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_MODE, submode as i32)
    }

    /// Submode in use. `Ok(None)` is the 0 bit-rate submode selected by DTX.
    pub fn get_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_MODE)?;
        Ok(NbSubmodeId::try_from(raw).ok())
    }
}

impl SpeexEncoder<WbMode> {
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

    /// Not every library build answers this request; those report
    /// [`ControlError::UnknownRequest`].
    pub fn get_high_submode(&mut self) -> Result<Option<WbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_HIGH_MODE)?;
        Ok(WbSubmodeId::try_from(raw).ok())
    }
}

impl SpeexEncoder<UwbMode> {
    pub fn set_low_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        set_int(self, sys::SPEEX_SET_LOW_MODE, submode as i32)
    }

    pub fn get_low_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        let raw = get_int(self, sys::SPEEX_GET_LOW_MODE)?;
        Ok(NbSubmodeId::try_from(raw).ok())
    }
}

// ======================== Run-time mode choice ========================

/// An encoder whose mode is picked at run time.
#[derive(Debug)]
pub enum DynamicEncoder {
    Nb(SpeexEncoder<NbMode>),
    Wb(SpeexEncoder<WbMode>),
    Uwb(SpeexEncoder<UwbMode>),
}

macro_rules! dispatch {
    ($self:expr, $enc:ident => $body:expr) => {
        match $self {
            DynamicEncoder::Nb($enc) => $body,
            DynamicEncoder::Wb($enc) => $body,
            DynamicEncoder::Uwb($enc) => $body,
        }
    };
}

impl DynamicEncoder {
    pub fn new(mode: ModeId) -> Result<Self, EncodeError> {
        Ok(match mode {
            ModeId::NarrowBand => DynamicEncoder::Nb(SpeexEncoder::new()?),
            ModeId::WideBand => DynamicEncoder::Wb(SpeexEncoder::new()?),
            ModeId::UltraWideBand => DynamicEncoder::Uwb(SpeexEncoder::new()?),
        })
    }

    pub fn mode(&self) -> ModeId {
        dispatch!(self, enc => enc.mode())
    }

    pub fn frame_size(&self) -> usize {
        dispatch!(self, enc => enc.frame_size())
    }

    pub fn set_complexity(&mut self, complexity: i32) -> Result<(), ControlError> {
        dispatch!(self, enc => enc.set_complexity(complexity))
    }

    pub fn get_complexity(&mut self) -> Result<i32, ControlError> {
        dispatch!(self, enc => enc.get_complexity())
    }

    pub fn encode(
        &mut self,
        input: &mut [f32],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        dispatch!(self, enc => enc.encode(input, bits))
    }

    pub fn encode_int(
        &mut self,
        input: &mut [i16],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        dispatch!(self, enc => enc.encode_int(input, bits))
    }

    pub fn into_nb(self) -> Option<SpeexEncoder<NbMode>> {
        match self {
            DynamicEncoder::Nb(enc) => Some(enc),
            _ => None,
        }
    }

    pub fn into_wb(self) -> Option<SpeexEncoder<WbMode>> {
        match self {
            DynamicEncoder::Wb(enc) => Some(enc),
            _ => None,
        }
    }

    pub fn into_uwb(self) -> Option<SpeexEncoder<UwbMode>> {
        match self {
            DynamicEncoder::Uwb(enc) => Some(enc),
            _ => None,
        }
    }
}

impl private::Sealed for DynamicEncoder {}

impl ControlFunctions for DynamicEncoder {
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError> {
        dispatch!(self, enc => unsafe { enc.ctl(request, ptr) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::error::BitsError;

    #[test]
    fn creates_each_mode() {
        assert_eq!(SpeexEncoder::<NbMode>::new().unwrap().frame_size(), 160);
        assert_eq!(SpeexEncoder::<WbMode>::new().unwrap().frame_size(), 320);
        assert_eq!(SpeexEncoder::<UwbMode>::new().unwrap().frame_size(), 640);
    }

    #[test]
    fn bitrate_round_trip() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        enc.set_bitrate(8000).unwrap();
        assert_eq!(enc.get_bitrate().unwrap(), 8000);
    }

    #[test]
    fn quality_selects_submode() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        enc.set_quality(8).unwrap();
        assert_eq!(enc.get_bitrate().unwrap(), 15000);
        assert_eq!(enc.get_submode().unwrap(), Some(NbSubmodeId::High));
    }

    #[test]
    fn default_sampling_rate() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        assert_eq!(enc.get_sampling_rate().unwrap(), 8000);
        let mut enc = SpeexEncoder::<WbMode>::new().unwrap();
        assert_eq!(enc.get_sampling_rate().unwrap(), 16000);
    }

    #[test]
    fn control_round_trips() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        enc.set_vbr(true).unwrap();
        assert!(enc.get_vbr().unwrap());
        enc.set_vbr_quality(8.0).unwrap();
        assert_eq!(enc.get_vbr_quality().unwrap(), 8.0);
        enc.set_vad(true).unwrap();
        assert!(enc.get_vad().unwrap());
        enc.set_abr(2000).unwrap();
        assert_eq!(enc.get_abr().unwrap(), 2000);
        enc.set_complexity(4).unwrap();
        assert_eq!(enc.get_complexity().unwrap(), 4);
    }

    #[test]
    fn submode_setters() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        enc.set_submode(NbSubmodeId::Low).unwrap();
        assert_eq!(enc.get_submode().unwrap(), Some(NbSubmodeId::Low));

        let mut enc = SpeexEncoder::<WbMode>::new().unwrap();
        enc.set_low_submode(NbSubmodeId::Medium).unwrap();
        enc.set_high_submode(WbSubmodeId::QuantizedLow).unwrap();
        assert_eq!(enc.get_low_submode().unwrap(), Some(NbSubmodeId::Medium));
    }

    #[test]
    fn short_frame_is_rejected() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        let mut bits = SpeexBits::new();
        let mut input = vec![0i16; 100];
        assert_eq!(
            enc.encode_int(&mut input, &mut bits),
            Err(EncodeError::FrameSize {
                needed: 160,
                got: 100
            })
        );
        assert!(bits.is_empty());
    }

    #[test]
    fn encodes_a_frame() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        enc.set_submode(NbSubmodeId::Low).unwrap();
        let mut bits = SpeexBits::new();
        let mut input: Vec<f32> = (0..160)
            .map(|i| (i as f32 * 0.1).sin() * 8000.0)
            .collect();
        assert!(enc.encode(&mut input, &mut bits).unwrap());
        let budget = ModeId::NarrowBand.submode_bits_per_frame(3).unwrap() as usize;
        assert!(bits.len_bits() > 0 && bits.len_bits() <= budget);
    }

    #[test]
    fn borrowed_bits_need_room_for_a_frame() {
        let mut enc = SpeexEncoder::<NbMode>::new().unwrap();
        let mut input = vec![0i16; 160];

        let mut small = [0u8; 16];
        let mut bits = SpeexBits::for_writing(&mut small).unwrap();
        assert!(matches!(
            enc.encode_int(&mut input, &mut bits),
            Err(EncodeError::Bits(BitsError::BufferFull { .. }))
        ));
        assert!(bits.is_empty());

        let mut large = [0u8; 128];
        let mut bits = SpeexBits::for_writing(&mut large).unwrap();
        assert!(enc.encode_int(&mut input, &mut bits).unwrap());
        assert!(!bits.is_empty());
    }

    #[test]
    fn dynamic_encoder_forwards() {
        let mut enc = DynamicEncoder::new(ModeId::WideBand).unwrap();
        assert_eq!(enc.mode(), ModeId::WideBand);
        assert_eq!(enc.frame_size(), 320);
        enc.set_quality(4).unwrap();
        enc.set_complexity(3).unwrap();
        assert_eq!(enc.get_complexity().unwrap(), 3);
        assert!(enc.into_wb().is_some());

        let enc = DynamicEncoder::new(ModeId::NarrowBand).unwrap();
        assert!(enc.into_uwb().is_none());
    }
}
