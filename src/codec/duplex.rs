//! An encoder/decoder pair for one end of a two-way call.

use std::ffi::{c_int, c_void};

use crate::sys;

use super::bits::SpeexBits;
use super::callbacks::InbandId;
use super::control::{ControlFunctions, private};
use super::decoder::SpeexDecoder;
use super::encoder::SpeexEncoder;
use super::error::{ControlError, DecoderError, EncodeError, Error, InbandError};
use super::mode::{CoderMode, ModeId, NbMode, NbSubmodeId, UwbMode, WbMode, WbSubmodeId};

/// Local encoder plus the decoder for the remote stream. Requests arriving
/// on the decoder can reconfigure the encoder.
///
/// Once requests are accepted the decoder holds the encoder's state, so
/// neither half is ever lent out mutably; operations are forwarded instead.
/// [`ControlFunctions`] on the pair targets the encoder.
pub struct SpeexDuplex<M: CoderMode> {
    // Dropped before the encoder its handlers point at.
    decoder: SpeexDecoder<M>,
    encoder: SpeexEncoder<M>,
}

impl<M: CoderMode> SpeexDuplex<M> {
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            decoder: SpeexDecoder::new()?,
            encoder: SpeexEncoder::new()?,
        })
    }

    pub fn mode(&self) -> ModeId {
        M::MODE
    }

    pub fn frame_size(&self) -> usize {
        self.encoder.frame_size()
    }

    pub fn encoder(&self) -> &SpeexEncoder<M> {
        &self.encoder
    }

    pub fn decoder(&self) -> &SpeexDecoder<M> {
        &self.decoder
    }

    // ---------- local side ----------

    pub fn set_complexity(&mut self, complexity: i32) -> Result<(), ControlError> {
        self.encoder.set_complexity(complexity)
    }

    pub fn get_complexity(&mut self) -> Result<i32, ControlError> {
        self.encoder.get_complexity()
    }

    pub fn encode(
        &mut self,
        input: &mut [f32],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        self.encoder.encode(input, bits)
    }

    pub fn encode_int(
        &mut self,
        input: &mut [i16],
        bits: &mut SpeexBits<'_>,
    ) -> Result<bool, EncodeError> {
        self.encoder.encode_int(input, bits)
    }

    // ---------- remote side ----------

    pub fn decode(&mut self, bits: &mut SpeexBits<'_>, out: &mut [f32]) -> Result<(), DecoderError> {
        self.decoder.decode(bits, out)
    }

    pub fn decode_int(
        &mut self,
        bits: &mut SpeexBits<'_>,
        out: &mut [i16],
    ) -> Result<(), DecoderError> {
        self.decoder.decode_int(bits, out)
    }

    pub fn decode_to_owned(&mut self, bits: &mut SpeexBits<'_>) -> Result<Vec<f32>, DecoderError> {
        self.decoder.decode_to_owned(bits)
    }

    pub fn decode_int_to_owned(
        &mut self,
        bits: &mut SpeexBits<'_>,
    ) -> Result<Vec<i16>, DecoderError> {
        self.decoder.decode_int_to_owned(bits)
    }

    pub fn decode_lost(&mut self, out: &mut [f32]) -> Result<(), DecoderError> {
        self.decoder.decode_lost(out)
    }

    pub fn decode_lost_int(&mut self, out: &mut [i16]) -> Result<(), DecoderError> {
        self.decoder.decode_lost_int(out)
    }

    pub fn set_enhancement(&mut self, enhancement: bool) -> Result<(), ControlError> {
        self.decoder.set_enhancement(enhancement)
    }

    pub fn get_enhancement(&mut self) -> Result<bool, ControlError> {
        self.decoder.get_enhancement()
    }

    /// Handles request `id` with a closure. Replaces a standard handler
    /// installed by [`accept_remote_requests`](Self::accept_remote_requests).
    pub fn set_inband_callback<F>(&mut self, id: InbandId, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.decoder.set_inband_callback(id, handler)
    }

    pub fn set_user_handler<F>(&mut self, handler: F) -> Result<(), InbandError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        self.decoder.set_user_handler(handler)
    }

    /// Registers the standard mode, low-mode, high-mode, VBR and VBR-quality
    /// handlers, applied to the local encoder.
    pub fn accept_remote_requests(&mut self) -> Result<(), InbandError> {
        let target = self.encoder.state_ptr();
        let handlers: [(InbandId, sys::speex_callback_func); 5] = [
            (InbandId::Mode, Some(sys::speex_std_mode_request_handler)),
            (InbandId::LowMode, Some(sys::speex_std_low_mode_request_handler)),
            (InbandId::HighMode, Some(sys::speex_std_high_mode_request_handler)),
            (InbandId::Vbr, Some(sys::speex_std_vbr_request_handler)),
            (
                InbandId::VbrQuality,
                Some(sys::speex_std_vbr_quality_request_handler),
            ),
        ];
        for (id, func) in handlers {
            // The encoder is never moved out or replaced and outlives the
            // decoder, see field order.
            unsafe {
                self.decoder
                    .register_native(id, func, target as *mut c_void)?
            };
        }
        log::debug!("Duplex {} accepts remote encoder requests", self.encoder.mode());
        Ok(())
    }
}

impl<M: CoderMode> private::Sealed for SpeexDuplex<M> {}

impl<M: CoderMode> ControlFunctions for SpeexDuplex<M> {
    unsafe fn ctl(&mut self, request: c_int, ptr: *mut c_void) -> Result<(), ControlError> {
        unsafe { self.encoder.ctl(request, ptr) }
    }
}

impl<M: CoderMode> std::fmt::Debug for SpeexDuplex<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeexDuplex")
            .field("encoder", &self.encoder)
            .field("decoder", &self.decoder)
            .finish()
    }
}

// ======================== Submode selection ========================

impl SpeexDuplex<NbMode> {
    pub fn set_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        self.encoder.set_submode(submode)
    }

    pub fn get_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        self.encoder.get_submode()
    }
}

impl SpeexDuplex<WbMode> {
    pub fn set_low_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        self.encoder.set_low_submode(submode)
    }

    pub fn get_low_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        self.encoder.get_low_submode()
    }

    pub fn set_high_submode(&mut self, submode: WbSubmodeId) -> Result<(), ControlError> {
        self.encoder.set_high_submode(submode)
    }

    pub fn get_high_submode(&mut self) -> Result<Option<WbSubmodeId>, ControlError> {
        self.encoder.get_high_submode()
    }
}

impl SpeexDuplex<UwbMode> {
    pub fn set_low_submode(&mut self, submode: NbSubmodeId) -> Result<(), ControlError> {
        self.encoder.set_low_submode(submode)
    }

    pub fn get_low_submode(&mut self) -> Result<Option<NbSubmodeId>, ControlError> {
        self.encoder.get_low_submode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bits::SpeexBits;
    use crate::codec::callbacks::InbandRequest;
    use crate::codec::mode::WbMode;

    fn remote_packet(requests: &[InbandRequest]) -> Vec<u8> {
        let mut remote = SpeexEncoder::<NbMode>::new().unwrap();
        let mut bits = SpeexBits::new();
        for request in requests {
            request.write(&mut bits).unwrap();
        }
        let mut pcm = vec![0i16; 160];
        remote.encode_int(&mut pcm, &mut bits).unwrap();
        bits.to_vec()
    }

    #[test]
    fn remote_requests_reconfigure_encoder() {
        let mut duplex = SpeexDuplex::<NbMode>::new().unwrap();
        duplex.accept_remote_requests().unwrap();
        assert!(!duplex.get_vbr().unwrap());

        let packet = remote_packet(&[
            InbandRequest::Mode(NbSubmodeId::Low as u8),
            InbandRequest::Vbr(true),
            InbandRequest::VbrQuality(4),
        ]);
        let mut bits = SpeexBits::from_bytes(&packet);
        duplex.decode_int_to_owned(&mut bits).unwrap();

        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::Low));
        assert!(duplex.get_vbr().unwrap());
        assert_eq!(duplex.get_vbr_quality().unwrap(), 4.0);
    }

    #[test]
    fn requests_are_ignored_until_accepted() {
        let mut duplex = SpeexDuplex::<NbMode>::new().unwrap();
        duplex.set_submode(NbSubmodeId::High).unwrap();

        let packet = remote_packet(&[InbandRequest::Mode(NbSubmodeId::Low as u8)]);
        let mut bits = SpeexBits::from_bytes(&packet);
        duplex.decode_int_to_owned(&mut bits).unwrap();

        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::High));
    }

    #[test]
    fn encoder_stays_configurable_after_accepting_requests() {
        let mut duplex = SpeexDuplex::<NbMode>::new().unwrap();
        duplex.accept_remote_requests().unwrap();

        duplex.set_quality(4).unwrap();
        duplex.set_complexity(5).unwrap();
        assert_eq!(duplex.get_complexity().unwrap(), 5);
        duplex.set_submode(NbSubmodeId::VeryHigh).unwrap();
        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::VeryHigh));

        let mut pcm = vec![0i16; 160];
        let mut bits = SpeexBits::new();
        assert!(duplex.encode_int(&mut pcm, &mut bits).unwrap());

        let packet = remote_packet(&[InbandRequest::Mode(NbSubmodeId::VeryLow as u8)]);
        let mut bits = SpeexBits::from_bytes(&packet);
        duplex.decode_int_to_owned(&mut bits).unwrap();
        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::VeryLow));

        duplex.set_submode(NbSubmodeId::Medium).unwrap();
        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::Medium));
        let mut bits = SpeexBits::from_bytes(&packet);
        duplex.decode_int_to_owned(&mut bits).unwrap();
        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::VeryLow));
    }

    #[test]
    fn closure_replaces_standard_handler() {
        let mut duplex = SpeexDuplex::<NbMode>::new().unwrap();
        duplex.accept_remote_requests().unwrap();
        duplex.set_submode(NbSubmodeId::High).unwrap();
        duplex.set_inband_callback(InbandId::Mode, |_| {}).unwrap();

        let packet = remote_packet(&[InbandRequest::Mode(NbSubmodeId::Low as u8)]);
        let mut bits = SpeexBits::from_bytes(&packet);
        duplex.decode_int_to_owned(&mut bits).unwrap();
        assert_eq!(duplex.get_submode().unwrap(), Some(NbSubmodeId::High));
    }

    #[test]
    fn debug_names_both_halves() {
        let duplex = SpeexDuplex::<WbMode>::new().unwrap();
        let text = format!("{:?}", duplex);
        assert!(text.contains("SpeexEncoder"));
        assert!(text.contains("SpeexDecoder"));
        assert_eq!(duplex.frame_size(), 320);
        assert_eq!(duplex.encoder().mode(), duplex.decoder().mode());
    }
}
