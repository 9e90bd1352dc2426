//! Intensity stereo: downmix on the encoder side, re-expansion on the
//! decoder side driven by in-band stereo data.

use std::ffi::c_int;

use crate::sys;

use super::bits::SpeexBits;
use super::error::StereoError;

/// Request code, stereo id, balance sign, balance and energy ratio.
const STEREO_MESSAGE_BITS: u32 = 5 + 4 + 1 + 5 + 2;

/// Library-allocated stereo state, updated by in-band stereo messages.
pub struct StereoState {
    state: *mut sys::SpeexStereoState,
}

// Plain numeric state, only mutated through &mut self or the decoder owning it
unsafe impl Send for StereoState {}

impl StereoState {
    pub fn new() -> Result<Self, StereoError> {
        let state = unsafe { sys::speex_stereo_state_init() };
        if state.is_null() {
            return Err(StereoError::Allocation);
        }
        Ok(Self { state })
    }

    /// Back to centered balance.
    pub fn reset(&mut self) {
        unsafe { sys::speex_stereo_state_reset(self.state) };
    }

    /// Current left/right balance.
    pub fn balance(&self) -> f32 {
        unsafe { (*self.state).balance }
    }

    /// Expands a decoded mono frame held in the first `frame_size` samples
    /// into `2 * frame_size` interleaved samples.
    pub fn expand(&mut self, data: &mut [f32], frame_size: usize) -> Result<(), StereoError> {
        let frame_size = check_len(data.len(), frame_size)?;
        unsafe { sys::speex_decode_stereo(data.as_mut_ptr(), frame_size, self.state) };
        Ok(())
    }

    pub fn expand_int(&mut self, data: &mut [i16], frame_size: usize) -> Result<(), StereoError> {
        let frame_size = check_len(data.len(), frame_size)?;
        unsafe { sys::speex_decode_stereo_int(data.as_mut_ptr(), frame_size, self.state) };
        Ok(())
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::SpeexStereoState {
        self.state
    }
}

impl Drop for StereoState {
    fn drop(&mut self) {
        unsafe { sys::speex_stereo_state_destroy(self.state) };
    }
}

impl std::fmt::Debug for StereoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StereoState")
            .field("balance", &self.balance())
            .finish()
    }
}

/// Frame size as the library takes it, once `got` holds two channels of it.
fn check_len(got: usize, frame_size: usize) -> Result<c_int, StereoError> {
    let needed = frame_size.checked_mul(2).ok_or(StereoError::FrameSize {
        needed: usize::MAX,
        got,
    })?;
    if got < needed {
        return Err(StereoError::FrameSize { needed, got });
    }
    c_int::try_from(frame_size).map_err(|_| StereoError::FrameSize { needed, got })
}

/// Downmixes `2 * frame_size` interleaved samples in place (the first
/// `frame_size` become mono) and writes the stereo in-band message.
///
/// Call before encoding the mono frame into the same `bits`.
pub fn encode_stereo(
    data: &mut [f32],
    frame_size: usize,
    bits: &mut SpeexBits<'_>,
) -> Result<(), StereoError> {
    let frame_size = check_len(data.len(), frame_size)?;
    bits.check_writable(STEREO_MESSAGE_BITS)?;
    unsafe { sys::speex_encode_stereo(data.as_mut_ptr(), frame_size, bits.as_mut_ptr()) };
    Ok(())
}

pub fn encode_stereo_int(
    data: &mut [i16],
    frame_size: usize,
    bits: &mut SpeexBits<'_>,
) -> Result<(), StereoError> {
    let frame_size = check_len(data.len(), frame_size)?;
    bits.check_writable(STEREO_MESSAGE_BITS)?;
    unsafe { sys::speex_encode_stereo_int(data.as_mut_ptr(), frame_size, bits.as_mut_ptr()) };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::error::BitsError;

    #[test]
    fn state_starts_centered() {
        let mut state = StereoState::new().unwrap();
        assert_eq!(state.balance(), 1.0);
        state.reset();
        assert_eq!(state.balance(), 1.0);
    }

    #[test]
    fn downmix_writes_inband_message() {
        let mut data = vec![1000i16; 320];
        let mut bits = SpeexBits::new();
        encode_stereo_int(&mut data, 160, &mut bits).unwrap();
        // wideband flag, code 14, id 9, then 8 payload bits
        assert_eq!(bits.len_bits(), STEREO_MESSAGE_BITS as usize);
        assert!(data[..160].iter().all(|&s| s == 1000));
        bits.rewind();
        assert_eq!(bits.unpack_unsigned(5).unwrap(), 14);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 9);
    }

    #[test]
    fn rejects_short_stereo_frames() {
        let mut data = vec![0i16; 200];
        let mut bits = SpeexBits::new();
        assert_eq!(
            encode_stereo_int(&mut data, 160, &mut bits),
            Err(StereoError::FrameSize {
                needed: 320,
                got: 200
            })
        );
        let mut state = StereoState::new().unwrap();
        let mut out = vec![0f32; 100];
        assert!(state.expand(&mut out, 160).is_err());
    }

    #[test]
    fn huge_frame_size_is_an_error() {
        let mut state = StereoState::new().unwrap();
        let mut data = vec![0f32; 8];
        assert_eq!(
            state.expand(&mut data, usize::MAX),
            Err(StereoError::FrameSize {
                needed: usize::MAX,
                got: 8
            })
        );
        let mut data = vec![0i16; 8];
        let mut bits = SpeexBits::new();
        assert!(encode_stereo_int(&mut data, usize::MAX / 2 + 1, &mut bits).is_err());
        assert!(bits.is_empty());
    }

    #[test]
    fn downmix_needs_room_in_borrowed_bits() {
        let mut data = vec![500f32; 320];
        let mut storage = [0u8; 2];
        let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
        assert!(matches!(
            encode_stereo(&mut data, 160, &mut bits),
            Err(StereoError::Bits(BitsError::BufferFull { .. }))
        ));
        assert!(bits.is_empty());

        let mut storage = [0u8; 4];
        let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
        encode_stereo(&mut data, 160, &mut bits).unwrap();
        assert_eq!(bits.len_bits(), STEREO_MESSAGE_BITS as usize);
    }

    #[test]
    fn expansion_duplicates_centered_mono() {
        let mut state = StereoState::new().unwrap();
        let mut data = vec![0i16; 8];
        data[..4].copy_from_slice(&[100, 200, 300, 400]);
        state.expand_int(&mut data, 4).unwrap();
        for pair in data.chunks(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }
}
