//! In-band signalling: requests and user messages carried between frames
//! of a Speex bitstream, and the glue that lets Rust closures handle them.

use std::ffi::{c_int, c_void};
use std::panic::{self, AssertUnwindSafe};

use crate::sys;

use super::bits::SpeexBits;
use super::error::InbandError;

/// Narrowband code announcing a Speex in-band request.
const INBAND_REQUEST_CODE: i32 = 14;
/// Narrowband code announcing an application-defined message.
const USER_MESSAGE_CODE: i32 = 13;
/// Longest user message the 4-bit length field can describe.
pub const MAX_USER_MESSAGE_LEN: usize = 15;

/// Identifier of an in-band request (4 bits on the wire).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum InbandId {
    Enhancement,
    Reserved1,
    Mode,
    LowMode,
    HighMode,
    VbrQuality,
    AcknowledgeRequest,
    Vbr,
    Char,
    Stereo,
    MaxBitrate,
    Acknowledge,
    /// Ids without a standard meaning (11, 13, 14, 15).
    Other(u8),
}

impl InbandId {
    pub fn code(self) -> u8 {
        match self {
            InbandId::Enhancement => sys::SPEEX_INBAND_ENH_REQUEST as u8,
            InbandId::Reserved1 => sys::SPEEX_INBAND_RESERVED1 as u8,
            InbandId::Mode => sys::SPEEX_INBAND_MODE_REQUEST as u8,
            InbandId::LowMode => sys::SPEEX_INBAND_LOW_MODE_REQUEST as u8,
            InbandId::HighMode => sys::SPEEX_INBAND_HIGH_MODE_REQUEST as u8,
            InbandId::VbrQuality => sys::SPEEX_INBAND_VBR_QUALITY_REQUEST as u8,
            InbandId::AcknowledgeRequest => sys::SPEEX_INBAND_ACKNOWLEDGE_REQUEST as u8,
            InbandId::Vbr => sys::SPEEX_INBAND_VBR_REQUEST as u8,
            InbandId::Char => sys::SPEEX_INBAND_CHAR as u8,
            InbandId::Stereo => sys::SPEEX_INBAND_STEREO as u8,
            InbandId::MaxBitrate => sys::SPEEX_INBAND_MAX_BITRATE as u8,
            InbandId::Acknowledge => sys::SPEEX_INBAND_ACKNOWLEDGE as u8,
            InbandId::Other(code) => code,
        }
    }

    /// Payload width in bits, as skipped by the library when no handler is
    /// registered for the id.
    pub fn payload_bits(self) -> u32 {
        match self.code() {
            0..=1 => 1,
            2..=7 => 4,
            8..=9 => 8,
            10..=11 => 16,
            12..=13 => 32,
            _ => 64,
        }
    }
}

impl TryFrom<u8> for InbandId {
    type Error = InbandError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let id = match code {
            0 => InbandId::Enhancement,
            1 => InbandId::Reserved1,
            2 => InbandId::Mode,
            3 => InbandId::LowMode,
            4 => InbandId::HighMode,
            5 => InbandId::VbrQuality,
            6 => InbandId::AcknowledgeRequest,
            7 => InbandId::Vbr,
            8 => InbandId::Char,
            9 => InbandId::Stereo,
            10 => InbandId::MaxBitrate,
            12 => InbandId::Acknowledge,
            11 | 13..=15 => InbandId::Other(code),
            _ => return Err(InbandError::InvalidId(code)),
        };
        Ok(id)
    }
}

/// A request to embed in the bitstream ahead of the next frame.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum InbandRequest {
    /// Ask the remote decoder to turn its enhancer on or off.
    Enhancement(bool),
    /// Ask the remote encoder to switch to a narrowband submode.
    Mode(u8),
    LowMode(u8),
    HighMode(u8),
    /// VBR quality 0..=10.
    VbrQuality(u8),
    AcknowledgeRequest(u8),
    Vbr(bool),
    Char(u8),
    MaxBitrate(u16),
    Acknowledge(u32),
    /// Any id with a payload of the matching width.
    Raw { id: u8, payload: u64 },
}

impl InbandRequest {
    pub fn id(&self) -> Result<InbandId, InbandError> {
        let id = match self {
            InbandRequest::Enhancement(_) => InbandId::Enhancement,
            InbandRequest::Mode(_) => InbandId::Mode,
            InbandRequest::LowMode(_) => InbandId::LowMode,
            InbandRequest::HighMode(_) => InbandId::HighMode,
            InbandRequest::VbrQuality(_) => InbandId::VbrQuality,
            InbandRequest::AcknowledgeRequest(_) => InbandId::AcknowledgeRequest,
            InbandRequest::Vbr(_) => InbandId::Vbr,
            InbandRequest::Char(_) => InbandId::Char,
            InbandRequest::MaxBitrate(_) => InbandId::MaxBitrate,
            InbandRequest::Acknowledge(_) => InbandId::Acknowledge,
            InbandRequest::Raw { id, .. } => InbandId::try_from(*id)?,
        };
        Ok(id)
    }

    fn payload(&self) -> u64 {
        match *self {
            InbandRequest::Enhancement(on) | InbandRequest::Vbr(on) => on as u64,
            InbandRequest::Mode(v)
            | InbandRequest::LowMode(v)
            | InbandRequest::HighMode(v)
            | InbandRequest::VbrQuality(v)
            | InbandRequest::AcknowledgeRequest(v)
            | InbandRequest::Char(v) => v as u64,
            InbandRequest::MaxBitrate(v) => v as u64,
            InbandRequest::Acknowledge(v) => v as u64,
            InbandRequest::Raw { payload, .. } => payload,
        }
    }

    /// Packs the request: narrowband flag, request code, id, payload.
    ///
    /// A payload wider than the id's field is rejected, never truncated.
    pub fn write(&self, bits: &mut SpeexBits<'_>) -> Result<(), InbandError> {
        let id = self.id()?;
        let width = id.payload_bits();
        let payload = self.payload();
        if width < 64 && payload >> width != 0 {
            return Err(InbandError::PayloadTooWide {
                id: id.code(),
                bits: width,
            });
        }
        bits.pack(INBAND_REQUEST_CODE, 5)?;
        bits.pack(id.code() as i32, 4)?;
        pack_wide(bits, payload, width)?;
        Ok(())
    }
}

fn pack_wide(bits: &mut SpeexBits<'_>, value: u64, width: u32) -> Result<(), InbandError> {
    if width > 32 {
        bits.pack((value >> 32) as u32 as i32, width - 32)?;
        bits.pack(value as u32 as i32, 32)?;
    } else {
        bits.pack(value as u32 as i32, width)?;
    }
    Ok(())
}

/// Packs an application message of at most [`MAX_USER_MESSAGE_LEN`] bytes.
///
/// Layout after the narrowband flag and code 13: 4-bit length, 5 reserved
/// bits, then the bytes. Decoders without a user handler skip it.
pub fn write_user_message(bits: &mut SpeexBits<'_>, message: &[u8]) -> Result<(), InbandError> {
    if message.len() > MAX_USER_MESSAGE_LEN {
        return Err(InbandError::MessageTooLong(message.len()));
    }
    bits.pack(USER_MESSAGE_CODE, 5)?;
    bits.pack(message.len() as i32, 4)?;
    bits.pack(0, 5)?;
    for byte in message {
        bits.pack(*byte as i32, 8)?;
    }
    Ok(())
}

// ======================== Native trampolines ========================

pub(crate) type InbandFn = Box<dyn FnMut(u64) + Send>;
pub(crate) type UserFn = Box<dyn FnMut(&[u8]) + Send>;

/// Boxed so its address stays fixed while the decoder holds it.
pub(crate) struct InbandSlot {
    payload_bits: u32,
    handler: InbandFn,
}

pub(crate) struct UserSlot {
    handler: UserFn,
}

impl InbandSlot {
    pub(crate) fn new(id: InbandId, handler: InbandFn) -> Box<Self> {
        Box::new(Self {
            payload_bits: id.payload_bits(),
            handler,
        })
    }
}

impl UserSlot {
    pub(crate) fn new(handler: UserFn) -> Box<Self> {
        Box::new(Self { handler })
    }
}

const HANDLER_OK: c_int = 0;
const HANDLER_CORRUPT: c_int = -2;

unsafe fn unpack_raw(bits: *mut sys::SpeexBits, width: u32) -> Option<u64> {
    let remaining = unsafe { sys::speex_bits_remaining(bits) };
    if remaining < 0 || (remaining as u32) < width {
        return None;
    }
    let value = if width > 32 {
        let high = unsafe { sys::speex_bits_unpack_unsigned(bits, (width - 32) as c_int) } as u64;
        let low = unsafe { sys::speex_bits_unpack_unsigned(bits, 32) } as u64;
        (high << 32) | low
    } else {
        unsafe { sys::speex_bits_unpack_unsigned(bits, width as c_int) as u64 }
    };
    Some(value)
}

pub(crate) unsafe extern "C" fn inband_trampoline(
    bits: *mut sys::SpeexBits,
    _state: *mut c_void,
    data: *mut c_void,
) -> c_int {
    if data.is_null() {
        return HANDLER_CORRUPT;
    }
    let slot = unsafe { &mut *(data as *mut InbandSlot) };
    let Some(payload) = (unsafe { unpack_raw(bits, slot.payload_bits) }) else {
        log::warn!("In-band request truncated, {} payload bits missing", slot.payload_bits);
        return HANDLER_CORRUPT;
    };
    match panic::catch_unwind(AssertUnwindSafe(|| (slot.handler)(payload))) {
        Ok(()) => HANDLER_OK,
        Err(_) => {
            log::error!("In-band handler panicked");
            HANDLER_CORRUPT
        }
    }
}

pub(crate) unsafe extern "C" fn user_trampoline(
    bits: *mut sys::SpeexBits,
    _state: *mut c_void,
    data: *mut c_void,
) -> c_int {
    if data.is_null() {
        return HANDLER_CORRUPT;
    }
    let slot = unsafe { &mut *(data as *mut UserSlot) };

    let Some(len) = (unsafe { unpack_raw(bits, 4) }) else {
        return HANDLER_CORRUPT;
    };
    if unsafe { unpack_raw(bits, 5) }.is_none() {
        return HANDLER_CORRUPT;
    }
    let mut message = Vec::with_capacity(len as usize);
    for _ in 0..len {
        match unsafe { unpack_raw(bits, 8) } {
            Some(byte) => message.push(byte as u8),
            None => {
                log::warn!("User message truncated after {} of {} bytes", message.len(), len);
                return HANDLER_CORRUPT;
            }
        }
    }

    match panic::catch_unwind(AssertUnwindSafe(|| (slot.handler)(&message))) {
        Ok(()) => HANDLER_OK,
        Err(_) => {
            log::error!("User in-band handler panicked");
            HANDLER_CORRUPT
        }
    }
}

/// `SPEEX_SET_USER_HANDLER` keeps a single handler and ignores the id.
const USER_HANDLER_ID: c_int = 0;

/// Registration record for the user message handler.
pub(crate) fn user_callback_record(data: *mut c_void) -> sys::SpeexCallback {
    callback_record(USER_HANDLER_ID, Some(user_trampoline), data)
}

/// Builds the registration record for `SPEEX_SET_HANDLER`.
pub(crate) fn callback_record(
    id: c_int,
    func: sys::speex_callback_func,
    data: *mut c_void,
) -> sys::SpeexCallback {
    sys::SpeexCallback {
        callback_id: id,
        func,
        data,
        reserved1: std::ptr::null_mut(),
        reserved2: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_record_points_at_trampoline() {
        let mut slot = UserSlot::new(Box::new(|_: &[u8]| {}));
        let data = &mut *slot as *mut UserSlot as *mut c_void;
        let record = user_callback_record(data);
        assert_eq!(record.callback_id, 0);
        assert_eq!(record.data, data);
        assert!(record.func.is_some());
    }

    #[test]
    fn payload_widths_follow_skip_table() {
        assert_eq!(InbandId::Enhancement.payload_bits(), 1);
        assert_eq!(InbandId::Mode.payload_bits(), 4);
        assert_eq!(InbandId::Vbr.payload_bits(), 4);
        assert_eq!(InbandId::Stereo.payload_bits(), 8);
        assert_eq!(InbandId::MaxBitrate.payload_bits(), 16);
        assert_eq!(InbandId::Acknowledge.payload_bits(), 32);
        assert_eq!(InbandId::Other(15).payload_bits(), 64);
    }

    #[test]
    fn ids_round_trip_through_codes() {
        for code in 0..16u8 {
            assert_eq!(InbandId::try_from(code).unwrap().code(), code);
        }
        assert_eq!(InbandId::try_from(16), Err(InbandError::InvalidId(16)));
    }

    #[test]
    fn request_layout() {
        let mut bits = SpeexBits::new();
        InbandRequest::Mode(3).write(&mut bits).unwrap();
        assert_eq!(bits.len_bits(), 5 + 4 + 4);
        bits.rewind();
        assert_eq!(bits.unpack_unsigned(1).unwrap(), 0);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 14);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 2);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 3);
    }

    #[test]
    fn raw_request_with_wide_payload() {
        let mut bits = SpeexBits::new();
        InbandRequest::Raw {
            id: 15,
            payload: 0x0123_4567_89AB_CDEF,
        }
        .write(&mut bits)
        .unwrap();
        assert_eq!(bits.len_bits(), 5 + 4 + 64);
        bits.rewind();
        bits.advance(9).unwrap();
        assert_eq!(bits.unpack_unsigned(32).unwrap(), 0x0123_4567);
        assert_eq!(bits.unpack_unsigned(32).unwrap(), 0x89AB_CDEF);
    }

    #[test]
    fn oversized_payloads_are_rejected() {
        let mut bits = SpeexBits::new();
        assert_eq!(
            InbandRequest::Mode(16).write(&mut bits),
            Err(InbandError::PayloadTooWide { id: 2, bits: 4 })
        );
        assert_eq!(
            InbandRequest::VbrQuality(200).write(&mut bits),
            Err(InbandError::PayloadTooWide { id: 5, bits: 4 })
        );
        assert_eq!(
            InbandRequest::Raw { id: 0, payload: 2 }.write(&mut bits),
            Err(InbandError::PayloadTooWide { id: 0, bits: 1 })
        );
        assert!(bits.is_empty());

        InbandRequest::Mode(15).write(&mut bits).unwrap();
        InbandRequest::Raw { id: 15, payload: u64::MAX }
            .write(&mut bits)
            .unwrap();
    }

    #[test]
    fn user_message_layout_and_limit() {
        let mut bits = SpeexBits::new();
        write_user_message(&mut bits, b"hi").unwrap();
        assert_eq!(bits.len_bits(), 5 + 4 + 5 + 16);
        bits.rewind();
        assert_eq!(bits.unpack_unsigned(5).unwrap(), 13);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 2);
        bits.advance(5).unwrap();
        assert_eq!(bits.unpack_unsigned(8).unwrap(), b'h' as u32);

        let long = [0u8; 16];
        assert_eq!(
            write_user_message(&mut bits, &long),
            Err(InbandError::MessageTooLong(16))
        );
    }
}
