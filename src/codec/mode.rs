//! Band modes, submodes and the marker types that pin an encoder or decoder
//! to one mode at compile time.

use std::ffi::{CStr, c_int, c_void};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sys;

use super::error::ModeError;

// Layer flag plus submode id, rounded up.
const LAYER_HEADER_BITS: u32 = 8;

/// Possible modes for the encoder and decoder.
#[repr(i32)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ModeId {
    #[serde(rename = "nb")]
    NarrowBand = sys::SPEEX_MODEID_NB,
    #[serde(rename = "wb")]
    WideBand = sys::SPEEX_MODEID_WB,
    #[serde(rename = "uwb")]
    UltraWideBand = sys::SPEEX_MODEID_UWB,
}

impl ModeId {
    pub const ALL: [ModeId; 3] = [ModeId::NarrowBand, ModeId::WideBand, ModeId::UltraWideBand];

    /// The library's static description of this mode.
    pub fn get_mode(self) -> &'static sys::SpeexMode {
        unsafe {
            // Modes are constants compiled into the library and never freed.
            let ptr = sys::speex_lib_get_mode(self as c_int);
            &*ptr
        }
    }

    /// Nominal sampling rate in Hz.
    pub fn sample_rate(self) -> u32 {
        match self {
            ModeId::NarrowBand => 8000,
            ModeId::WideBand => 16000,
            ModeId::UltraWideBand => 32000,
        }
    }

    /// Samples per frame, as reported by the library.
    pub fn frame_size(self) -> usize {
        let mut frame_size: c_int = 0;
        unsafe {
            sys::speex_mode_query(
                self.get_mode(),
                sys::SPEEX_MODE_FRAME_SIZE,
                &mut frame_size as *mut c_int as *mut c_void,
            );
        }
        frame_size.max(0) as usize
    }

    /// Bits per frame used by `submode`, or `None` when the library does not
    /// know that submode for this mode.
    pub fn submode_bits_per_frame(self, submode: i32) -> Option<u32> {
        // The library indexes its submode table without a range check.
        let table_len = match self {
            ModeId::NarrowBand => 16,
            ModeId::WideBand | ModeId::UltraWideBand => 8,
        };
        if !(0..table_len).contains(&submode) {
            return None;
        }
        let mut value: c_int = submode;
        let ret = unsafe {
            sys::speex_mode_query(
                self.get_mode(),
                sys::SPEEX_SUBMODE_BITS_PER_FRAME,
                &mut value as *mut c_int as *mut c_void,
            )
        };
        (ret == 0 && value >= 0).then_some(value as u32)
    }

    /// Upper bound on the bits one frame can take: the widest submode of
    /// every layer the mode stacks (narrowband core, then each sub-band),
    /// plus room for each layer's submode header.
    pub fn max_frame_bits(self) -> u32 {
        let layers: &[ModeId] = match self {
            ModeId::NarrowBand => &[ModeId::NarrowBand],
            ModeId::WideBand => &[ModeId::NarrowBand, ModeId::WideBand],
            ModeId::UltraWideBand => &[
                ModeId::NarrowBand,
                ModeId::WideBand,
                ModeId::UltraWideBand,
            ],
        };
        layers
            .iter()
            .map(|layer| {
                let widest = (0..16)
                    .filter_map(|submode| layer.submode_bits_per_frame(submode))
                    .max()
                    .unwrap_or(0);
                widest + LAYER_HEADER_BITS
            })
            .sum()
    }

    /// The library's name for the mode ("narrowband", "wideband (sub-band CELP)" ...).
    pub fn name(self) -> String {
        let ptr = self.get_mode().modeName;
        if ptr.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    pub fn bitstream_version(self) -> i32 {
        self.get_mode().bitstream_version
    }

    fn short_name(self) -> &'static str {
        match self {
            ModeId::NarrowBand => "nb",
            ModeId::WideBand => "wb",
            ModeId::UltraWideBand => "uwb",
        }
    }
}

impl TryFrom<i32> for ModeId {
    type Error = ModeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            sys::SPEEX_MODEID_NB => Ok(ModeId::NarrowBand),
            sys::SPEEX_MODEID_WB => Ok(ModeId::WideBand),
            sys::SPEEX_MODEID_UWB => Ok(ModeId::UltraWideBand),
            other => Err(ModeError::UnknownMode(other)),
        }
    }
}

impl FromStr for ModeId {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nb" | "narrowband" => Ok(ModeId::NarrowBand),
            "wb" | "wideband" => Ok(ModeId::WideBand),
            "uwb" | "ultrawideband" | "ultra-wideband" => Ok(ModeId::UltraWideBand),
            _ => Err(ModeError::UnknownModeName(s.to_string())),
        }
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Possible submodes for the narrowband mode.
///
/// Wideband and ultra-wideband embed a narrowband layer, so this also names
/// their low band.
#[repr(i32)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NbSubmodeId {
    /// 2150 bps "vocoder-like" mode for comfort noise
    VocoderLike = 1,
    /// 3.95 kbps very low bit-rate mode
    ExtremeLow = 8,
    /// 5.95 kbps very low bit-rate mode
    VeryLow = 2,
    /// 8 kbps low bit-rate mode
    Low = 3,
    /// 11 kbps medium bit-rate mode
    Medium = 4,
    /// 15 kbps high bit-rate mode
    High = 5,
    /// 18.2 kbps very high bit-rate mode
    VeryHigh = 6,
    /// 24.6 kbps very high bit-rate mode
    ExtremeHigh = 7,
}

impl TryFrom<i32> for NbSubmodeId {
    type Error = ModeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NbSubmodeId::VocoderLike),
            2 => Ok(NbSubmodeId::VeryLow),
            3 => Ok(NbSubmodeId::Low),
            4 => Ok(NbSubmodeId::Medium),
            5 => Ok(NbSubmodeId::High),
            6 => Ok(NbSubmodeId::VeryHigh),
            7 => Ok(NbSubmodeId::ExtremeHigh),
            8 => Ok(NbSubmodeId::ExtremeLow),
            other => Err(ModeError::InvalidSubmode(other)),
        }
    }
}

/// Possible submodes for the high band of the wideband mode.
#[repr(i32)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WbSubmodeId {
    /// disables innovation quantization entirely
    NoQuantize = 1,
    /// innovation quantization below the default rate
    QuantizedLow = 2,
    /// innovation quantization at the default rate
    QuantizedMedium = 3,
    /// innovation quantization above the default rate
    QuantizedHigh = 4,
}

impl TryFrom<i32> for WbSubmodeId {
    type Error = ModeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WbSubmodeId::NoQuantize),
            2 => Ok(WbSubmodeId::QuantizedLow),
            3 => Ok(WbSubmodeId::QuantizedMedium),
            4 => Ok(WbSubmodeId::QuantizedHigh),
            other => Err(ModeError::InvalidSubmode(other)),
        }
    }
}

/// The ultra-wideband high band has a single submode.
#[repr(i32)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UwbSubmodeId {
    Only = WbSubmodeId::NoQuantize as i32,
}

impl TryFrom<i32> for UwbSubmodeId {
    type Error = ModeError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(UwbSubmodeId::Only),
            other => Err(ModeError::InvalidSubmode(other)),
        }
    }
}

pub(crate) mod private {
    pub trait Sealed {}
}

/// Marker trait naming the mode of an encoder or decoder.
pub trait CoderMode: private::Sealed + Send + 'static {
    const MODE: ModeId;
}

/// Narrowband mode (8kHz)
pub enum NbMode {}
/// Wideband mode (16kHz)
pub enum WbMode {}
/// Ultra-wideband mode (32kHz)
pub enum UwbMode {}

impl private::Sealed for NbMode {}
impl private::Sealed for WbMode {}
impl private::Sealed for UwbMode {}

impl CoderMode for NbMode {
    const MODE: ModeId = ModeId::NarrowBand;
}
impl CoderMode for WbMode {
    const MODE: ModeId = ModeId::WideBand;
}
impl CoderMode for UwbMode {
    const MODE: ModeId = ModeId::UltraWideBand;
}
