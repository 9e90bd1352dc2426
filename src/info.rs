//! Version information reported by the linked library.

use std::ffi::{CStr, c_char, c_int, c_void};

use serde::Serialize;

use crate::codec::ModeId;
use crate::sys;

fn lib_int(request: c_int) -> i32 {
    let mut value: c_int = 0;
    let ret = unsafe { sys::speex_lib_ctl(request, &mut value as *mut c_int as *mut c_void) };
    if ret != 0 {
        log::warn!("speex_lib_ctl({}) failed with {}", request, ret);
    }
    value
}

fn lib_str(request: c_int) -> String {
    let mut ptr: *const c_char = std::ptr::null();
    let ret = unsafe {
        sys::speex_lib_ctl(request, &mut ptr as *mut *const c_char as *mut c_void)
    };
    if ret != 0 || ptr.is_null() {
        return String::new();
    }
    // Static strings inside the library.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Full version string, e.g. "1.2.1".
pub fn version_string() -> String {
    lib_str(sys::SPEEX_LIB_GET_VERSION_STRING)
}

pub fn major_version() -> i32 {
    lib_int(sys::SPEEX_LIB_GET_MAJOR_VERSION)
}

pub fn minor_version() -> i32 {
    lib_int(sys::SPEEX_LIB_GET_MINOR_VERSION)
}

pub fn micro_version() -> i32 {
    lib_int(sys::SPEEX_LIB_GET_MICRO_VERSION)
}

/// Suffix such as "-beta3", empty for releases.
pub fn extra_version() -> String {
    lib_str(sys::SPEEX_LIB_GET_EXTRA_VERSION)
}

#[derive(Debug, Clone, Serialize)]
pub struct ModeInfo {
    pub mode: ModeId,
    pub name: String,
    pub sample_rate: u32,
    pub frame_size: usize,
    pub bitstream_version: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryInfo {
    pub version: String,
    pub major: i32,
    pub minor: i32,
    pub micro: i32,
    pub extra: String,
    pub modes: Vec<ModeInfo>,
}

impl LibraryInfo {
    pub fn collect() -> Self {
        let modes = ModeId::ALL
            .iter()
            .map(|&mode| ModeInfo {
                mode,
                name: mode.name(),
                sample_rate: mode.sample_rate(),
                frame_size: mode.frame_size(),
                bitstream_version: mode.bitstream_version(),
            })
            .collect();
        Self {
            version: version_string(),
            major: major_version(),
            minor: minor_version(),
            micro: micro_version(),
            extra: extra_version(),
            modes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_version() {
        assert_eq!(major_version(), 1);
        assert!(minor_version() >= 0);
        assert!(!version_string().is_empty());
    }

    #[test]
    fn collects_every_mode() {
        let info = LibraryInfo::collect();
        assert_eq!(info.modes.len(), 3);
        assert_eq!(info.modes[2].frame_size, 640);
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"wb\""));
    }
}
