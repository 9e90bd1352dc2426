//! Raw declarations for the native Speex library.
//!
//! One submodule per header aggregated by `wrapper.h`, in the same order.
//! Nothing here is safe to call directly; see [`crate::codec`] for the
//! wrappers.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]

pub mod speex;
pub mod bits;
pub mod callbacks;
pub mod header;
pub mod stereo;
pub mod types;

pub mod headers;

pub use bits::*;
pub use callbacks::*;
pub use header::*;
pub use speex::*;
pub use stereo::*;
pub use types::*;
