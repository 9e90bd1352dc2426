//! Bindings to the Speex speech codec: raw declarations in [`sys`], a safe
//! encoder/decoder layer in [`codec`], and a framed file format in
//! [`stream`].

pub mod codec;
pub mod config;
pub mod info;
pub mod stream;
pub mod sys;

pub use info::{
    LibraryInfo, extra_version, major_version, micro_version, minor_version, version_string,
};
