//! Primitive aliases from `speex_types.h`.

pub type spx_int16_t = i16;
pub type spx_uint16_t = u16;
pub type spx_int32_t = i32;
pub type spx_uint32_t = u32;
