//! `speex_bits.h`: the bit-packing buffer.

use std::ffi::{c_char, c_int, c_uint, c_void};

/// Bit-packing state. The library owns `chars` when `owner` is non-zero.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SpeexBits {
    pub chars: *mut c_char,
    pub nbBits: c_int,
    pub charPtr: c_int,
    pub bitPtr: c_int,
    pub owner: c_int,
    pub overflow: c_int,
    pub buf_size: c_int,
    pub reserved1: c_int,
    pub reserved2: *mut c_void,
}

unsafe extern "C" {
    pub fn speex_bits_init(bits: *mut SpeexBits);
    pub fn speex_bits_init_buffer(bits: *mut SpeexBits, buff: *mut c_void, buf_size: c_int);
    pub fn speex_bits_set_bit_buffer(bits: *mut SpeexBits, buff: *mut c_void, buf_size: c_int);
    pub fn speex_bits_destroy(bits: *mut SpeexBits);
    pub fn speex_bits_reset(bits: *mut SpeexBits);
    pub fn speex_bits_rewind(bits: *mut SpeexBits);
    pub fn speex_bits_read_from(bits: *mut SpeexBits, bytes: *const c_char, len: c_int);
    pub fn speex_bits_read_whole_bytes(bits: *mut SpeexBits, bytes: *const c_char, len: c_int);
    pub fn speex_bits_write(bits: *mut SpeexBits, bytes: *mut c_char, max_len: c_int) -> c_int;
    pub fn speex_bits_write_whole_bytes(
        bits: *mut SpeexBits,
        bytes: *mut c_char,
        max_len: c_int,
    ) -> c_int;
    pub fn speex_bits_pack(bits: *mut SpeexBits, data: c_int, nbBits: c_int);
    pub fn speex_bits_unpack_signed(bits: *mut SpeexBits, nbBits: c_int) -> c_int;
    pub fn speex_bits_unpack_unsigned(bits: *mut SpeexBits, nbBits: c_int) -> c_uint;
    pub fn speex_bits_nbytes(bits: *mut SpeexBits) -> c_int;
    pub fn speex_bits_peek_unsigned(bits: *mut SpeexBits, nbBits: c_int) -> c_uint;
    pub fn speex_bits_peek(bits: *mut SpeexBits) -> c_int;
    pub fn speex_bits_advance(bits: *mut SpeexBits, n: c_int);
    pub fn speex_bits_remaining(bits: *mut SpeexBits) -> c_int;
    pub fn speex_bits_insert_terminator(bits: *mut SpeexBits);
}
