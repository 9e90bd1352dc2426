//! Safe wrapper around the library's bit-packing buffer.
//!
//! Packing and unpacking share one cursor, so a freshly packed stream must be
//! [`rewind`](SpeexBits::rewind)ed before it can be read back.

use std::ffi::{c_char, c_int, c_void};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;

use crate::sys;

use super::error::BitsError;

/// Holds bits to be read from or written to a Speex bitstream.
///
/// Either the library owns a growable buffer ([`SpeexBits::new`]) or the
/// bits live in a caller's slice for `'a`.
pub struct SpeexBits<'a> {
    raw: sys::SpeexBits,
    borrowed: bool,
    _buffer: PhantomData<&'a mut [u8]>,
}

// The raw state is only reached through &mut self.
unsafe impl Send for SpeexBits<'_> {}

impl SpeexBits<'static> {
    /// Creates an empty bitstream backed by a library-owned buffer.
    pub fn new() -> Self {
        let raw = unsafe {
            // The reserved fields are never written by the library, so start
            // from zeroed memory before assume_init.
            let mut uninit: MaybeUninit<sys::SpeexBits> = MaybeUninit::zeroed();
            sys::speex_bits_init(uninit.as_mut_ptr());
            uninit.assume_init()
        };
        Self {
            raw,
            borrowed: false,
            _buffer: PhantomData,
        }
    }

    /// Creates a bitstream holding a copy of `bytes`, ready to be decoded.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bits = Self::new();
        bits.load(bytes);
        bits
    }
}

impl<'a> SpeexBits<'a> {
    /// Packs into `buffer` without allocating. The stream starts empty and
    /// cannot grow past the slice.
    pub fn for_writing(buffer: &'a mut [u8]) -> Result<Self, BitsError> {
        // The library clears the first byte of the buffer it is given.
        if buffer.is_empty() {
            return Err(BitsError::EmptyBuffer);
        }
        let raw = unsafe {
            let mut uninit: MaybeUninit<sys::SpeexBits> = MaybeUninit::zeroed();
            sys::speex_bits_init_buffer(
                uninit.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut c_void,
                clamp_len(buffer.len()),
            );
            uninit.assume_init()
        };
        Ok(Self {
            raw,
            borrowed: true,
            _buffer: PhantomData,
        })
    }

    /// Reads directly from `buffer`. Every bit of the slice is content.
    pub fn for_reading(buffer: &'a mut [u8]) -> Result<Self, BitsError> {
        if buffer.is_empty() {
            return Err(BitsError::EmptyBuffer);
        }
        let raw = unsafe {
            let mut uninit: MaybeUninit<sys::SpeexBits> = MaybeUninit::zeroed();
            sys::speex_bits_set_bit_buffer(
                uninit.as_mut_ptr(),
                buffer.as_mut_ptr() as *mut c_void,
                clamp_len(buffer.len()),
            );
            uninit.assume_init()
        };
        Ok(Self {
            raw,
            borrowed: true,
            _buffer: PhantomData,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut sys::SpeexBits {
        &mut self.raw as *mut sys::SpeexBits
    }

    /// Capacity in bytes of a borrowed buffer. `None` when the library owns
    /// the buffer and grows it on demand.
    pub fn capacity(&self) -> Option<usize> {
        self.borrowed.then_some(self.raw.buf_size.max(0) as usize)
    }

    /// Total number of bits in the stream.
    pub fn len_bits(&self) -> usize {
        self.raw.nbBits.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.raw.nbBits <= 0
    }

    /// Whether the library flagged a read past the end of the stream.
    pub fn is_overflowed(&self) -> bool {
        self.raw.overflow != 0
    }

    fn cursor(&self) -> i64 {
        self.raw.charPtr as i64 * 8 + self.raw.bitPtr as i64
    }

    fn check_bit_count(num_bits: u32) -> Result<c_int, BitsError> {
        if (1..=32).contains(&num_bits) {
            Ok(num_bits as c_int)
        } else {
            Err(BitsError::InvalidBitCount(num_bits as i32))
        }
    }

    fn check_readable(&mut self, num_bits: u32) -> Result<(), BitsError> {
        if self.is_overflowed() {
            return Err(BitsError::Overflow);
        }
        let remaining = self.remaining();
        if (num_bits as usize) > remaining {
            return Err(BitsError::Exhausted {
                requested: num_bits as i32,
                remaining: remaining as i32,
            });
        }
        Ok(())
    }

    // The library refuses a pack that would move the cursor onto the byte
    // past the end of a borrowed buffer, so the last bit is never usable.
    pub(crate) fn check_writable(&self, num_bits: u32) -> Result<(), BitsError> {
        if !self.borrowed {
            return Ok(());
        }
        let needed = self.cursor() + num_bits as i64;
        let capacity = self.raw.buf_size as i64 * 8;
        if needed >= capacity {
            return Err(BitsError::BufferFull { needed, capacity });
        }
        Ok(())
    }

    /// Appends the low `num_bits` bits of `value` to the stream.
    pub fn pack(&mut self, value: i32, num_bits: u32) -> Result<(), BitsError> {
        let n = Self::check_bit_count(num_bits)?;
        self.check_writable(num_bits)?;
        unsafe { sys::speex_bits_pack(self.as_mut_ptr(), value, n) };
        Ok(())
    }

    /// Reads the next `num_bits` bits as an unsigned integer.
    pub fn unpack_unsigned(&mut self, num_bits: u32) -> Result<u32, BitsError> {
        let n = Self::check_bit_count(num_bits)?;
        self.check_readable(num_bits)?;
        Ok(unsafe { sys::speex_bits_unpack_unsigned(self.as_mut_ptr(), n) })
    }

    /// Reads the next `num_bits` bits as a two's complement integer.
    pub fn unpack_signed(&mut self, num_bits: u32) -> Result<i32, BitsError> {
        let n = Self::check_bit_count(num_bits)?;
        self.check_readable(num_bits)?;
        Ok(unsafe { sys::speex_bits_unpack_signed(self.as_mut_ptr(), n) })
    }

    /// Returns the next `num_bits` bits without advancing the cursor.
    pub fn peek_unsigned(&mut self, num_bits: u32) -> Result<u32, BitsError> {
        let n = Self::check_bit_count(num_bits)?;
        self.check_readable(num_bits)?;
        Ok(unsafe { sys::speex_bits_peek_unsigned(self.as_mut_ptr(), n) })
    }

    /// Returns the next bit without advancing the cursor.
    pub fn peek(&mut self) -> Result<bool, BitsError> {
        self.check_readable(1)?;
        Ok(unsafe { sys::speex_bits_peek(self.as_mut_ptr()) } != 0)
    }

    /// Skips `num_bits` bits.
    pub fn advance(&mut self, num_bits: u32) -> Result<(), BitsError> {
        self.check_readable(num_bits)?;
        unsafe { sys::speex_bits_advance(self.as_mut_ptr(), num_bits as c_int) };
        Ok(())
    }

    /// Number of unread bits.
    pub fn remaining(&mut self) -> usize {
        let remaining = unsafe { sys::speex_bits_remaining(self.as_mut_ptr()) };
        remaining.max(0) as usize
    }

    /// Number of bytes in the stream, counting a trailing partial byte.
    pub fn num_bytes(&mut self) -> usize {
        unsafe { sys::speex_bits_nbytes(self.as_mut_ptr()) }.max(0) as usize
    }

    /// Pads the stream to a byte boundary with a terminator so a decoder can
    /// tell where the frames of a packet end.
    pub fn insert_terminator(&mut self) -> Result<(), BitsError> {
        if self.raw.bitPtr != 0 {
            self.check_writable(8 - self.raw.bitPtr as u32)?;
        }
        unsafe { sys::speex_bits_insert_terminator(self.as_mut_ptr()) };
        Ok(())
    }

    /// Replaces the content with `bytes`.
    pub fn read_from(&mut self, bytes: &[u8]) -> Result<(), BitsError> {
        if let Some(capacity) = self.capacity() {
            if bytes.len() > capacity {
                return Err(BitsError::BufferFull {
                    needed: bytes.len() as i64 * 8,
                    capacity: capacity as i64 * 8,
                });
            }
        }
        self.load(bytes);
        Ok(())
    }

    fn load(&mut self, bytes: &[u8]) {
        unsafe {
            sys::speex_bits_read_from(
                self.as_mut_ptr(),
                bytes.as_ptr() as *const c_char,
                clamp_len(bytes.len()),
            );
        }
    }

    /// Appends `bytes` after the unread part of the stream.
    ///
    /// A borrowed buffer must hold the whole current content plus `bytes`:
    /// the library checks the size before it drops the bytes already read.
    pub fn read_whole_bytes(&mut self, bytes: &[u8]) -> Result<(), BitsError> {
        if let Some(capacity) = self.capacity() {
            let content = (self.raw.nbBits as i64 + 7) >> 3;
            let needed = content + bytes.len() as i64;
            if needed > capacity as i64 {
                return Err(BitsError::BufferFull {
                    needed: needed * 8,
                    capacity: capacity as i64 * 8,
                });
            }
        }
        unsafe {
            sys::speex_bits_read_whole_bytes(
                self.as_mut_ptr(),
                bytes.as_ptr() as *const c_char,
                clamp_len(bytes.len()),
            );
        }
        Ok(())
    }

    /// Copies the stream into `out`, padding the last byte with a
    /// terminator. Returns the number of bytes written.
    ///
    /// The cursor is left where it was and unread content is not touched.
    pub fn write(&mut self, out: &mut [u8]) -> usize {
        // The library pads at the cursor, so move it past the content first.
        let (char_ptr, bit_ptr) = (self.raw.charPtr, self.raw.bitPtr);
        self.raw.charPtr = self.raw.nbBits >> 3;
        self.raw.bitPtr = self.raw.nbBits & 7;
        let written = unsafe {
            sys::speex_bits_write(
                self.as_mut_ptr(),
                out.as_mut_ptr() as *mut c_char,
                clamp_len(out.len()),
            )
        };
        self.raw.charPtr = char_ptr;
        self.raw.bitPtr = bit_ptr;
        written.max(0) as usize
    }

    /// Copies only whole bytes into `out` and drops them from the stream.
    pub fn write_whole_bytes(&mut self, out: &mut [u8]) -> usize {
        let written = unsafe {
            sys::speex_bits_write_whole_bytes(
                self.as_mut_ptr(),
                out.as_mut_ptr() as *mut c_char,
                clamp_len(out.len()),
            )
        };
        written.max(0) as usize
    }

    /// The whole stream as bytes.
    pub fn to_vec(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.num_bytes()];
        let written = self.write(&mut out);
        out.truncate(written);
        out
    }

    /// Erases all content.
    pub fn reset(&mut self) {
        unsafe { sys::speex_bits_reset(self.as_mut_ptr()) }
    }

    /// Moves the cursor back to the start without erasing content.
    pub fn rewind(&mut self) {
        unsafe { sys::speex_bits_rewind(self.as_mut_ptr()) }
    }
}

fn clamp_len(len: usize) -> c_int {
    len.min(c_int::MAX as usize) as c_int
}

impl Default for SpeexBits<'static> {
    fn default() -> Self {
        SpeexBits::new()
    }
}

impl fmt::Debug for SpeexBits<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeexBits")
            .field("bits", &self.raw.nbBits)
            .field("cursor", &self.cursor())
            .field("borrowed", &self.borrowed)
            .finish()
    }
}

impl Drop for SpeexBits<'_> {
    fn drop(&mut self) {
        // Frees the buffer only when the library owns it.
        unsafe { sys::speex_bits_destroy(self.as_mut_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_and_drops() {
        let mut bits = SpeexBits::new();
        assert_eq!(bits.num_bytes(), 0);
        assert_eq!(bits.remaining(), 0);
        assert!(bits.is_empty());
        assert_eq!(bits.capacity(), None);
    }

    #[test]
    fn encodes_value() {
        let mut bits = SpeexBits::new();
        bits.pack(1, 1).unwrap();
        assert_eq!(bits.num_bytes(), 1);
        assert_eq!(bits.len_bits(), 1);
    }

    #[test]
    fn pack_then_unpack_after_rewind() {
        let mut bits = SpeexBits::new();
        bits.pack(5, 3).unwrap();
        bits.pack(0xAB, 8).unwrap();
        assert_eq!(bits.num_bytes(), 2);
        // Packing leaves the cursor at the end.
        assert_eq!(bits.remaining(), 0);

        bits.rewind();
        assert_eq!(bits.remaining(), 11);
        assert_eq!(bits.peek_unsigned(3).unwrap(), 5);
        assert_eq!(bits.unpack_unsigned(3).unwrap(), 5);
        assert_eq!(bits.unpack_unsigned(8).unwrap(), 0xAB);
        assert_eq!(bits.remaining(), 0);
    }

    #[test]
    fn unpack_signed_sign_extends() {
        let mut bits = SpeexBits::new();
        bits.pack(-1, 4).unwrap();
        bits.pack(3, 4).unwrap();
        bits.rewind();
        assert_eq!(bits.unpack_signed(4).unwrap(), -1);
        assert_eq!(bits.unpack_signed(4).unwrap(), 3);
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let mut bits = SpeexBits::from_bytes(&[0xF0]);
        assert_eq!(bits.unpack_unsigned(4).unwrap(), 0xF);
        let err = bits.unpack_unsigned(8).unwrap_err();
        assert_eq!(
            err,
            BitsError::Exhausted {
                requested: 8,
                remaining: 4
            }
        );
        assert!(!bits.is_overflowed());
        assert!(bits.advance(5).is_err());
        bits.advance(4).unwrap();
        assert!(bits.peek().is_err());
    }

    #[test]
    fn rejects_bad_bit_counts() {
        let mut bits = SpeexBits::new();
        assert_eq!(bits.pack(1, 0), Err(BitsError::InvalidBitCount(0)));
        assert_eq!(bits.pack(1, 33), Err(BitsError::InvalidBitCount(33)));
        assert!(bits.unpack_unsigned(0).is_err());
    }

    #[test]
    fn write_copies_packed_bytes() {
        let mut bits = SpeexBits::new();
        bits.pack(0xAB, 8).unwrap();
        bits.pack(0xCD, 8).unwrap();
        let mut buffer = [0u8; 4];
        assert_eq!(bits.write(&mut buffer), 2);
        assert_eq!(&buffer[..2], &[0xAB, 0xCD]);
        assert_eq!(bits.to_vec(), vec![0xAB, 0xCD]);
    }

    #[test]
    fn write_respects_output_length() {
        let mut bits = SpeexBits::new();
        for _ in 0..4 {
            bits.pack(0x11, 8).unwrap();
        }
        let mut buffer = [0u8; 2];
        assert_eq!(bits.write(&mut buffer), 2);
        assert_eq!(buffer, [0x11, 0x11]);
    }

    #[test]
    fn read_from_replaces_content() {
        let mut bits = SpeexBits::new();
        bits.pack(7, 3).unwrap();
        bits.read_from(&[0x12, 0x34]).unwrap();
        assert_eq!(bits.remaining(), 16);
        assert_eq!(bits.unpack_unsigned(16).unwrap(), 0x1234);
    }

    #[test]
    fn write_whole_bytes_keeps_partial_byte() {
        let mut bits = SpeexBits::new();
        bits.pack(0xAB, 8).unwrap();
        bits.pack(1, 1).unwrap();
        let mut buffer = [0u8; 4];
        assert_eq!(bits.write_whole_bytes(&mut buffer), 1);
        assert_eq!(buffer[0], 0xAB);
        assert_eq!(bits.len_bits(), 1);
    }

    #[test]
    fn terminator_pads_to_byte_boundary() {
        let mut bits = SpeexBits::new();
        bits.pack(1, 3).unwrap();
        bits.insert_terminator().unwrap();
        assert_eq!(bits.len_bits(), 8);
        // 001 then a 0 and four 1s
        assert_eq!(bits.to_vec(), vec![0b0010_1111]);
    }

    #[test]
    fn borrowed_writer_cannot_grow() {
        let mut storage = [0u8; 2];
        {
            let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
            assert_eq!(bits.capacity(), Some(2));
            bits.pack(0xFF, 8).unwrap();
            bits.pack(0x7F, 7).unwrap();
            assert!(matches!(
                bits.pack(1, 1),
                Err(BitsError::BufferFull { needed: 16, capacity: 16 })
            ));
            assert!(bits.read_from(&[0; 3]).is_err());
        }
        assert_eq!(storage[0], 0xFF);
    }

    #[test]
    fn borrowed_reader_sees_whole_slice() {
        let mut storage = [0xA5u8, 0x0F];
        let mut bits = SpeexBits::for_reading(&mut storage).unwrap();
        assert_eq!(bits.remaining(), 16);
        assert_eq!(bits.unpack_unsigned(8).unwrap(), 0xA5);
        assert!(!bits.peek().unwrap());
        assert_eq!(bits.unpack_unsigned(8).unwrap(), 0x0F);
    }

    #[test]
    fn empty_borrowed_buffers_are_rejected() {
        let mut empty: [u8; 0] = [];
        assert!(matches!(
            SpeexBits::for_writing(&mut empty),
            Err(BitsError::EmptyBuffer)
        ));
        assert!(matches!(
            SpeexBits::for_reading(&mut empty),
            Err(BitsError::EmptyBuffer)
        ));
    }

    #[test]
    fn read_whole_bytes_appends_after_unread_content() {
        let mut bits = SpeexBits::from_bytes(&[0xAB, 0xCD]);
        assert_eq!(bits.unpack_unsigned(8).unwrap(), 0xAB);
        bits.read_whole_bytes(&[0xEF]).unwrap();
        assert_eq!(bits.remaining(), 16);
        assert_eq!(bits.unpack_unsigned(16).unwrap(), 0xCDEF);
    }

    #[test]
    fn read_whole_bytes_into_borrowed_buffer() {
        let mut storage = [0u8; 4];
        {
            let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
            bits.pack(0xAB, 8).unwrap();
            bits.rewind();
            bits.read_whole_bytes(&[0x01, 0x02]).unwrap();
            assert_eq!(bits.unpack_unsigned(8).unwrap(), 0xAB);
            assert_eq!(bits.unpack_unsigned(16).unwrap(), 0x0102);
        }
        assert_eq!(&storage[..3], &[0xAB, 0x01, 0x02]);
    }

    #[test]
    fn read_whole_bytes_counts_consumed_bytes_against_capacity() {
        let mut storage = [0x11u8, 0x22, 0x33, 0x44];
        let mut bits = SpeexBits::for_reading(&mut storage).unwrap();
        assert_eq!(bits.unpack_unsigned(16).unwrap(), 0x1122);
        assert_eq!(
            bits.read_whole_bytes(&[1, 2]),
            Err(BitsError::BufferFull {
                needed: 48,
                capacity: 32
            })
        );
        assert_eq!(bits.remaining(), 16);
        assert_eq!(bits.unpack_unsigned(16).unwrap(), 0x3344);
    }

    #[test]
    fn write_after_partial_read_keeps_unread_bits() {
        let mut bits = SpeexBits::new();
        bits.pack(0b101, 3).unwrap();
        bits.pack(0b11, 2).unwrap();
        bits.rewind();
        assert_eq!(bits.unpack_unsigned(3).unwrap(), 0b101);
        // terminator goes after bit 5: 10111 then 0 then 11
        assert_eq!(bits.to_vec(), vec![0b1011_1011]);
        assert_eq!(bits.remaining(), 2);
        assert_eq!(bits.unpack_unsigned(2).unwrap(), 0b11);
    }

    #[test]
    fn write_after_partial_read_keeps_following_bytes() {
        let mut bits = SpeexBits::new();
        bits.pack(0xAB, 8).unwrap();
        bits.pack(0xCD, 8).unwrap();
        bits.rewind();
        bits.unpack_unsigned(3).unwrap();
        assert_eq!(bits.to_vec(), vec![0xAB, 0xCD]);
        assert_eq!(bits.unpack_unsigned(5).unwrap(), 0x0B);
        assert_eq!(bits.unpack_unsigned(8).unwrap(), 0xCD);

        let mut storage = [0xABu8, 0xCD];
        let mut bits = SpeexBits::for_reading(&mut storage).unwrap();
        bits.unpack_unsigned(3).unwrap();
        assert_eq!(bits.to_vec(), vec![0xAB, 0xCD]);
        drop(bits);
        assert_eq!(storage, [0xAB, 0xCD]);
    }

    #[test]
    fn terminator_must_fit_borrowed_buffer() {
        let mut storage = [0u8; 1];
        let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
        bits.pack(1, 3).unwrap();
        assert!(matches!(
            bits.insert_terminator(),
            Err(BitsError::BufferFull { needed: 8, capacity: 8 })
        ));
        assert_eq!(bits.len_bits(), 3);

        let mut storage = [0u8; 2];
        let mut bits = SpeexBits::for_writing(&mut storage).unwrap();
        bits.pack(1, 3).unwrap();
        bits.insert_terminator().unwrap();
        assert_eq!(bits.len_bits(), 8);
    }

    #[test]
    fn reset_erases_content() {
        let mut bits = SpeexBits::new();
        bits.pack(0x3FF, 10).unwrap();
        bits.reset();
        assert_eq!(bits.num_bytes(), 0);
        assert_eq!(bits.remaining(), 0);
    }
}
