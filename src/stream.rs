//! `.spxs` framed streams: a 4-byte `SPXS` magic, then records of a
//! little-endian `u32` length followed by that many bytes. The first record
//! is the Speex header packet, every following record one audio packet.

use std::io::{self, Read, Write};

use crate::codec::{SpeexHeader, StreamError};

pub const STREAM_MAGIC: &[u8; 4] = b"SPXS";
/// Largest record accepted on either side.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

// ======================== Writer ========================

pub struct StreamWriter<W: Write> {
    writer: W,
    packets: u64,
}

impl<W: Write> StreamWriter<W> {
    /// Writes the magic and the header record.
    pub fn new(mut writer: W, header: &SpeexHeader) -> Result<Self, StreamError> {
        writer.write_all(STREAM_MAGIC)?;
        write_record(&mut writer, &header.to_packet())?;
        Ok(Self { writer, packets: 0 })
    }

    pub fn write_packet(&mut self, packet: &[u8]) -> Result<(), StreamError> {
        write_record(&mut self.writer, packet)?;
        self.packets += 1;
        Ok(())
    }

    /// Audio packets written so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }

    /// Flushes and hands back the underlying writer.
    pub fn finish(mut self) -> Result<W, StreamError> {
        self.writer.flush()?;
        log::debug!("Stream finished after {} packets", self.packets);
        Ok(self.writer)
    }
}

fn write_record<W: Write>(writer: &mut W, record: &[u8]) -> Result<(), StreamError> {
    if record.len() > MAX_RECORD_LEN {
        return Err(StreamError::RecordTooLarge(record.len()));
    }
    writer.write_all(&(record.len() as u32).to_le_bytes())?;
    writer.write_all(record)?;
    Ok(())
}

// ======================== Reader ========================

pub struct StreamReader<R: Read> {
    reader: R,
    header: SpeexHeader,
}

impl<R: Read> StreamReader<R> {
    /// Checks the magic and parses the header record.
    pub fn new(mut reader: R) -> Result<Self, StreamError> {
        let mut magic = [0u8; 4];
        if read_full(&mut reader, &mut magic)? != magic.len() || &magic != STREAM_MAGIC {
            return Err(StreamError::BadMagic);
        }
        let packet = read_record(&mut reader)?.ok_or(StreamError::MissingHeader)?;
        let header = SpeexHeader::from_packet(&packet)?;
        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &SpeexHeader {
        &self.header
    }

    /// Next audio packet, `None` at a clean end of stream.
    pub fn next_packet(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        read_record(&mut self.reader)
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<Vec<u8>, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}

/// Reads until `buf` is full or the input ends. Returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_record<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, StreamError> {
    let mut len_bytes = [0u8; 4];
    match read_full(reader, &mut len_bytes)? {
        0 => return Ok(None),
        4 => {}
        got => return Err(StreamError::Truncated { expected: 4, got }),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_RECORD_LEN {
        return Err(StreamError::RecordTooLarge(len));
    }
    let mut record = vec![0u8; len];
    let got = read_full(reader, &mut record)?;
    if got != len {
        return Err(StreamError::Truncated { expected: len, got });
    }
    Ok(Some(record))
}
