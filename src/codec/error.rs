//! Error types for the safe codec layer.

use thiserror::Error;

/// Top-level error for the codec layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Bitstream error: {0}")]
    Bits(#[from] BitsError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecoderError),

    #[error("Header error: {0}")]
    Header(#[from] HeaderError),

    #[error("Stereo error: {0}")]
    Stereo(#[from] StereoError),

    #[error("In-band error: {0}")]
    Inband(#[from] InbandError),

    #[error("Mode error: {0}")]
    Mode(#[from] ModeError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}

/// Errors raised by the bit-packing buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitsError {
    /// Bit counts must lie in `1..=32`.
    #[error("Invalid bit count {0}, expected 1..=32")]
    InvalidBitCount(i32),

    /// Not enough unread bits left in the stream.
    #[error("Requested {requested} bits but only {remaining} remain")]
    Exhausted { requested: i32, remaining: i32 },

    /// A borrowed buffer cannot grow.
    #[error("Buffer full: need {needed} bits, capacity is {capacity} bits")]
    BufferFull { needed: i64, capacity: i64 },

    /// The library flagged the stream as overflowed.
    #[error("Bitstream overflowed")]
    Overflow,

    /// Borrowed buffers must hold at least one byte.
    #[error("Borrowed bit buffer is empty")]
    EmptyBuffer,
}

/// Errors from the encoder/decoder control functions.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The request type passed to the control function is not known.
    #[error("Unknown request type passed to a control function ({0})")]
    UnknownRequest(i32),

    /// The library rejected the parameter of the request.
    #[error("Invalid parameter for request {0}")]
    InvalidParameter(i32),

    #[error("Unexpected return code {code} for request {request}")]
    Unexpected { request: i32, code: i32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Failed to allocate encoder state")]
    Allocation,

    /// Input holds fewer samples than one frame.
    #[error("Frame needs {needed} samples, got {got}")]
    FrameSize { needed: usize, got: usize },

    #[error(transparent)]
    Bits(#[from] BitsError),

    #[error(transparent)]
    Control(#[from] ControlError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderError {
    #[error("Failed to allocate decoder state")]
    Allocation,

    #[error("Buffer is too small to decode into")]
    TooSmallBuffer,

    #[error("End of stream reached while decoding")]
    EndOfStream,

    #[error("Corrupt stream was unable to be decoded")]
    CorruptStream,

    #[error("Stereo decoding was requested but is not enabled")]
    StereoDisabled,

    #[error("Unexpected return value {0} from the decoder")]
    Unexpected(i32),

    #[error(transparent)]
    Control(#[from] ControlError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Header packet too short: {0} bytes, need 80")]
    TooShort(usize),

    #[error("Header packet does not start with the Speex magic")]
    BadMagic,

    #[error("Header names unknown mode {0}")]
    InvalidMode(i32),

    #[error("The library rejected the header packet")]
    Rejected,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoError {
    #[error("Stereo frame needs {needed} interleaved samples, got {got}")]
    FrameSize { needed: usize, got: usize },

    #[error("Failed to allocate stereo state")]
    Allocation,

    #[error(transparent)]
    Bits(#[from] BitsError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InbandError {
    #[error("User message of {0} bytes exceeds the 15 byte limit")]
    MessageTooLong(usize),

    #[error("In-band id {0} does not fit in 4 bits")]
    InvalidId(u8),

    #[error("Payload does not fit the {bits} bits of in-band id {id}")]
    PayloadTooWide { id: u8, bits: u32 },

    #[error(transparent)]
    Bits(#[from] BitsError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error(transparent)]
    Stereo(#[from] StereoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("Unknown mode id {0}")]
    UnknownMode(i32),

    #[error("Unknown mode name '{0}'")]
    UnknownModeName(String),

    #[error("Invalid submode id {0}")]
    InvalidSubmode(i32),
}

/// Errors reading or writing a framed `.spxs` stream.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream does not start with the SPXS magic")]
    BadMagic,

    #[error("Stream ended before the header record")]
    MissingHeader,

    #[error("Record of {0} bytes exceeds the 64 KiB limit")]
    RecordTooLarge(usize),

    #[error("Truncated record: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
