//! Safe layer over the native Speex codec.

pub mod bits;
pub mod callbacks;
pub mod control;
pub mod decoder;
pub mod duplex;
pub mod encoder;
pub mod error;
pub mod header;
pub mod mode;
pub mod packet_codec;
pub mod stereo;
pub mod stream_decoder;

pub use bits::SpeexBits;
pub use callbacks::{InbandId, InbandRequest, MAX_USER_MESSAGE_LEN, write_user_message};
pub use control::ControlFunctions;
pub use decoder::{DynamicDecoder, SpeexDecoder};
pub use duplex::SpeexDuplex;
pub use encoder::{DynamicEncoder, SpeexEncoder};
pub use error::{
    BitsError, ControlError, DecoderError, EncodeError, Error, HeaderError, InbandError,
    ModeError, Result, StereoError, StreamError,
};
pub use header::{HEADER_SIZE, HeaderInfo, SpeexHeader};
pub use mode::{
    CoderMode, ModeId, NbMode, NbSubmodeId, UwbMode, UwbSubmodeId, WbMode, WbSubmodeId,
};
pub use packet_codec::{MAX_FRAMES_PER_PACKET, PacketDecoder, PacketEncoder};
pub use stereo::{StereoState, encode_stereo, encode_stereo_int};
pub use stream_decoder::StreamDecoder;
