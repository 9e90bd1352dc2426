//! Packet-level decoding trait for playback pipelines.

use anyhow::Result;

/// A decoder that turns one compressed packet into interleaved i16 PCM.
///
/// Implementations keep whatever state the format needs between packets
/// (filter memories, stereo balance, concealment history).
pub trait StreamDecoder: Send {
    /// Decode one packet into interleaved i16 PCM samples.
    fn decode(&mut self, data: &[u8]) -> Result<Vec<i16>>;

    /// Produce concealment audio for a packet that never arrived.
    fn decode_lost(&mut self) -> Result<Vec<i16>>;
}
