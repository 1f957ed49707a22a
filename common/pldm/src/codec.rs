// Licensed under the Apache-2.0 license

use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Codec failure modes. `MsgTooShort` covers both truncated inputs and
/// undersized output buffers; `InvalidLength` flags a variable-length field
/// whose declared size is inconsistent with the enclosing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    MsgTooShort,
    InvalidLength,
    Unsupported,
}

/// Binary serialization of a PLDM message or message fragment.
///
/// Encoders are length-exact: they write precisely the bytes the protocol
/// defines, little-endian for multi-byte integers, and report the number of
/// bytes produced. Decoders bounds-check every field against the input and
/// never read past it.
pub trait PldmCodec: core::fmt::Debug + Sized {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError>;

    fn decode(buffer: &[u8]) -> Result<Self, CodecError>;
}

// Fixed-layout messages get their codec from zerocopy; only messages with
// variable-length tails carry hand-written impls.
impl<T> PldmCodec for T
where
    T: core::fmt::Debug + Sized + FromBytes + IntoBytes + Immutable,
{
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        self.write_to_prefix(buffer)
            .map_err(|_| CodecError::MsgTooShort)
            .map(|_| core::mem::size_of::<T>())
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        Ok(Self::read_from_prefix(buffer)
            .map_err(|_| CodecError::MsgTooShort)?
            .0)
    }
}
