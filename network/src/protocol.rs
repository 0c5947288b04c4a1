use std::fmt::{self, Display, Formatter};

/// Protocol number of the 1.16.100 release.
pub const PROTOCOL_1_16_100: u32 = 419;
/// Protocol number of the 1.17.0 release. This is the last protocol which cannot parse block layers
/// with zero bits per block.
pub const PROTOCOL_1_17_0: u32 = 440;
/// Protocol number of the 1.17.10 release.
pub const PROTOCOL_1_17_10: u32 = 448;
/// The newest protocol number supported.
pub const CURRENT_PROTOCOL: u32 = PROTOCOL_1_17_10;

/// The version tag written at the start of every encoded sub-chunk.
pub const SUB_CHUNK_VERSION: u8 = 8;

/// An equivalence class of wire protocols which share one block state to runtime id table.
///
/// A variant is identified by the lowest protocol number in its class, so it can be compared
/// directly against release protocol numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVariant(u32);

impl ProtocolVariant {
    /// Creates a variant identified by the given protocol number.
    pub const fn new(mapping_protocol: u32) -> Self {
        ProtocolVariant(mapping_protocol)
    }

    /// Returns the protocol number identifying this variant.
    #[inline]
    pub const fn protocol(&self) -> u32 {
        self.0
    }

    /// Returns the parameters the chunk codec should use for this variant.
    pub const fn encoding_params(&self) -> EncodingParams {
        EncodingParams {
            polyfill_zero_bits_per_block: self.0 <= PROTOCOL_1_17_0,
            persistent_block_states: false,
        }
    }
}

impl Display for ProtocolVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "protocol#{}", self.0)
    }
}

/// Version dependent parameters of the chunk codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingParams {
    /// Whether layers with zero bits per block must be sent as one bit per block instead.
    pub polyfill_zero_bits_per_block: bool,
    /// Whether palette entries are written as named block state records instead of runtime ids.
    pub persistent_block_states: bool,
}

impl EncodingParams {
    /// Returns these parameters with palette entries written as named block states.
    pub const fn persistent(mut self) -> Self {
        self.persistent_block_states = true;
        self
    }
}
