use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// The number of blocks in one sub-chunk layer.
pub const BLOCKS_PER_LAYER: usize = 4096;
/// Every bits-per-block value the wire format can represent, in ascending order.
pub const VALID_BITS_PER_BLOCK: [u8; 9] = [0, 1, 2, 3, 4, 5, 6, 8, 16];

/// A paletted array of the block states in one 16x16x16 layer.
///
/// Each position stores an index into the palette using `bits_per_block` bits. Indices are packed
/// into 32-bit words, `32 / bits_per_block` to a word, and never span two words. Positions are
/// ordered `(x << 8) | (z << 4) | y`. A layer with zero bits per block stores no words, and every
/// position refers to the single palette entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PalettedBlockArray {
    bits_per_block: u8,
    words: Vec<u32>,
    palette: Vec<u32>,
}

impl PalettedBlockArray {
    /// Creates a layer uniformly filled with the given state.
    pub fn fill(state: u32) -> Self {
        PalettedBlockArray {
            bits_per_block: 0,
            words: Vec::new(),
            palette: vec![state],
        }
    }

    /// Creates a layer from raw packed data, validating that the word array and palette are
    /// consistent with the bits per block.
    pub fn from_data(
        bits_per_block: u8,
        words: Vec<u32>,
        palette: Vec<u32>,
    ) -> Result<Self, BlockArrayError> {
        if !VALID_BITS_PER_BLOCK.contains(&bits_per_block) {
            return Err(BlockArrayError::InvalidBitsPerBlock(bits_per_block));
        }

        let expected = Self::expected_word_array_size(bits_per_block);
        if words.len() != expected {
            return Err(BlockArrayError::WordArraySize {
                expected,
                actual: words.len(),
            });
        }

        if palette.is_empty() || palette.len() > 1usize << bits_per_block {
            return Err(BlockArrayError::PaletteSize {
                bits_per_block,
                len: palette.len(),
            });
        }

        Ok(PalettedBlockArray {
            bits_per_block,
            words,
            palette,
        })
    }

    /// Builds a layer from one state per position, using the smallest bits per block able to
    /// index the palette. Palette entries are ordered by first occurrence.
    pub fn from_states(states: &[u32; BLOCKS_PER_LAYER]) -> Self {
        let mut palette: Vec<u32> = Vec::new();
        let mut indices = Vec::with_capacity(BLOCKS_PER_LAYER);

        for &state in states.iter() {
            let index = match palette.iter().position(|&entry| entry == state) {
                Some(index) => index,
                None => {
                    palette.push(state);
                    palette.len() - 1
                }
            };
            indices.push(index as u32);
        }

        if palette.len() == 1 {
            return Self::fill(palette[0]);
        }

        let bits_per_block = Self::bits_per_block_for(palette.len());
        let mut words = vec![0u32; Self::expected_word_array_size(bits_per_block)];
        let mut cursor = WordCursor::new(bits_per_block);
        for index in indices {
            cursor.write_index(&mut words, index);
        }

        PalettedBlockArray {
            bits_per_block,
            words,
            palette,
        }
    }

    /// Returns the smallest legal bits per block able to index a palette of the given length.
    pub fn bits_per_block_for(palette_len: usize) -> u8 {
        VALID_BITS_PER_BLOCK
            .iter()
            .copied()
            .find(|&bits| 1usize << bits >= palette_len)
            .unwrap_or(16)
    }

    /// Returns the number of words needed to store one layer at the given bits per block.
    pub const fn expected_word_array_size(bits_per_block: u8) -> usize {
        if bits_per_block == 0 {
            return 0;
        }

        let blocks_per_word = 32 / bits_per_block as usize;
        (BLOCKS_PER_LAYER + blocks_per_word - 1) / blocks_per_word
    }

    #[inline]
    pub fn bits_per_block(&self) -> u8 {
        self.bits_per_block
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub fn palette(&self) -> &[u32] {
        &self.palette
    }

    /// Returns the state at the given local coordinates, each in `0 .. 16`.
    pub fn get(&self, x: usize, y: usize, z: usize) -> u32 {
        let offset = (x << 8) | (z << 4) | y;
        self.palette
            .get(self.index_at(offset))
            .copied()
            .unwrap_or(self.palette[0])
    }

    fn index_at(&self, offset: usize) -> usize {
        if self.bits_per_block == 0 {
            return 0;
        }

        let bits = self.bits_per_block as usize;
        let blocks_per_word = 32 / bits;
        let word = self.words[offset / blocks_per_word];
        let shift = (offset % blocks_per_word) * bits;
        ((word >> shift) & ((1u32 << bits) - 1)) as usize
    }

    /// Returns whether every position in this layer holds the given state.
    pub fn is_uniform(&self, state: u32) -> bool {
        // Quick check, avoids scanning the word array in the common case
        if self.palette.iter().all(|&entry| entry == state) {
            return true;
        }

        (0 .. BLOCKS_PER_LAYER)
            .map(|offset| self.palette.get(self.index_at(offset)).copied())
            .all(|entry| entry == Some(state))
    }
}

// Writes indices sequentially, skipping the padding bits at the end of each word
struct WordCursor {
    cursor: usize,
    bits: usize,
}

impl WordCursor {
    fn new(bits_per_block: u8) -> Self {
        WordCursor {
            cursor: 0,
            bits: bits_per_block as usize,
        }
    }

    fn write_index(&mut self, dest: &mut [u32], index: u32) {
        let word_index = self.cursor / 32;
        let bit_index = self.cursor % 32;

        debug_assert!(
            index < (1 << self.bits),
            "Index must be able to fit in allocated bits"
        );

        if let Some(word) = dest.get_mut(word_index) {
            *word |= index << bit_index;
        }

        if bit_index + 2 * self.bits > 32 {
            self.cursor += 32 - bit_index;
        } else {
            self.cursor += self.bits;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockArrayError {
    InvalidBitsPerBlock(u8),
    WordArraySize { expected: usize, actual: usize },
    PaletteSize { bits_per_block: u8, len: usize },
}

impl Display for BlockArrayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BlockArrayError::InvalidBitsPerBlock(bits) =>
                write!(f, "Invalid bits per block: {}", bits),
            BlockArrayError::WordArraySize { expected, actual } => write!(
                f,
                "Expected {} words in block array, found {}",
                expected, actual
            ),
            BlockArrayError::PaletteSize {
                bits_per_block,
                len,
            } => write!(
                f,
                "Palette of {} entries cannot be indexed with {} bits per block",
                len, bits_per_block
            ),
        }
    }
}

impl Error for BlockArrayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_array_sizes() {
        assert_eq!(PalettedBlockArray::expected_word_array_size(0), 0);
        assert_eq!(PalettedBlockArray::expected_word_array_size(1), 128);
        assert_eq!(PalettedBlockArray::expected_word_array_size(3), 410);
        assert_eq!(PalettedBlockArray::expected_word_array_size(5), 683);
        assert_eq!(PalettedBlockArray::expected_word_array_size(16), 2048);
    }

    #[test]
    fn smallest_bits_per_block() {
        assert_eq!(PalettedBlockArray::bits_per_block_for(1), 0);
        assert_eq!(PalettedBlockArray::bits_per_block_for(2), 1);
        assert_eq!(PalettedBlockArray::bits_per_block_for(5), 3);
        assert_eq!(PalettedBlockArray::bits_per_block_for(65), 8);
        assert_eq!(PalettedBlockArray::bits_per_block_for(300), 16);
    }

    #[test]
    fn states_are_packed_and_read_back() {
        let mut states = [0u32; BLOCKS_PER_LAYER];
        for (offset, state) in states.iter_mut().enumerate() {
            *state = (offset % 5) as u32 * 16;
        }

        let layer = PalettedBlockArray::from_states(&states);
        assert_eq!(layer.bits_per_block(), 3);
        assert_eq!(layer.palette(), &[0, 16, 32, 48, 64]);
        assert_eq!(layer.words().len(), 410);

        for x in [0, 7, 15] {
            for y in [0, 3, 15] {
                for z in [0, 9, 15] {
                    let offset = (x << 8) | (z << 4) | y;
                    assert_eq!(layer.get(x, y, z), states[offset], "Mismatch at {}", offset);
                }
            }
        }
    }

    #[test]
    fn uniform_states_collapse_to_zero_bits() {
        let layer = PalettedBlockArray::from_states(&[7u32; BLOCKS_PER_LAYER]);
        assert_eq!(layer, PalettedBlockArray::fill(7));
        assert!(layer.is_uniform(7));
        assert!(!layer.is_uniform(0));
    }

    #[test]
    fn unreferenced_palette_entries_do_not_break_uniformity() {
        let layer =
            PalettedBlockArray::from_data(1, vec![0; 128], vec![0, 5]).expect("Valid layer");
        assert!(layer.is_uniform(0), "Only index 0 is referenced");
    }

    #[test]
    fn inconsistent_data_is_rejected() {
        assert_eq!(
            PalettedBlockArray::from_data(7, vec![], vec![0]),
            Err(BlockArrayError::InvalidBitsPerBlock(7))
        );
        assert_eq!(
            PalettedBlockArray::from_data(1, vec![0; 4], vec![0]),
            Err(BlockArrayError::WordArraySize {
                expected: 128,
                actual: 4
            })
        );
        assert!(PalettedBlockArray::from_data(1, vec![0; 128], vec![0, 1, 2]).is_err());
    }
}
