//! Fletcher-64 checksum for index blocks and label slots
//!
//! The on-media checksum is a Fletcher variant over little-endian 32-bit
//! words: a wrapping 32-bit running sum and a wrapping 64-bit sum of
//! running sums, packed as `hi << 32 | lo`. Trailing bytes that do not
//! fill a whole word are not covered.
//!
//! Blocks are checksummed with their own checksum field zeroed, so both
//! verification and (re)computation go through [`checksum_with_field_zeroed`].

/// Streaming Fletcher-64 hasher.
///
/// Input may be fed in arbitrary pieces; partial words are carried over
/// between calls so the result equals a single pass over the concatenation.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
    lo: u32,
    hi: u64,
    pending: [u8; 4],
    pending_len: usize,
}

impl Hasher {
    /// Creates a hasher with zeroed sums.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds more bytes into the checksum.
    pub fn update(&mut self, mut data: &[u8]) {
        if self.pending_len > 0 {
            let take = (4 - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take]
                .copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < 4 {
                return;
            }
            let word = u32::from_le_bytes(self.pending);
            self.add_word(word);
            self.pending_len = 0;
        }

        let mut words = data.chunks_exact(4);
        for chunk in &mut words {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            self.add_word(word);
        }

        let rest = words.remainder();
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    /// Feeds `len` zero bytes, used to stand in for a zeroed checksum field.
    pub fn update_zeros(&mut self, len: usize) {
        const ZEROS: [u8; 8] = [0; 8];
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(ZEROS.len());
            self.update(&ZEROS[..take]);
            remaining -= take;
        }
    }

    #[inline]
    fn add_word(&mut self, word: u32) {
        self.lo = self.lo.wrapping_add(word);
        self.hi = self.hi.wrapping_add(self.lo as u64);
    }

    /// Returns the checksum. Any incomplete trailing word is ignored.
    pub fn finalize(&self) -> u64 {
        (self.hi << 32) | self.lo as u64
    }
}

/// Computes the Fletcher-64 checksum of `data` in one pass.
pub fn fletcher64(data: &[u8]) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Computes the checksum of `block` as if the 8-byte field at
/// `field_offset` were zero. The block itself is not modified.
///
/// A field that runs past the end of the block is clipped to it.
pub fn checksum_with_field_zeroed(block: &[u8], field_offset: usize) -> u64 {
    let start = field_offset.min(block.len());
    let end = (field_offset + 8).min(block.len());

    let mut hasher = Hasher::new();
    hasher.update(&block[..start]);
    hasher.update_zeros(end - start);
    hasher.update(&block[end..]);
    hasher.finalize()
}

/// Returns `true` when the checksum stored little-endian at `field_offset`
/// matches the recomputed checksum.
pub fn verify_checksum_field(block: &[u8], field_offset: usize) -> bool {
    if field_offset + 8 > block.len() {
        return false;
    }
    let mut stored = [0u8; 8];
    stored.copy_from_slice(&block[field_offset..field_offset + 8]);
    u64::from_le_bytes(stored) == checksum_with_field_zeroed(block, field_offset)
}
