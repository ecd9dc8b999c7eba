/// FITS block size in bytes. Header and data segments are both aligned to it.
pub const BLOCK_SIZE: u64 = 2880;

/// FITS card (keyword record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards that fit in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE as usize / CARD_SIZE;

/// Padding byte used for header blocks (ASCII space).
pub const HEADER_PAD_BYTE: u8 = 0x20;

/// Padding byte used for data blocks (zero).
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Returns the number of FITS blocks required to hold `num_bytes` bytes.
///
/// This is a ceiling division: 0 bytes requires 0 blocks, 1 byte requires 1
/// block, 2880 bytes requires 1 block, 2881 bytes requires 2 blocks, etc.
pub const fn blocks_needed(num_bytes: u64) -> u64 {
    if num_bytes == 0 {
        return 0;
    }
    (num_bytes - 1) / BLOCK_SIZE + 1
}

/// Returns the total byte length (in whole blocks) required to hold `num_bytes`.
pub const fn padded_byte_len(num_bytes: u64) -> u64 {
    blocks_needed(num_bytes) * BLOCK_SIZE
}

/// Number of pad bytes that bring a stream of `num_bytes` up to the next block
/// boundary. Already-aligned lengths need none.
pub const fn padding_for(num_bytes: u64) -> u64 {
    padded_byte_len(num_bytes) - num_bytes
}
