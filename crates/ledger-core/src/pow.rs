use crate::block::Block;

/// Number of leading `'0'` characters in a hex hash.
pub fn leading_zero_hex_digits(hash: &str) -> u32 {
    hash.bytes().take_while(|b| *b == b'0').count() as u32
}

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_hex_digits(hash) >= difficulty
}

/// Mine the block by incrementing the nonce, starting from its current value,
/// until the hash has at least `difficulty` leading zero hex digits.
///
/// Starting from nonce 0 this always finds the smallest satisfying nonce.
/// Unbounded: at high difficulty it may never return.
pub fn mine_block(block: Block, difficulty: u32) -> Block {
    let template = block.seal_template();
    let mut nonce = block.nonce();
    loop {
        let hash = template.hash_with_nonce(nonce);
        if meets_difficulty(&hash, difficulty) {
            return block.with_sealed_nonce(nonce, hash);
        }
        nonce = nonce.wrapping_add(1);
    }
}
