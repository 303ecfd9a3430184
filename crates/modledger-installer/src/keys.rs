use modledger_core::ModKey;
use rand::Rng;

const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub(crate) fn random_key_candidate(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// Draws candidates until one is not taken.
pub(crate) fn generate_key(
    mut next_candidate: impl FnMut() -> String,
    is_taken: impl Fn(&ModKey) -> bool,
) -> ModKey {
    loop {
        let key = ModKey::new(next_candidate());
        if !is_taken(&key) {
            return key;
        }
    }
}
