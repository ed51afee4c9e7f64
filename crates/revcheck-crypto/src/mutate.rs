use rand::Rng;

use crate::error::{VerifyError, VerifyResult};

/// Copy `input` with one uniformly chosen bit flipped.
///
/// Only meant for building negative fixtures in tests and demos.
pub fn flip_random_bit(input: &[u8]) -> VerifyResult<Vec<u8>> {
    flip_bit_with(input, &mut rand::thread_rng())
}

/// Same as [`flip_random_bit`] with a caller-supplied RNG.
pub fn flip_bit_with<R: Rng + ?Sized>(input: &[u8], rng: &mut R) -> VerifyResult<Vec<u8>> {
    if input.is_empty() {
        return Err(VerifyError::EmptyInput);
    }
    let byte = rng.gen_range(0..input.len());
    let bit = rng.gen_range(0..8u32);
    let mut altered = input.to_vec();
    altered[byte] ^= 1 << bit;
    Ok(altered)
}
