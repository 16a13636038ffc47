use rand::SeedableRng;
use rand_chacha::ChaChaRng;

/// Deterministic RNG, one stream per `seed`.
pub(crate) fn rng(seed: u8) -> ChaChaRng {
    ChaChaRng::from_seed([seed; 32])
}

pub(crate) fn assert_send<T>(_: &T)
where
    T: Send,
{
}
