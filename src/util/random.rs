use rand::Rng;
use std::ops::RangeInclusive;
#[cfg(test)] use std::sync::Mutex;


#[cfg(test)]
/// automock expectations for static methods are global - hold this lock to avoid races
pub static MOCK_RANDOM_MUTEX: Mutex<()> = Mutex::new(());

/// Source of the simulated per-packet network jitter, abstracted so tests can pin the values
#[cfg_attr(test, mockall::automock)]
pub trait Random {
    fn gen_u64_range(range: RangeInclusive<u64>) -> u64;
}

pub struct RngRandom {}
impl Random for RngRandom {
    fn gen_u64_range(range: RangeInclusive<u64>) -> u64 {
        rand::thread_rng().gen_range(range)
    }
}
