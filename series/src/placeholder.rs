use rand::Rng;
use serde::Serialize;

/// Stand-in per-label category series shown by the frontend. The values carry
/// no meaning and are only produced when explicitly enabled.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PlaceholderCategories {
    pub djt: Vec<u32>,
    pub nft: Vec<u32>,
    pub other: Vec<u32>,
}

pub trait CategorySource: Send + Sync {
    fn categories(&self, label_count: usize) -> PlaceholderCategories;
}

/// Uniform integers in `0..100`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomCategories;

impl CategorySource for RandomCategories {
    fn categories(&self, label_count: usize) -> PlaceholderCategories {
        let mut rng = rand::thread_rng();
        let mut series = || -> Vec<u32> { (0..label_count).map(|_| rng.gen_range(0..100)).collect() };

        PlaceholderCategories {
            djt: series(),
            nft: series(),
            other: series(),
        }
    }
}
