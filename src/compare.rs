use std::{cmp::Ordering, sync::Arc};

/// Three-way comparison of byte strings.
///
/// Implementations must define a total order that is consistent with byte-wise equality,
/// i.e. two keys compare as [`Ordering::Equal`] only if they have the same length and content.
/// Any state a comparison needs is held by the comparator itself, closures
/// `Fn(&[u8], &[u8]) -> Ordering` implement this trait.
pub trait Comparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

impl<F> Comparator for F
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self(a, b)
    }
}

/// Compares keys byte by byte, a key that is a prefix of another one is smaller.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lexicographic;

impl Comparator for Lexicographic {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

pub type SharedComparator = Arc<dyn Comparator>;

pub fn default_comparator() -> SharedComparator {
    Arc::new(Lexicographic)
}

/// Hash function for byte strings.
pub trait KeyHasher: Send + Sync {
    fn hash(&self, key: &[u8]) -> u32;
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u32 + Send + Sync,
{
    fn hash(&self, key: &[u8]) -> u32 {
        self(key)
    }
}

/// 32-bit FNV-1a hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fnv1a;

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

impl KeyHasher for Fnv1a {
    fn hash(&self, key: &[u8]) -> u32 {
        key.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
            (hash ^ u32::from(*b)).wrapping_mul(FNV_PRIME)
        })
    }
}

pub type SharedHasher = Arc<dyn KeyHasher>;

pub fn default_hasher() -> SharedHasher {
    Arc::new(Fnv1a)
}
