use rustc_hash::{FxHashMap, FxHashSet};

pub type HashMap<K, V> = FxHashMap<K, V>;

pub type HashSet<K> = FxHashSet<K>;

/// Read access to a flat buffer by global index, whether it is held as one slice or as
/// chunks owned by different workers.
pub trait ReadBuf<T> {
    fn at(&self, idx: usize) -> &T;
}

impl<T> ReadBuf<T> for [T] {
    fn at(&self, idx: usize) -> &T {
        &self[idx]
    }
}

impl<T> ReadBuf<T> for Vec<T> {
    fn at(&self, idx: usize) -> &T {
        &self[idx]
    }
}
