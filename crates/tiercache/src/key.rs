//! Key identity for cached entries

use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

/// A key usable by [`CacheEngine`](crate::CacheEngine).
///
/// Keys are looked up by hash and equality. `is_valid` lets a key type
/// express "no identity" (the `None` of an `Option<T>` key); the engine
/// rejects such keys with [`Error::InvalidArgument`](crate::Error) instead
/// of storing or looking them up.
///
/// Custom key types opt in with an empty impl:
///
/// ```
/// use tiercache::CacheKey;
///
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct QueryShape(String);
///
/// impl CacheKey for QueryShape {}
/// ```
pub trait CacheKey: Hash + Eq + Clone {
    /// Whether this key carries an identity
    fn is_valid(&self) -> bool {
        true
    }
}

macro_rules! always_valid {
    ($($ty:ty),* $(,)?) => {
        $(impl CacheKey for $ty {})*
    };
}

always_valid!(
    u8, u16, u32, u64, u128, usize,
    i8, i16, i32, i64, i128, isize,
    bool, char, String, &'static str, Box<str>, Arc<str>, Rc<str>, Vec<u8>,
);

impl<T: CacheKey> CacheKey for Option<T> {
    fn is_valid(&self) -> bool {
        self.as_ref().is_some_and(CacheKey::is_valid)
    }
}

impl<A: CacheKey, B: CacheKey> CacheKey for (A, B) {
    fn is_valid(&self) -> bool {
        self.0.is_valid() && self.1.is_valid()
    }
}
