//! Interned string identifiers
//!
//! Resource ids and shader ids are compared and hashed constantly, so they are
//! interned once into a process-wide table and passed around as a small
//! [`StringId`]. Equal strings always map to the same id: the table looks the
//! string up in a map before allocating, it never trusts a hash alone.

use super::pool::{Handle, Pool, PoolError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Default)]
struct Interner {
    strings: Pool<Arc<str>>,
    lookup: HashMap<Arc<str>, Handle<Arc<str>>>,
}

impl Interner {
    fn intern(&mut self, value: &str) -> Result<Handle<Arc<str>>, PoolError> {
        if let Some(&handle) = self.lookup.get(value) {
            return Ok(handle);
        }
        let shared: Arc<str> = Arc::from(value);
        let handle = self.strings.allocate(shared.clone())?;
        self.lookup.insert(shared, handle);
        Ok(handle)
    }
}

fn interner() -> &'static RwLock<Interner> {
    static INTERNER: OnceLock<RwLock<Interner>> = OnceLock::new();
    INTERNER.get_or_init(|| RwLock::new(Interner::default()))
}

/// Cheap, comparable handle to an interned string
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(Handle<Arc<str>>);

impl StringId {
    /// Intern `value`, returning the existing id if it was seen before
    ///
    /// # Panics
    ///
    /// Panics once 65,536 distinct strings are interned. Ids read from data
    /// files go through [`StringId::try_new`] instead.
    pub fn new(value: &str) -> Self {
        match Self::try_new(value) {
            Ok(id) => id,
            Err(err) => panic!("string interner exhausted while interning '{value}': {err}"),
        }
    }

    /// Intern `value`, failing when the table is full and `value` is new
    pub fn try_new(value: &str) -> Result<Self, PoolError> {
        if let Some(id) = Self::lookup(value) {
            return Ok(id);
        }

        // Another thread may insert between the read and write lock; `intern` looks again.
        let mut table = interner()
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        table.intern(value).map(Self).map_err(|err| {
            log::error!("String interner full while interning '{}': {}", value, err);
            err
        })
    }

    /// Find an already interned string without inserting it
    pub fn lookup(value: &str) -> Option<Self> {
        let table = interner()
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        table.lookup.get(value).copied().map(Self)
    }

    /// The interned text
    pub fn as_str(self) -> Arc<str> {
        let table = interner()
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        table
            .strings
            .get(self.0)
            .cloned()
            .unwrap_or_else(|| Arc::from(""))
    }

    /// Underlying pool handle
    pub fn handle(self) -> Handle<Arc<str>> {
        self.0
    }
}

impl From<&str> for StringId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&String> for StringId {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl fmt::Debug for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringId({:?})", &*self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_string_same_id() {
        let a = StringId::new("mesh:cube");
        let b = StringId::from("mesh:cube");
        assert_eq!(a, b);
        assert_eq!(&*a.as_str(), "mesh:cube");
    }

    #[test]
    fn test_distinct_strings_distinct_ids() {
        let a = StringId::new("shader:pbr");
        let b = StringId::new("shader:gizmo");
        assert_ne!(a, b);
    }

    #[test]
    fn test_lookup_does_not_insert() {
        assert_eq!(StringId::lookup("string_id:never-interned"), None);
        let id = StringId::new("string_id:interned-now");
        assert_eq!(StringId::lookup("string_id:interned-now"), Some(id));
    }

    #[test]
    fn test_display() {
        assert_eq!(StringId::new("textures/stone.png").to_string(), "textures/stone.png");
    }

    #[test]
    fn test_full_table_rejects_only_new_strings() {
        let mut table = Interner::default();
        for i in 0..crate::foundation::pool::MAX_POOL_SLOTS {
            table.intern(&format!("id{i}")).unwrap();
        }
        assert!(matches!(table.intern("one too many"), Err(PoolError::Exhausted(_))));
        assert!(table.intern("id42").is_ok());
        assert!(!table.lookup.contains_key("one too many"));
    }
}
