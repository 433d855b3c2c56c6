//! The entry registry keeps track of all known [`Entry`] implementations.
//!
//! The registry is needed to instantiate the correct types when loading WAL
//! segments from disk.

use crate::entry::{Entry, EntryType};
use crate::error::WalError;
use std::collections::HashMap;

/// Constructor function of a specific [`Entry`] implementation. Constructors
/// must produce a fresh, zero-valued instance.
pub type EntryConstructor = fn() -> Box<dyn Entry>;

/// Maps entry type tags to their constructors.
///
/// The registry is immutable once the WAL has been constructed, so shared
/// read access needs no synchronization.
#[derive(Default)]
pub struct EntryRegistry {
    constructors: HashMap<EntryType, EntryConstructor>,
}

impl EntryRegistry {
    /// Creates an empty registry. Use [`register`](EntryRegistry::register)
    /// to add constructors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from the given constructors. Each constructor must
    /// create a unique `Entry` implementation, i.e. one which returns a
    /// unique [`EntryType`].
    ///
    /// # Panics
    ///
    /// Panics if two constructors report the same entry type.
    pub fn with_constructors(constructors: impl IntoIterator<Item = EntryConstructor>) -> Self {
        let mut registry = Self::new();
        for constructor in constructors {
            if let Err(err) = registry.register(constructor) {
                panic!("{err}");
            }
        }
        registry
    }

    /// Registers an [`EntryConstructor`] under the [`EntryType`] reported by
    /// the entry it constructs. Fails if a constructor was already registered
    /// for the same type.
    pub fn register(&mut self, constructor: EntryConstructor) -> Result<(), WalError> {
        let entry_type = constructor().entry_type();
        if self.constructors.contains_key(&entry_type) {
            return Err(WalError::DuplicateEntryType(entry_type.as_u8()));
        }

        self.constructors.insert(entry_type, constructor);
        Ok(())
    }

    /// Instantiates a fresh [`Entry`] for the requested type. Fails if no
    /// constructor was registered for this type.
    pub fn new_entry(&self, entry_type: EntryType) -> Result<Box<dyn Entry>, WalError> {
        match self.constructors.get(&entry_type) {
            Some(constructor) => Ok(constructor()),
            None => Err(WalError::UnknownEntryType(entry_type.as_u8())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waltest::{ExampleEntry1, ExampleEntry2, EXAMPLE_ENTRY_1, EXAMPLE_ENTRY_2};

    #[test]
    fn register_and_new_entry() {
        let mut registry = EntryRegistry::new();
        registry
            .register(|| Box::new(ExampleEntry1::default()))
            .unwrap();
        registry
            .register(|| Box::new(ExampleEntry2::default()))
            .unwrap();

        let entry = registry.new_entry(EXAMPLE_ENTRY_1).unwrap();
        assert_eq!(entry.entry_type(), EXAMPLE_ENTRY_1);

        let entry = registry.new_entry(EXAMPLE_ENTRY_2).unwrap();
        assert_eq!(entry.entry_type(), EXAMPLE_ENTRY_2);
    }

    #[test]
    fn register_duplicate_type() {
        let mut registry = EntryRegistry::new();
        registry
            .register(|| Box::new(ExampleEntry1::default()))
            .unwrap();

        let err = registry
            .register(|| Box::new(ExampleEntry1::default()))
            .unwrap_err();
        assert_eq!(err.to_string(), "entry type 0 was already registered");
    }

    #[test]
    fn new_entry_unknown_type() {
        let registry = EntryRegistry::new();
        let err = registry.new_entry(EntryType(255)).unwrap_err();
        assert_eq!(err.to_string(), "unknown WAL entry type ff");
    }

    #[test]
    #[should_panic(expected = "entry type 0 was already registered")]
    fn with_constructors_panics_on_duplicate() {
        let constructors: [EntryConstructor; 2] = [
            || Box::new(ExampleEntry1::default()),
            || Box::new(ExampleEntry1::default()), // same type registered twice
        ];
        EntryRegistry::with_constructors(constructors);
    }
}
