use core::ops::RangeFrom;
use std::{
    borrow::Cow,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use im::OrdMap;
use log::debug;
use snap::raw::{Decoder, Encoder};
use tap::Pipe as _;
use unwrap_none::UnwrapNone as _;

/// A single mutation in a batch passed to [`Database::apply_batch`].
#[derive(Clone, Copy, Debug)]
pub enum BatchOperation<K, V> {
    Put(K, V),
    Delete(K),
}

/// Key type whose string form starts with a fixed prefix.
///
/// Keys of different types must use prefixes that are not prefixes of each other's keys.
pub trait PrefixableKey {
    const PREFIX: &'static str;

    #[must_use]
    fn has_prefix(bytes: &[u8]) -> bool {
        bytes.starts_with(Self::PREFIX.as_bytes())
    }
}

/// Byte-oriented key-value store with atomic batches.
///
/// Values are compressed with Snappy. The map is persistent (in the functional sense),
/// so [`Database::copy`] and iterators are snapshots that later writes do not affect.
pub struct Database {
    // Various methods of `OrdMap` and `Database` clone the elements of this map,
    // so they should be cheaply cloneable. This disqualifies `Vec<u8>` and `Box<[u8]>`.
    map: Mutex<InMemoryMap>,
}

impl Database {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            map: Mutex::default(),
        }
    }

    /// Returns an independent database with the same contents.
    ///
    /// Writes to either database are not visible in the other.
    #[must_use]
    pub fn copy(&self) -> Self {
        let map = self
            .map
            .lock()
            .expect("in-memory database mutex is poisoned")
            .clone();

        debug!("copied database with {} entries", map.len());

        Self {
            map: Mutex::new(map),
        }
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        self.apply_batch(core::iter::once(BatchOperation::<_, &[u8]>::Delete(key)))
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        self.map
            .lock()
            .expect("in-memory database mutex is poisoned")
            .contains_key(key.as_ref())
            .pipe(Ok)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.map
            .lock()
            .expect("in-memory database mutex is poisoned")
            .get(key.as_ref())
            .map(|compressed| decompress(compressed))
            .transpose()
    }

    #[expect(clippy::type_complexity)]
    pub fn iterator_ascending(
        &self,
        range: RangeFrom<impl AsRef<[u8]>>,
    ) -> Result<impl Iterator<Item = Result<(Cow<'static, [u8]>, Vec<u8>)>>> {
        let start = range.start.as_ref();
        let map = self.map.lock().expect("in-memory database mutex is poisoned");
        let start_pair = map.get_key_value(start);
        let (_, mut above) = map.split(start);

        if let Some((key, value)) = start_pair {
            above
                .insert(Arc::clone(key), Arc::clone(value))
                .expect_none("start_pair should have been discarded by OrdMap::split");
        }

        above
            .into_iter()
            .map(|(key, value)| Ok((Cow::Owned(key.to_vec()), decompress(value.as_ref())?)))
            .pipe(Ok)
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_batch(core::iter::once((key, value)))
    }

    pub fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        self.apply_batch(
            pairs
                .into_iter()
                .map(|(key, value)| BatchOperation::Put(key, value)),
        )
    }

    /// Applies `operations` in order as a single atomic update.
    ///
    /// Readers observe either none or all of the operations.
    /// If any value fails to compress, the database is left unchanged.
    pub fn apply_batch(
        &self,
        operations: impl IntoIterator<Item = BatchOperation<impl AsRef<[u8]>, impl AsRef<[u8]>>>,
    ) -> Result<()> {
        let mut map = self.map.lock().expect("in-memory database mutex is poisoned");
        let mut new_map = map.clone();

        for operation in operations {
            match operation {
                BatchOperation::Put(key, value) => {
                    let key = key.as_ref().into();
                    let compressed = compress(value.as_ref())?.into();
                    new_map.insert(key, compressed);
                }
                BatchOperation::Delete(key) => {
                    new_map.remove(key.as_ref());
                }
            }
        }

        *map = new_map;

        Ok(())
    }
}

type InMemoryMap = OrdMap<Arc<[u8]>, Arc<[u8]>>;

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new().decompress_vec(data).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    type Constructor = fn() -> Result<Database>;

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_delete(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.delete("C")?;
        database.delete("D")?;

        assert_pairs_eq(
            database.iterator_ascending("A"..)?,
            [("A", "1"), ("B", "2"), ("E", "5")],
        )?;

        Ok(())
    }

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_contains_key(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        assert!(database.contains_key("A")?);
        assert!(database.contains_key("B")?);
        assert!(database.contains_key("C")?);
        assert!(!database.contains_key("D")?);
        assert!(database.contains_key("E")?);
        assert!(!database.contains_key("F")?);

        Ok(())
    }

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_iterator_ascending(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        assert_pairs_eq(
            database.iterator_ascending("0"..)?,
            [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")],
        )?;

        assert_pairs_eq(
            database.iterator_ascending("B"..)?,
            [("B", "2"), ("C", "3"), ("E", "5")],
        )?;

        assert_pairs_eq(database.iterator_ascending("D"..)?, [("E", "5")])?;
        assert_pairs_eq(database.iterator_ascending("E"..)?, [("E", "5")])?;
        assert_pairs_eq(database.iterator_ascending("F"..)?, [])?;

        Ok(())
    }

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_multiple_of_the_same_key(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.put_batch([("A", "1"), ("A", "2"), ("A", "3")])?;

        assert_eq!(database.get("A")?, Some(to_bytes("3")));

        Ok(())
    }

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_apply_batch_in_order(constructor: Constructor) -> Result<()> {
        let database = constructor()?;

        database.apply_batch([
            BatchOperation::Delete("A"),
            BatchOperation::Put("D", "4"),
            BatchOperation::Put("B", "20"),
            BatchOperation::Delete("D"),
            BatchOperation::Put("A", "10"),
            BatchOperation::Delete("E"),
        ])?;

        assert_pairs_eq(
            database.iterator_ascending("0"..)?,
            [("A", "10"), ("B", "20"), ("C", "3")],
        )?;

        Ok(())
    }

    #[test_case(build_in_memory_database)]
    #[test_case(build_copied_database)]
    fn test_isolation(constructor: Constructor) -> Result<()> {
        let database = constructor()?;
        let iterator = database.iterator_ascending("A"..)?;

        database.apply_batch(["A", "B", "C", "E"].map(BatchOperation::<_, &str>::Delete))?;

        assert_pairs_eq(iterator, [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")])?;
        assert_pairs_eq(database.iterator_ascending("0"..)?, [])?;

        Ok(())
    }

    #[test]
    fn test_copies_are_independent() -> Result<()> {
        let original = build_in_memory_database()?;
        let copy = original.copy();

        original.put("F", "6")?;
        copy.delete("A")?;
        copy.put("B", "22")?;

        assert_pairs_eq(
            original.iterator_ascending("0"..)?,
            [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5"), ("F", "6")],
        )?;

        assert_pairs_eq(
            copy.iterator_ascending("0"..)?,
            [("B", "22"), ("C", "3"), ("E", "5")],
        )?;

        Ok(())
    }

    fn build_in_memory_database() -> Result<Database> {
        let database = Database::in_memory();
        populate_database(&database)?;
        Ok(database)
    }

    fn build_copied_database() -> Result<Database> {
        let source = build_in_memory_database()?;
        let database = source.copy();
        source.put("Z", "26")?;
        Ok(database)
    }

    fn populate_database(database: &Database) -> Result<()> {
        // This indirectly tests `Database::put` and `Database::put_batch`.
        database.put_batch([("A", "1"), ("B", "2"), ("C", "3")])?;
        database.put("E", "5")?;
        Ok(())
    }

    fn assert_pairs_eq<'strings>(
        actual_pairs: impl IntoIterator<Item = Result<(impl AsRef<[u8]>, impl AsRef<[u8]>)>>,
        expected_pairs: impl IntoIterator<Item = (&'strings str, &'strings str)>,
    ) -> Result<()> {
        let actual_pairs = to_string_pairs(actual_pairs)?;
        let expected_pairs = to_string_pairs(expected_pairs.into_iter().map(Ok))?;

        assert_eq!(actual_pairs, expected_pairs);

        Ok(())
    }

    fn to_string_pairs(
        pairs: impl IntoIterator<Item = Result<(impl AsRef<[u8]>, impl AsRef<[u8]>)>>,
    ) -> Result<Vec<(String, String)>> {
        pairs
            .into_iter()
            .map(|result| {
                let (key, value) = result?;
                let key_string = core::str::from_utf8(key.as_ref())?;
                let value_string = core::str::from_utf8(value.as_ref())?;
                Ok((key_string.to_owned(), value_string.to_owned()))
            })
            .collect()
    }

    #[test]
    fn test_has_prefix() {
        struct Numbered;

        impl PrefixableKey for Numbered {
            const PREFIX: &'static str = "n";
        }

        assert!(Numbered::has_prefix(b"n00000000000000000001"));
        assert!(Numbered::has_prefix(b"n"));
        assert!(!Numbered::has_prefix(b"h00"));
        assert!(!Numbered::has_prefix(b""));
    }

    fn to_bytes(string: &str) -> Vec<u8> {
        string.as_bytes().to_vec()
    }
}
