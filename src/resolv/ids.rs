//! Allocation of transaction IDs.
//!
//! Every outstanding request needs a message ID that is unique among all
//! outstanding requests so that replies can be matched up with them. The
//! [`IdMap`] hands out the smallest ID not currently in use and maps IDs
//! back to the request they belong to.

use super::arena::Key;
use super::error::Error;
use std::collections::BTreeMap;

//------------ IdMap ---------------------------------------------------------

/// The map of transaction IDs currently in use.
#[derive(Debug, Default)]
pub struct IdMap {
    /// The IDs in use and the requests they belong to.
    ids: BTreeMap<u16, Key>,
}

impl IdMap {
    /// Creates a new, empty map.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of IDs in use.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns whether no IDs are in use.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Allocates a new ID for the request with the given key.
    ///
    /// Returns the smallest ID that isn’t in use or an error if all 65536
    /// of them are.
    pub fn allocate(&mut self, key: Key) -> Result<u16, Error> {
        let id = self.find_free().ok_or(Error::ResourceExhausted)?;
        self.ids.insert(id, key);
        Ok(id)
    }

    /// Returns the key of the request using `id`.
    pub fn get(&self, id: u16) -> Option<Key> {
        self.ids.get(&id).copied()
    }

    /// Releases `id`, returning the key of the request that used it.
    pub fn remove(&mut self, id: u16) -> Option<Key> {
        self.ids.remove(&id)
    }

    /// Finds the smallest unused ID.
    fn find_free(&self) -> Option<u16> {
        let (&first, _) = match self.ids.first_key_value() {
            Some(first) => first,
            None => return Some(0),
        };
        if first > 0 {
            return Some(0);
        }
        let (&last, _) = self.ids.last_key_value()?;

        // Starting at zero without gaps: the next one is right after the
        // end.
        if usize::from(last) + 1 == self.ids.len() {
            return last.checked_add(1);
        }

        // There is a gap somewhere. Find the first one.
        let mut expected = 0u16;
        for &id in self.ids.keys() {
            if id != expected {
                return Some(expected);
            }
            expected += 1;
        }
        None
    }
}

//============ Tests =========================================================
