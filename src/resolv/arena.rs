//! Storage for request records.
//!
//! All outstanding requests live in a single [`Arena`]. The other
//! bookkeeping structures refer to them through a [`Key`] which combines
//! the slot index with a generation counter. Once a request is removed, its
//! slot may be reused but the old key will not find the new occupant.

//------------ Key -----------------------------------------------------------

/// A stable reference to a value in an arena.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Key {
    /// The index of the slot.
    index: u32,

    /// The generation of the slot when the value was inserted.
    generation: u32,
}

//------------ Arena ---------------------------------------------------------

/// A slot map of values addressed by [`Key`].
#[derive(Debug)]
pub struct Arena<T> {
    /// The slots.
    slots: Vec<Slot<T>>,

    /// Indexes of vacant slots.
    free: Vec<u32>,

    /// The number of occupied slots.
    len: usize,
}

/// A single slot of an arena.
#[derive(Debug)]
struct Slot<T> {
    /// The generation of the current or last occupant.
    generation: u32,

    /// The value if the slot is occupied.
    value: Option<T>,
}

impl<T> Arena<T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of values in the arena.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the key the next call to [`insert`][Self::insert] will use.
    pub fn next_key(&self) -> Key {
        match self.free.last() {
            Some(&index) => Key {
                index,
                generation: self.slots[index as usize]
                    .generation
                    .wrapping_add(1),
            },
            None => Key {
                index: self.slots.len() as u32,
                generation: 0,
            },
        }
    }

    /// Inserts a value and returns its key.
    pub fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            Key {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Key {
                index,
                generation: 0,
            }
        }
    }

    /// Returns a reference to the value for `key` if it is still there.
    pub fn get(&self, key: Key) -> Option<&T> {
        match self.slots.get(key.index as usize) {
            Some(slot) if slot.generation == key.generation => {
                slot.value.as_ref()
            }
            _ => None,
        }
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.slots.get_mut(key.index as usize) {
            Some(slot) if slot.generation == key.generation => {
                slot.value.as_mut()
            }
            _ => None,
        }
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let slot = match self.slots.get_mut(key.index as usize) {
            Some(slot) if slot.generation == key.generation => slot,
            _ => return None,
        };
        let value = slot.value.take()?;
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Removes all values, returning them in slot order.
    pub fn drain(&mut self) -> Vec<T> {
        let mut res = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                self.free.push(index as u32);
                res.push(value);
            }
        }
        self.len = 0;
        res
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

//============ Tests =========================================================
