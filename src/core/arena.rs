use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Generational slot storage that remembers insertion order.
///
/// Freed cells are reused, but iteration always yields live items in the
/// order they were inserted. Stale handles resolve to `None` instead of
/// aliasing whatever was stored in the cell afterwards.
pub struct Arena<T> {
    cells: Vec<ArenaCell<T>>,
    free_cells: Vec<u32>,
    order: Vec<u32>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            free_cells: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn insert(&mut self, item: T) -> ArenaHandle<T> {
        let index = match self.free_cells.pop() {
            Some(index) => {
                let cell = &mut self.cells[index as usize];
                cell.item = Some(item);
                cell.generation += 1;
                index
            }
            None => {
                let index = self.cells.len() as u32;
                self.cells.push(ArenaCell {
                    item: Some(item),
                    generation: 1,
                });
                index
            }
        };

        self.order.push(index);

        ArenaHandle {
            index,
            generation: self.cells[index as usize].generation,
            _pd: PhantomData,
        }
    }

    pub fn remove(&mut self, handle: ArenaHandle<T>) -> Option<T> {
        let cell = self.live_cell_mut(handle)?;
        let item = cell.item.take();

        self.free_cells.push(handle.index);

        if let Some(position) = self.order.iter().position(|i| *i == handle.index) {
            self.order.remove(position);
        }

        item
    }

    pub fn get(&self, handle: ArenaHandle<T>) -> Option<&T> {
        let cell = self.cells.get(handle.index as usize)?;

        if cell.generation != handle.generation {
            return None;
        }

        cell.item.as_ref()
    }

    pub fn get_mut(&mut self, handle: ArenaHandle<T>) -> Option<&mut T> {
        self.live_cell_mut(handle)?.item.as_mut()
    }

    pub fn contains(&self, handle: ArenaHandle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Removes every item, returning them with their handles in insertion order.
    pub fn drain(&mut self) -> Vec<(ArenaHandle<T>, T)> {
        let order = std::mem::take(&mut self.order);
        let mut drained = Vec::with_capacity(order.len());

        for index in order {
            let cell = &mut self.cells[index as usize];

            if let Some(item) = cell.item.take() {
                let handle = ArenaHandle {
                    index,
                    generation: cell.generation,
                    _pd: PhantomData,
                };
                drained.push((handle, item));
                self.free_cells.push(index);
            }
        }

        drained
    }

    pub fn iter(&self) -> impl Iterator<Item = (ArenaHandle<T>, &T)> {
        self.order.iter().filter_map(|&index| {
            let cell = &self.cells[index as usize];

            let handle = ArenaHandle {
                index,
                generation: cell.generation,
                _pd: PhantomData,
            };

            cell.item.as_ref().map(|value| (handle, value))
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.iter().map(|(_, value)| value)
    }

    fn live_cell_mut(&mut self, handle: ArenaHandle<T>) -> Option<&mut ArenaCell<T>> {
        let cell = self.cells.get_mut(handle.index as usize)?;

        if cell.generation != handle.generation || cell.item.is_none() {
            return None;
        }

        Some(cell)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for Arena<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut arena = Arena::new();

        for item in iter {
            arena.insert(item);
        }

        arena
    }
}

struct ArenaCell<T> {
    item: Option<T>,
    generation: u32,
}

pub struct ArenaHandle<T> {
    index: u32,
    generation: u32,
    _pd: PhantomData<fn() -> *mut T>,
}

impl<T> ArenaHandle<T> {
    pub const NONE: ArenaHandle<T> = ArenaHandle {
        index: u32::MAX,
        generation: 0,
        _pd: PhantomData,
    };
}

impl<T> PartialEq for ArenaHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ArenaHandle<T> {}

impl<T> Hash for ArenaHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Clone for ArenaHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ArenaHandle<T> {}

impl<T> fmt::Debug for ArenaHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_get() {
        let mut arena = Arena::new();

        let a1 = arena.insert("a1");
        let b1 = arena.insert("b1");

        assert_eq!(arena.get(a1), Some(&"a1"));
        assert_eq!(arena.get(b1), Some(&"b1"));
        assert_eq!(arena.get(ArenaHandle::NONE), None);
    }

    #[test]
    fn stale_handle_does_not_alias_reused_cell() {
        let mut arena = Arena::new();

        let a1 = arena.insert("a1");
        assert_eq!(arena.remove(a1), Some("a1"));

        let a2 = arena.insert("a2");
        assert_eq!(arena.cells.len(), 1);

        assert_eq!(arena.get(a1), None);
        assert_eq!(arena.remove(a1), None);
        assert_eq!(arena.get(a2), Some(&"a2"));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn iteration_follows_insertion_order_after_reuse() {
        let mut arena = Arena::new();

        let a = arena.insert("a");
        arena.insert("b");
        arena.remove(a);
        arena.insert("c");

        let values: Vec<_> = arena.values().copied().collect();
        assert_eq!(values, ["b", "c"]);
    }

    #[test]
    fn drain_empties_in_order() {
        let mut arena: Arena<_> = ["x", "y", "z"].into_iter().collect();

        let drained: Vec<_> = arena.drain().into_iter().map(|(_, v)| v).collect();

        assert_eq!(drained, ["x", "y", "z"]);
        assert!(arena.is_empty());
        assert_eq!(arena.free_cells.len(), 3);
    }
}
