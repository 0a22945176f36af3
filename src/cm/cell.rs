//! Cell store: the paged, offset-addressed allocator backing one hive.
//!
//! A cell is never referenced by pointer, only by [`CellIndex`] — an integer
//! offset into the owning hive's store. This mirrors the real hive format's
//! use of file offsets so that the same index stays valid whether the cell
//! was paged in from disk or allocated fresh; the on-disk byte layout itself
//! is not modeled here; cells hold typed payloads rather than raw bytes.

use alloc::vec::Vec;

/// Index into a hive's cell store. `NULL_CELL` stands in for HCELL_NIL.
pub type CellIndex = u32;

pub const NULL_CELL: CellIndex = u32::MAX;

/// Whether a cell is persisted with its hive or dropped on unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Stable,
    Volatile,
}

struct Slot<T> {
    payload: T,
    dirty: bool,
    class: StorageClass,
}

/// A growable arena of `T`-typed cells with a free list for reuse.
pub struct CellStore<T> {
    slots: Vec<Option<Slot<T>>>,
    free_list: Vec<CellIndex>,
    max_cells: usize,
}

impl<T> CellStore<T> {
    pub fn new(max_cells: usize) -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            max_cells,
        }
    }

    /// Allocate a cell holding `payload`, returning its index, or
    /// `NULL_CELL` if the store has reached `max_cells`.
    pub fn alloc(&mut self, payload: T, class: StorageClass) -> CellIndex {
        let slot = Slot {
            payload,
            dirty: matches!(class, StorageClass::Stable),
            class,
        };
        if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(slot);
            return index;
        }
        if self.slots.len() >= self.max_cells {
            return NULL_CELL;
        }
        self.slots.push(Some(slot));
        (self.slots.len() - 1) as CellIndex
    }

    /// Free a previously allocated cell. A double free or an out-of-range
    /// index is a caller bug and is ignored, the same way clearing an
    /// already-free bitmap bit is a no-op.
    pub fn free(&mut self, index: CellIndex) {
        if let Some(slot) = self.slots.get_mut(index as usize) {
            if slot.take().is_some() {
                self.free_list.push(index);
            }
        }
    }

    pub fn get(&self, index: CellIndex) -> Option<&T> {
        self.slots.get(index as usize)?.as_ref().map(|s| &s.payload)
    }

    pub fn get_mut(&mut self, index: CellIndex) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)?
            .as_mut()
            .map(|s| &mut s.payload)
    }

    pub fn storage_class(&self, index: CellIndex) -> Option<StorageClass> {
        self.slots.get(index as usize)?.as_ref().map(|s| s.class)
    }

    /// Mark a cell dirty so it is included in the next flush. Volatile
    /// cells are never written out and stay clean regardless.
    pub fn mark_dirty(&mut self, index: CellIndex) {
        if let Some(Some(slot)) = self.slots.get_mut(index as usize) {
            if matches!(slot.class, StorageClass::Stable) {
                slot.dirty = true;
            }
        }
    }

    pub fn clear_dirty(&mut self, index: CellIndex) {
        if let Some(Some(slot)) = self.slots.get_mut(index as usize) {
            slot.dirty = false;
        }
    }

    pub fn is_dirty(&self, index: CellIndex) -> bool {
        matches!(self.slots.get(index as usize), Some(Some(slot)) if slot.dirty)
    }

    pub fn dirty_indices(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .filter(|s| s.dirty)
                .map(|_| i as CellIndex)
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_free_reuses_index() {
        let mut store: CellStore<u32> = CellStore::new(4);
        let a = store.alloc(1, StorageClass::Stable);
        let b = store.alloc(2, StorageClass::Stable);
        assert_ne!(a, b);
        store.free(a);
        let c = store.alloc(3, StorageClass::Stable);
        assert_eq!(a, c);
        assert_eq!(*store.get(c).unwrap(), 3);
    }

    #[test]
    fn exhaustion_returns_null_cell() {
        let mut store: CellStore<u32> = CellStore::new(1);
        assert_ne!(store.alloc(1, StorageClass::Stable), NULL_CELL);
        assert_eq!(store.alloc(2, StorageClass::Stable), NULL_CELL);
    }

    #[test]
    fn volatile_cells_never_dirty() {
        let mut store: CellStore<u32> = CellStore::new(4);
        let v = store.alloc(1, StorageClass::Volatile);
        assert!(!store.is_dirty(v));
        store.mark_dirty(v);
        assert!(!store.is_dirty(v));
    }

    #[test]
    fn stable_cells_start_dirty_and_can_be_cleared() {
        let mut store: CellStore<u32> = CellStore::new(4);
        let s = store.alloc(1, StorageClass::Stable);
        assert!(store.is_dirty(s));
        store.clear_dirty(s);
        assert!(!store.is_dirty(s));
        store.mark_dirty(s);
        assert!(store.is_dirty(s));
    }

    #[test]
    fn free_on_already_free_index_is_a_no_op() {
        let mut store: CellStore<u32> = CellStore::new(4);
        let a = store.alloc(1, StorageClass::Stable);
        store.free(a);
        store.free(a);
        assert_eq!(store.free_list.len(), 1);
    }
}
