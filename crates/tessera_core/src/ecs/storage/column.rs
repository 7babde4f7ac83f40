use crate::ecs::{Primitive, PrimitiveKind};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared, fixed-length column for a single primitive field.
///
/// Every primitive is stored as 64 raw bits in an atomic cell, so disjoint
/// sub-ranges can be read and written from different tasks without locks.
/// The buffer is replaced (never resized in place) when the owning pool
/// grows or shrinks; views handed out earlier keep the old buffer alive.
#[derive(Clone)]
pub(crate) struct Column {
    kind: PrimitiveKind,
    cells: Arc<[AtomicU64]>,
}

impl Column {
    pub fn new(kind: PrimitiveKind, len: usize) -> Self {
        Self {
            kind,
            cells: zeroed(len),
        }
    }

    #[inline]
    pub fn load(&self, slot: usize) -> u64 {
        self.cells[slot].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store(&self, slot: usize, bits: u64) {
        self.cells[slot].store(bits, Ordering::Relaxed);
    }

    /// Copy `count` cells starting at `from` into a new buffer of `len`
    /// cells, starting at `to`.
    pub fn relocated(&self, len: usize, from: usize, to: usize, count: usize) -> Self {
        let cells = zeroed(len);
        for i in 0..count {
            cells[to + i].store(self.load(from + i), Ordering::Relaxed);
        }
        Self {
            kind: self.kind,
            cells,
        }
    }

    pub fn view<P: Primitive>(&self, origin: usize) -> FieldArray<P> {
        debug_assert_eq!(self.kind, P::KIND);
        FieldArray {
            origin,
            cells: Arc::clone(&self.cells),
            _marker: PhantomData,
        }
    }
}

fn zeroed(len: usize) -> Arc<[AtomicU64]> {
    (0..len).map(|_| AtomicU64::new(0)).collect()
}

/// Typed view over one field column of an archetype pool, addressed by
/// entity index.
///
/// Views are cheap to clone and can be moved into parallel tasks. Writes
/// through a view are visible to every other view of the same column.
/// A view taken before a `flush` must not be used after it: structural
/// changes may move the column to a new buffer.
pub struct FieldArray<P: Primitive> {
    origin: usize,
    cells: Arc<[AtomicU64]>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Primitive> FieldArray<P> {
    /// Read the value stored for entity `index`.
    ///
    /// # Panics
    /// If `index` lies outside the pool's storage window.
    #[inline]
    pub fn get(&self, index: usize) -> P {
        P::from_bits(self.cells[self.slot(index)].load(Ordering::Relaxed))
    }

    /// Overwrite the value stored for entity `index`.
    ///
    /// # Panics
    /// If `index` lies outside the pool's storage window.
    #[inline]
    pub fn set(&self, index: usize, value: P) {
        self.cells[self.slot(index)].store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn try_get(&self, index: usize) -> Option<P> {
        let slot = index.checked_sub(self.origin)?;
        self.cells
            .get(slot)
            .map(|cell| P::from_bits(cell.load(Ordering::Relaxed)))
    }

    /// Whether `index` falls inside the storage window.
    #[inline]
    pub fn covers(&self, index: usize) -> bool {
        index >= self.origin && index - self.origin < self.cells.len()
    }

    /// First entity index covered by the window.
    #[inline]
    pub fn origin(&self) -> usize {
        self.origin
    }

    #[inline]
    pub fn kind(&self) -> PrimitiveKind {
        P::KIND
    }

    #[inline]
    fn slot(&self, index: usize) -> usize {
        match index.checked_sub(self.origin) {
            Some(slot) if slot < self.cells.len() => slot,
            _ => panic!(
                "entity index {} outside column window {}..{}",
                index,
                self.origin,
                self.origin + self.cells.len()
            ),
        }
    }
}

impl<P: Primitive> Clone for FieldArray<P> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin,
            cells: Arc::clone(&self.cells),
            _marker: PhantomData,
        }
    }
}

impl<P: Primitive> fmt::Debug for FieldArray<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArray")
            .field("kind", &P::KIND)
            .field("origin", &self.origin)
            .field("len", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn views_share_writes() {
        let column = Column::new(PrimitiveKind::I32, 4);
        let a = column.view::<i32>(10);
        let b = a.clone();
        a.set(12, -5);
        assert_eq!(b.get(12), -5);
        assert!(a.covers(13));
        assert!(!a.covers(14));
        assert_eq!(a.try_get(9), None);
    }

    #[test]
    fn relocation_copies_the_requested_window() {
        let column = Column::new(PrimitiveKind::F32, 3);
        let view = column.view::<f32>(0);
        view.set(1, 1.5);
        view.set(2, 2.5);

        let moved = column.relocated(6, 1, 4, 2);
        let moved_view = moved.view::<f32>(0);
        assert_eq!(moved_view.get(4), 1.5);
        assert_eq!(moved_view.get(5), 2.5);
        assert!(moved_view.covers(0));
        assert!(!moved_view.covers(6));
    }

    #[test]
    #[should_panic(expected = "outside column window")]
    fn out_of_window_access_panics() {
        let column = Column::new(PrimitiveKind::Bool, 2);
        column.view::<bool>(5).get(1);
    }
}
