//! Result rows and the per-pass result collection

use std::fmt;

use smallvec::SmallVec;
use strata_core::StreamIndex;

use crate::error::{AssemblyError, AssemblyResult};

/// Joins up to this many streams keep their row slots inline.
const INLINE_STREAMS: usize = 4;

/// A join row: one slot per stream, `None` where an outer-joined stream had
/// no match.
///
/// Each slot is written at most once while the row is composed; a second
/// write is an invariant violation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultRow<E> {
    slots: SmallVec<[Option<E>; INLINE_STREAMS]>,
}

impl<E> ResultRow<E> {
    /// An all-null row of `width` slots
    pub fn new(width: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(width).collect(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.slots.len()
    }

    /// Event at a stream's slot; `None` for a null slot or an out-of-range stream
    #[inline]
    pub fn get(&self, stream: StreamIndex) -> Option<&E> {
        self.slots.get(stream).and_then(Option::as_ref)
    }

    #[inline]
    pub fn is_null(&self, stream: StreamIndex) -> bool {
        self.get(stream).is_none()
    }

    pub fn null_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    pub fn slots(&self) -> &[Option<E>] {
        &self.slots
    }

    pub fn into_slots(self) -> Vec<Option<E>> {
        self.slots.into_vec()
    }

    /// Fill a stream's slot
    pub fn set(&mut self, stream: StreamIndex, event: E) -> AssemblyResult<()> {
        let width = self.slots.len();
        match self.slots.get_mut(stream) {
            None => Err(AssemblyError::SlotOutOfRange { stream, width }),
            Some(Some(_)) => Err(AssemblyError::SlotAlreadySet { stream }),
            Some(slot) => {
                *slot = Some(event);
                Ok(())
            }
        }
    }
}

impl<E: Clone> ResultRow<E> {
    /// Copy the non-null slots of `streams` from `other` into this row
    pub fn merge_from(&mut self, other: &ResultRow<E>, streams: &[StreamIndex]) -> AssemblyResult<()> {
        for &stream in streams {
            if let Some(event) = other.get(stream) {
                self.set(stream, event.clone())?;
            }
        }
        Ok(())
    }
}

impl<E: fmt::Display> fmt::Display for ResultRow<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match slot {
                Some(event) => write!(f, "{}", event)?,
                None => f.write_str("null")?,
            }
        }
        f.write_str("]")
    }
}

/// Completed rows of one assembly pass, in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCollection<E> {
    rows: Vec<ResultRow<E>>,
}

impl<E> Default for ResultCollection<E> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<E> ResultCollection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResultRow<E>> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[ResultRow<E>] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow<E>> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ResultRow<E>> {
        self.rows
    }

    /// Drop all rows, keeping the allocation for the next pass
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub(crate) fn push(&mut self, row: ResultRow<E>) {
        self.rows.push(row);
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }
}

impl<E> IntoIterator for ResultCollection<E> {
    type Item = ResultRow<E>;
    type IntoIter = std::vec::IntoIter<ResultRow<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a ResultCollection<E> {
    type Item = &'a ResultRow<E>;
    type IntoIter = std::slice::Iter<'a, ResultRow<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
