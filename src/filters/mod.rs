//! Filters, Approximate Membership Queries (AMQs).

pub mod cbcuckoofilter;

use std::fmt::Debug;

/// A filter is a set-like data structure, that keeps track of elements it has seen without
/// the need to store them. Looking up values has a certain false positive rate.
///
/// This kind of lookup is also referred to as Approximate Membership Queries (AMQs).
pub trait Filter<T>
where
    T: ?Sized,
{
    /// Error type that may occur during insertion.
    type InsertErr: Debug;

    /// Clear state of the filter, so that it behaves like a fresh one.
    fn clear(&mut self);

    /// Insert new element into the filter.
    ///
    /// In success-case, the amount of work spent on the insertion is reported (e.g. placement
    /// rounds), which is always at least 1.
    ///
    /// An error does not necessarily mean that the element was rejected. Check the documentation
    /// of the implementation for what happens to the element and to the filter state.
    fn insert(&mut self, obj: &T) -> Result<usize, Self::InsertErr>;

    /// Check if filters is empty, i.e. contains no elements.
    fn is_empty(&self) -> bool;

    /// Return guessed number of elements in the filter.
    fn len(&self) -> usize;

    /// Guess if the given element was added to the filter.
    fn query(&self, obj: &T) -> bool;
}
