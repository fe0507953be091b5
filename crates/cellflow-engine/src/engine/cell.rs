//! Cell data structures.
//!
//! This module provides the core data types for representing cells:
//! - [`CellId`] - A stable handle to a cell, independent of its grid position
//! - [`Cell`] - Raw input, parsed expression, cached value and subscribers
//! - [`Notifier`] / [`Dependent`] - The two halves of change propagation
//!
//! A cell is both: other cells and external listeners subscribe to it
//! ([`Notifier`]), and it recomputes when one of its precedents changes
//! ([`Dependent`]). Listeners that only need to observe implement
//! [`Dependent`] alone.

use super::expr::{Expression, ValueSource};
use super::value::CellValue;

/// Stable handle to a cell. Handles are never reused within a document.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct CellId(usize);

impl CellId {
    pub fn new(index: usize) -> CellId {
        CellId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to an external listener registered with a document.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct ListenerId(usize);

impl ListenerId {
    pub fn new(index: usize) -> ListenerId {
        ListenerId(index)
    }
}

/// Something notified when a cell changes.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum Subscriber {
    Cell(CellId),
    Listener(ListenerId),
}

/// Can be subscribed to.
pub trait Notifier {
    /// Register `subscriber`. Returns false if it was already registered.
    fn attach(&mut self, subscriber: Subscriber) -> bool;

    /// Unregister `subscriber`. Returns false if it was not registered.
    fn detach(&mut self, subscriber: Subscriber) -> bool;

    /// Current subscribers in registration order.
    fn subscribers(&self) -> &[Subscriber];
}

/// Reacts to a change of a cell it depends on.
pub trait Dependent {
    /// Called after `changed` has taken its new value. `values` reflects
    /// every recomputation made so far in the current pass.
    fn update(&mut self, changed: CellId, values: &dyn ValueSource);
}

/// A single spreadsheet cell.
#[derive(Clone, Debug, Default)]
pub struct Cell {
    raw_input: String,
    expression: Expression,
    cached_value: CellValue,
    subscribers: Vec<Subscriber>,
}

impl Cell {
    /// An empty cell: no input, an empty text expression and value.
    pub fn new_empty() -> Cell {
        Cell::default()
    }

    /// The exact text last entered into this cell.
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn value(&self) -> &CellValue {
        &self.cached_value
    }

    /// Store a freshly parsed input and its evaluated value.
    pub fn store(&mut self, raw_input: String, expression: Expression, value: CellValue) {
        self.raw_input = raw_input;
        self.expression = expression;
        self.cached_value = value;
    }

    /// Whether the cell holds a formula that reads other cells.
    pub fn is_formula(&self) -> bool {
        self.expression.has_references()
    }

    /// Subscribed dependent cells, in registration order.
    pub fn dependent_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.subscribers.iter().filter_map(|s| match s {
            Subscriber::Cell(id) => Some(*id),
            Subscriber::Listener(_) => None,
        })
    }
}

impl Notifier for Cell {
    fn attach(&mut self, subscriber: Subscriber) -> bool {
        if self.subscribers.contains(&subscriber) {
            return false;
        }
        self.subscribers.push(subscriber);
        true
    }

    fn detach(&mut self, subscriber: Subscriber) -> bool {
        match self.subscribers.iter().position(|s| *s == subscriber) {
            Some(index) => {
                self.subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }
}

impl Dependent for Cell {
    fn update(&mut self, _changed: CellId, values: &dyn ValueSource) {
        self.cached_value = self.expression.evaluate(values);
    }
}
