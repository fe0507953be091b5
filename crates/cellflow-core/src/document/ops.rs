use super::Document;
use crate::error::{CellflowError, Result};
use cellflow_engine::engine::{
    CellId, CellRef, Dependent, ListenerId, Notifier, Subscriber, parse_input,
};
use std::collections::HashMap;

/// Dimension for row/column operations
#[derive(Copy, Clone, Debug)]
enum Dimension {
    Row,
    Column,
}

impl Dimension {
    fn name(self) -> &'static str {
        match self {
            Dimension::Row => "Row",
            Dimension::Column => "Column",
        }
    }

    /// Number of rows or columns the document currently has
    fn len(self, doc: &Document) -> usize {
        match self {
            Dimension::Row => doc.height,
            Dimension::Column => doc.width(),
        }
    }
}

impl Document {
    /// Replace the input of the cell at `at` and propagate the change.
    ///
    /// The edit is all-or-nothing: when `raw` fails to parse, or would close a
    /// dependency cycle, the document is left exactly as it was.
    pub fn update_value(&mut self, at: &CellRef, raw: &str) -> Result<()> {
        let id = self.id_at(at)?;
        let expression = parse_input(raw, &*self).inspect_err(|err| {
            tracing::debug!(cell = %at, input = raw, error = %err, "rejected input");
        })?;
        let precedents = expression.precedents();

        // Everything downstream of `id`, `id` itself first.
        let order = self.topological_order(&[id])?;
        if let Some(&looped) = precedents.iter().find(|p| order.contains(p)) {
            let mut path = self.dependency_path(id, looped);
            path.push(id);
            let err = self.circular(id, &path);
            tracing::debug!(cell = %at, input = raw, error = %err, "rejected input");
            return Err(err.into());
        }

        self.rewire(id, &precedents);
        let value = expression.evaluate(&self.cells);
        if let Some(cell) = self.cells.get_mut(id) {
            cell.store(raw.to_string(), expression, value);
        }
        tracing::debug!(cell = %at, input = raw, dependents = order.len() - 1, "updated cell");

        self.notify_listeners(id);
        for dependent in order.into_iter().skip(1) {
            self.refresh(dependent, id);
        }
        Ok(())
    }

    /// Empty the cell at `at`. Dependents see an empty text value.
    pub fn clear(&mut self, at: &CellRef) -> Result<()> {
        self.update_value(at, "")
    }

    /// Register `listener` to be called whenever the cell at `at` changes.
    pub fn subscribe(&mut self, at: &CellRef, listener: Box<dyn Dependent>) -> Result<ListenerId> {
        let id = self.id_at(at)?;
        let listener_id = ListenerId::new(self.next_listener);
        self.next_listener += 1;
        if let Some(cell) = self.cells.get_mut(id) {
            cell.attach(Subscriber::Listener(listener_id));
        }
        self.listeners.insert(listener_id, (id, listener));
        Ok(listener_id)
    }

    /// Remove a listener, handing it back to the caller.
    pub fn unsubscribe(&mut self, listener_id: ListenerId) -> Result<Box<dyn Dependent>> {
        let (id, listener) = self
            .listeners
            .remove(&listener_id)
            .ok_or(CellflowError::UnknownListener)?;
        if let Some(cell) = self.cells.get_mut(id) {
            cell.detach(Subscriber::Listener(listener_id));
        }
        Ok(listener)
    }

    /// Insert an empty row before row index `at` (0-based). `at` may equal the
    /// height to append.
    pub fn insert_row(&mut self, at: usize) -> Result<()> {
        self.insert_dimension(Dimension::Row, at)
    }

    /// Insert an empty column before column index `at` (0-based). `at` may
    /// equal the width to append.
    pub fn insert_column(&mut self, at: usize) -> Result<()> {
        self.insert_dimension(Dimension::Column, at)
    }

    /// Delete row index `at` (0-based). Fails if a cell outside the row
    /// depends on a cell inside it.
    pub fn delete_row(&mut self, at: usize) -> Result<()> {
        self.delete_dimension(Dimension::Row, at)
    }

    /// Delete column index `at` (0-based). Fails if a cell outside the column
    /// depends on a cell inside it.
    pub fn delete_column(&mut self, at: usize) -> Result<()> {
        self.delete_dimension(Dimension::Column, at)
    }

    fn insert_dimension(&mut self, dim: Dimension, at: usize) -> Result<()> {
        if at > dim.len(self) {
            return Err(CellflowError::IndexOutOfBounds {
                dimension: dim.name(),
                index: at,
            });
        }

        let before = self.positions.clone();
        match dim {
            Dimension::Row => {
                for column in &mut self.columns {
                    column.insert(at, self.cells.alloc());
                }
                self.height += 1;
            }
            Dimension::Column => {
                let column: Vec<CellId> = (0..self.height).map(|_| self.cells.alloc()).collect();
                self.columns.insert(at, column);
            }
        }
        self.rebuild_positions();
        tracing::debug!(dimension = dim.name(), index = at, "inserted");
        self.reflow(&before)
    }

    fn delete_dimension(&mut self, dim: Dimension, at: usize) -> Result<()> {
        if at >= dim.len(self) {
            return Err(CellflowError::IndexOutOfBounds {
                dimension: dim.name(),
                index: at,
            });
        }

        let doomed: Vec<CellId> = match dim {
            Dimension::Row => self.columns.iter().map(|column| column[at]).collect(),
            Dimension::Column => self.columns[at].clone(),
        };
        for &id in &doomed {
            let Some(cell) = self.cells.get(id) else {
                continue;
            };
            if let Some(dependent) = cell.dependent_cells().find(|d| !doomed.contains(d)) {
                return Err(CellflowError::ReferencedCell {
                    cell: self.position(id),
                    dependent: self.position(dependent),
                });
            }
        }

        let before = self.positions.clone();
        for &id in &doomed {
            self.rewire(id, &[]);
        }
        self.listeners.retain(|_, (cell, _)| !doomed.contains(cell));
        for &id in &doomed {
            self.cells.take(id);
        }
        match dim {
            Dimension::Row => {
                for column in &mut self.columns {
                    column.remove(at);
                }
                self.height -= 1;
            }
            Dimension::Column => {
                self.columns.remove(at);
            }
        }
        self.rebuild_positions();
        tracing::debug!(dimension = dim.name(), index = at, "deleted");
        self.reflow(&before)
    }

    /// Bring formula text in line with the new shape, then recompute the sheet.
    ///
    /// Formulas whose referenced cells moved get their input rewritten and
    /// re-parsed, so a range whose corners moved apart picks up the cells
    /// inserted between them.
    fn reflow(&mut self, before: &HashMap<CellId, CellRef>) -> Result<()> {
        let old_address = |id: CellId| before.get(&id).cloned();
        let new_address = |id: CellId| self.positions.get(&id).cloned();

        let mut rewrites = Vec::new();
        for id in self.cells.ids() {
            let Some(cell) = self.cells.get(id) else {
                continue;
            };
            if !cell.is_formula() {
                continue;
            }
            let rendered = cell.expression().render(&new_address);
            if cell.expression().render(&old_address) != rendered {
                rewrites.push((id, format!("={rendered}")));
            }
        }

        // Parse everything before touching any cell.
        let mut parsed = Vec::with_capacity(rewrites.len());
        for (id, input) in rewrites {
            let expression = parse_input(&input, &*self).map_err(|err| {
                tracing::warn!(cell = ?self.address_of(id), error = %err, "formula no longer parses");
                err
            })?;
            parsed.push((id, input, expression));
        }

        for (id, input, expression) in parsed {
            self.rewire(id, &expression.precedents());
            if let Some(cell) = self.cells.get_mut(id) {
                let value = cell.value().clone();
                cell.store(input, expression, value);
            }
        }

        self.recalculate_all()
    }
}
