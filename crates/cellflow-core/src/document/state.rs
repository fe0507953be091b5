use crate::error::{CellflowError, Result};
use cellflow_engine::engine::{
    AddressResolver, Cell, CellId, CellRef, CellValue, Dependent, ListenerId, ValueSource,
};
use std::collections::HashMap;

/// Default sheet width (columns) for [`Document::new`].
pub const DEFAULT_WIDTH: usize = 10;
/// Default sheet height (rows) for [`Document::new`].
pub const DEFAULT_HEIGHT: usize = 20;

/// Owns every cell of a document, addressed by stable [`CellId`].
///
/// Slots of deleted cells stay empty; ids are never handed out twice.
#[derive(Default)]
pub struct CellArena {
    slots: Vec<Option<Cell>>,
}

impl CellArena {
    pub(crate) fn alloc(&mut self) -> CellId {
        self.slots.push(Some(Cell::new_empty()));
        CellId::new(self.slots.len() - 1)
    }

    pub fn get(&self, id: CellId) -> Option<&Cell> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Take a cell out of its slot. Pair with [`CellArena::restore`].
    pub(crate) fn take(&mut self, id: CellId) -> Option<Cell> {
        self.slots.get_mut(id.index()).and_then(Option::take)
    }

    pub(crate) fn restore(&mut self, id: CellId, cell: Cell) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = Some(cell);
        }
    }

    /// Ids of all live cells in allocation order.
    pub(crate) fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| CellId::new(index))
    }
}

impl ValueSource for CellArena {
    fn value_of(&self, id: CellId) -> Option<&CellValue> {
        self.get(id).map(Cell::value)
    }
}

/// A single spreadsheet document: a rectangular grid of cells plus the
/// listeners observing them.
pub struct Document {
    pub(crate) cells: CellArena,
    /// Cell ids by position, indexed `[col][row]`.
    pub(crate) columns: Vec<Vec<CellId>>,
    pub(crate) height: usize,
    /// Reverse of `columns`, rebuilt after every shape change.
    pub(crate) positions: HashMap<CellId, CellRef>,
    pub(crate) listeners: HashMap<ListenerId, (CellId, Box<dyn Dependent>)>,
    pub(crate) next_listener: usize,
}

impl Document {
    /// Create a document with the default size.
    pub fn new() -> Self {
        Self::with_size(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }

    /// Create a document of `width` columns and `height` rows of empty cells.
    pub fn with_size(width: usize, height: usize) -> Self {
        let mut cells = CellArena::default();
        let columns: Vec<Vec<CellId>> = (0..width)
            .map(|_| (0..height).map(|_| cells.alloc()).collect())
            .collect();

        let mut doc = Document {
            cells,
            columns,
            height,
            positions: HashMap::new(),
            listeners: HashMap::new(),
            next_listener: 0,
        };
        doc.rebuild_positions();
        doc
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Stable handle of the cell currently at `at`.
    pub fn id_at(&self, at: &CellRef) -> Result<CellId> {
        self.columns
            .get(at.col)
            .and_then(|column| column.get(at.row))
            .copied()
            .ok_or_else(|| CellflowError::OutOfBounds(at.clone()))
    }

    /// Current position of a cell, or None once it has been deleted.
    pub fn address_of(&self, id: CellId) -> Option<CellRef> {
        self.positions.get(&id).cloned()
    }

    /// Position of a cell known to be on the sheet, for error reports.
    pub(crate) fn position(&self, id: CellId) -> CellRef {
        self.address_of(id).unwrap_or_else(|| CellRef::new(0, 0))
    }

    pub fn cell(&self, at: &CellRef) -> Result<&Cell> {
        let id = self.id_at(at)?;
        self.cells
            .get(id)
            .ok_or_else(|| CellflowError::OutOfBounds(at.clone()))
    }

    /// The text last entered at `at`.
    pub fn raw_input(&self, at: &CellRef) -> Result<&str> {
        Ok(self.cell(at)?.raw_input())
    }

    /// The cached value at `at`.
    pub fn value(&self, at: &CellRef) -> Result<&CellValue> {
        Ok(self.cell(at)?.value())
    }

    /// The cached value at `at`, formatted for display.
    pub fn display(&self, at: &CellRef) -> Result<String> {
        Ok(self.value(at)?.display_string())
    }

    /// Re-evaluate the expression at `at` without touching any cached state.
    pub fn evaluate(&self, at: &CellRef) -> Result<CellValue> {
        Ok(self.cell(at)?.expression().evaluate(&self.cells))
    }

    /// Rebuild the id -> position map from the grid.
    /// Call this after rows or columns are added or removed.
    pub(crate) fn rebuild_positions(&mut self) {
        self.positions.clear();
        for (col, column) in self.columns.iter().enumerate() {
            for (row, id) in column.iter().enumerate() {
                self.positions.insert(*id, CellRef::new(col, row));
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressResolver for Document {
    fn resolve_address(&self, at: &CellRef) -> Option<CellId> {
        self.id_at(at).ok()
    }

    fn resolve_range(&self, start: &CellRef, end: &CellRef) -> Option<Vec<CellId>> {
        self.id_at(start).ok()?;
        self.id_at(end).ok()?;

        let mut cells = Vec::new();
        for row in start.row.min(end.row)..=start.row.max(end.row) {
            for col in start.col.min(end.col)..=start.col.max(end.col) {
                cells.push(self.columns[col][row]);
            }
        }
        Some(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_default_size_and_empty_cells() {
        let doc = Document::new();
        assert_eq!(doc.width(), DEFAULT_WIDTH);
        assert_eq!(doc.height(), DEFAULT_HEIGHT);

        let corner = CellRef::new(DEFAULT_WIDTH - 1, DEFAULT_HEIGHT - 1);
        assert_eq!(doc.raw_input(&corner).unwrap(), "");
        assert_eq!(doc.value(&corner).unwrap(), &CellValue::Text(String::new()));
    }

    #[test]
    fn test_out_of_bounds_is_an_error() {
        let doc = Document::with_size(2, 2);
        assert!(matches!(
            doc.id_at(&CellRef::new(2, 0)),
            Err(CellflowError::OutOfBounds(_))
        ));
        assert!(doc.cell(&CellRef::new(0, 2)).is_err());
    }

    #[test]
    fn test_positions_match_grid() {
        let doc = Document::with_size(3, 2);
        for col in 0..3 {
            for row in 0..2 {
                let at = CellRef::new(col, row);
                let id = doc.id_at(&at).unwrap();
                assert_eq!(doc.address_of(id), Some(at));
            }
        }
    }

    #[test]
    fn test_resolve_range_is_row_major_and_inclusive() {
        let doc = Document::with_size(3, 3);
        let id = |col, row| doc.id_at(&CellRef::new(col, row)).unwrap();
        let cells = doc
            .resolve_range(&CellRef::new(1, 1), &CellRef::new(0, 0))
            .unwrap();
        assert_eq!(cells, vec![id(0, 0), id(1, 0), id(0, 1), id(1, 1)]);
        assert!(doc
            .resolve_range(&CellRef::new(0, 0), &CellRef::new(3, 0))
            .is_none());
    }

    #[test]
    fn test_arena_take_and_restore() {
        let mut arena = CellArena::default();
        let a = arena.alloc();
        let b = arena.alloc();
        let cell = arena.take(a).unwrap();
        assert!(arena.get(a).is_none());
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![b]);
        arena.restore(a, cell);
        assert_eq!(arena.ids().collect::<Vec<_>>(), vec![a, b]);
    }
}
