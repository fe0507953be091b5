//! Dependency ordering and recomputation.
//!
//! Every cell keeps its dependents as subscribers, so the sheet's dependency
//! graph is the union of all subscriber lists. A propagation pass walks that
//! graph depth-first from the edited cell and recomputes each reachable cell
//! exactly once, after all of its precedents. The walk tracks the cells on the
//! current path; reaching one of them again means the graph has a cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use super::Document;
use crate::error::{EvalError, Result};
use cellflow_engine::engine::{CellId, Dependent, Notifier, Subscriber};

struct Frame {
    id: CellId,
    children: Vec<CellId>,
    next: usize,
}

impl Document {
    fn dependents_of(&self, id: CellId) -> Vec<CellId> {
        self.cells
            .get(id)
            .map(|cell| cell.dependent_cells().collect())
            .unwrap_or_default()
    }

    /// Order `roots` and everything depending on them so that each cell comes
    /// after all of its precedents. Siblings keep their subscription order.
    pub(crate) fn topological_order(&self, roots: &[CellId]) -> Result<Vec<CellId>> {
        let mut finished = HashSet::new();
        let mut post_order = Vec::new();

        for &root in roots.iter().rev() {
            if finished.contains(&root) {
                continue;
            }
            let mut on_path = HashSet::from([root]);
            let mut frames = vec![self.frame(root)];

            while let Some(frame) = frames.last_mut() {
                if let Some(&child) = frame.children.get(frame.next) {
                    frame.next += 1;
                    if on_path.contains(&child) {
                        let mut path: Vec<CellId> = frames.iter().map(|f| f.id).collect();
                        path.push(child);
                        return Err(self.circular(child, &path).into());
                    }
                    if finished.contains(&child) {
                        continue;
                    }
                    on_path.insert(child);
                    frames.push(self.frame(child));
                } else if let Some(done) = frames.pop() {
                    on_path.remove(&done.id);
                    finished.insert(done.id);
                    post_order.push(done.id);
                }
            }
        }

        post_order.reverse();
        Ok(post_order)
    }

    fn frame(&self, id: CellId) -> Frame {
        let mut children = self.dependents_of(id);
        // Visiting in reverse makes the reversed post-order follow subscription order.
        children.reverse();
        Frame {
            id,
            children,
            next: 0,
        }
    }

    /// Shortest chain of dependents leading from `from` to `to`, both included.
    pub(crate) fn dependency_path(&self, from: CellId, to: CellId) -> Vec<CellId> {
        let mut parent: HashMap<CellId, CellId> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        while let Some(id) = queue.pop_front() {
            if id == to {
                break;
            }
            for dep in self.dependents_of(id) {
                if dep != from && !parent.contains_key(&dep) {
                    parent.insert(dep, id);
                    queue.push_back(dep);
                }
            }
        }

        let mut path = vec![to];
        let mut current = to;
        while let Some(&prev) = parent.get(&current) {
            path.push(prev);
            current = prev;
        }
        if current != from {
            path.push(from);
        }
        path.reverse();
        path
    }

    pub(crate) fn circular(&self, cell: CellId, path: &[CellId]) -> EvalError {
        EvalError::CircularReference {
            cell: self.position(cell),
            path: path.iter().map(|id| self.position(*id)).collect(),
        }
    }

    /// Point `id`'s subscriptions at `precedents`, dropping stale ones.
    pub(crate) fn rewire(&mut self, id: CellId, precedents: &[CellId]) {
        let old = self
            .cells
            .get(id)
            .map(|cell| cell.expression().precedents())
            .unwrap_or_default();

        for stale in old.iter().filter(|p| !precedents.contains(p)) {
            if let Some(cell) = self.cells.get_mut(*stale) {
                cell.detach(Subscriber::Cell(id));
            }
        }
        for precedent in precedents {
            if let Some(cell) = self.cells.get_mut(*precedent) {
                cell.attach(Subscriber::Cell(id));
            }
        }
    }

    /// Recompute `id` from its expression and tell its listeners.
    pub(crate) fn refresh(&mut self, id: CellId, changed: CellId) {
        if let Some(mut cell) = self.cells.take(id) {
            cell.update(changed, &self.cells);
            tracing::trace!(cell = ?self.address_of(id), value = %cell.value(), "recomputed");
            self.cells.restore(id, cell);
        }
        self.notify_listeners(id);
    }

    /// Call every listener subscribed to `id`, in subscription order.
    pub(crate) fn notify_listeners(&mut self, id: CellId) {
        let Some(cell) = self.cells.get(id) else {
            return;
        };
        let listener_ids: Vec<_> = cell
            .subscribers()
            .iter()
            .filter_map(|s| match s {
                Subscriber::Listener(l) => Some(*l),
                Subscriber::Cell(_) => None,
            })
            .collect();

        for listener_id in listener_ids {
            if let Some((_, listener)) = self.listeners.get_mut(&listener_id) {
                listener.update(id, &self.cells);
            }
        }
    }

    /// Recompute every cell of the sheet in dependency order.
    pub fn recalculate_all(&mut self) -> Result<()> {
        let roots: Vec<CellId> = self.cells.ids().collect();
        let order = self.topological_order(&roots)?;
        tracing::debug!(cells = order.len(), "recalculating sheet");
        for id in order {
            let before = self.cells.get(id).map(|cell| cell.value().clone());
            if let Some(mut cell) = self.cells.take(id) {
                cell.update(id, &self.cells);
                let changed = before.as_ref() != Some(cell.value());
                self.cells.restore(id, cell);
                if changed {
                    self.notify_listeners(id);
                }
            }
        }
        Ok(())
    }
}
