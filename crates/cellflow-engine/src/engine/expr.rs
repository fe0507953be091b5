//! Formula expression trees.
//!
//! An [`Expression`] is produced by the parser and evaluated against a
//! [`ValueSource`], which supplies the cached values of referenced cells.
//! Evaluation is total: numeric anomalies such as division by zero follow
//! IEEE-754 and come back as ordinary numbers.

use thiserror::Error;

use super::cell::CellId;
use super::cell_ref::CellRef;
use super::value::CellValue;

/// Read access to the cached values of other cells.
pub trait ValueSource {
    /// Current cached value of `id`, or None if no such cell exists.
    fn value_of(&self, id: CellId) -> Option<&CellValue>;
}

/// Errors raised while building an expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("Range aggregate needs at least one cell")]
    EmptyRange,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::Pow => '^',
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Pow => lhs.powf(rhs),
        }
    }
}

/// Aggregate functions applicable to a range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RangeOp {
    Sum,
    Avg,
    Max,
    Min,
}

impl RangeOp {
    /// Look up a function by its formula name (`SUM`, `AVG`, `MAX`, `MIN`).
    pub fn from_name(name: &str) -> Option<RangeOp> {
        match name {
            "SUM" => Some(RangeOp::Sum),
            "AVG" => Some(RangeOp::Avg),
            "MAX" => Some(RangeOp::Max),
            "MIN" => Some(RangeOp::Min),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RangeOp::Sum => "SUM",
            RangeOp::Avg => "AVG",
            RangeOp::Max => "MAX",
            RangeOp::Min => "MIN",
        }
    }
}

/// An aggregate over an ordered, non-empty list of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeAggregate {
    op: RangeOp,
    cells: Vec<CellId>,
}

impl RangeAggregate {
    pub fn new(op: RangeOp, cells: Vec<CellId>) -> Result<Self, ExprError> {
        if cells.is_empty() {
            return Err(ExprError::EmptyRange);
        }
        Ok(RangeAggregate { op, cells })
    }

    pub fn op(&self) -> RangeOp {
        self.op
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    fn evaluate(&self, values: &dyn ValueSource) -> f64 {
        let mut numbers = self
            .cells
            .iter()
            .map(|id| values.value_of(*id).map_or(0.0, CellValue::as_number));
        match self.op {
            RangeOp::Sum => numbers.sum(),
            RangeOp::Avg => numbers.sum::<f64>() / self.cells.len() as f64,
            RangeOp::Max => {
                let first = numbers.next().unwrap_or_default();
                numbers.fold(first, |acc, n| if n > acc { n } else { acc })
            }
            RangeOp::Min => {
                let first = numbers.next().unwrap_or_default();
                numbers.fold(first, |acc, n| if n < acc { n } else { acc })
            }
        }
    }
}

/// A parsed formula.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Number(f64),
    Text(String),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
    Reference(CellId),
    Range(RangeAggregate),
}

impl Default for Expression {
    fn default() -> Self {
        Expression::Text(String::new())
    }
}

impl Expression {
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(operand: Expression) -> Expression {
        Expression::Negate(Box::new(operand))
    }

    /// Build a range aggregate, rejecting an empty cell list.
    pub fn range(op: RangeOp, cells: Vec<CellId>) -> Result<Expression, ExprError> {
        RangeAggregate::new(op, cells).map(Expression::Range)
    }

    pub fn evaluate(&self, values: &dyn ValueSource) -> CellValue {
        match self {
            Expression::Number(n) => CellValue::Number(*n),
            Expression::Text(s) => CellValue::Text(s.clone()),
            Expression::Binary { op, left, right } => {
                let lhs = left.evaluate(values).as_number();
                let rhs = right.evaluate(values).as_number();
                CellValue::Number(op.apply(lhs, rhs))
            }
            Expression::Negate(operand) => CellValue::Number(-operand.evaluate(values).as_number()),
            Expression::Reference(id) => values.value_of(*id).cloned().unwrap_or_default(),
            Expression::Range(range) => CellValue::Number(range.evaluate(values)),
        }
    }

    /// Cells read by this expression, in order of first appearance.
    pub fn precedents(&self) -> Vec<CellId> {
        let mut out = Vec::new();
        self.collect_precedents(&mut out);
        out
    }

    fn collect_precedents(&self, out: &mut Vec<CellId>) {
        match self {
            Expression::Number(_) | Expression::Text(_) => {}
            Expression::Reference(id) => push_unique(out, *id),
            Expression::Range(range) => {
                for id in range.cells() {
                    push_unique(out, *id);
                }
            }
            Expression::Binary { left, right, .. } => {
                left.collect_precedents(out);
                right.collect_precedents(out);
            }
            Expression::Negate(operand) => operand.collect_precedents(out),
        }
    }

    /// Height of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Expression::Number(_)
            | Expression::Text(_)
            | Expression::Reference(_)
            | Expression::Range(_) => 1,
            Expression::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
            Expression::Negate(operand) => 1 + operand.depth(),
        }
    }

    pub fn has_references(&self) -> bool {
        match self {
            Expression::Number(_) | Expression::Text(_) => false,
            Expression::Reference(_) | Expression::Range(_) => true,
            Expression::Binary { left, right, .. } => left.has_references() || right.has_references(),
            Expression::Negate(operand) => operand.has_references(),
        }
    }

    /// Render back to formula text (without a leading `=`), naming cells
    /// through `address_of`. Only the parentheses the grammar needs are emitted.
    pub fn render(&self, address_of: &dyn Fn(CellId) -> Option<CellRef>) -> String {
        let mut out = String::new();
        self.render_into(&mut out, address_of);
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Binary { op: BinaryOp::Add | BinaryOp::Sub, .. } => 1,
            Expression::Binary { op: BinaryOp::Mul | BinaryOp::Div, .. } => 2,
            Expression::Negate(_) => 3,
            Expression::Binary { op: BinaryOp::Pow, .. } => 4,
            _ => 5,
        }
    }

    fn render_into(&self, out: &mut String, address_of: &dyn Fn(CellId) -> Option<CellRef>) {
        match self {
            Expression::Number(n) => out.push_str(&n.to_string()),
            Expression::Text(s) => out.push_str(s),
            Expression::Reference(id) => push_address(out, address_of(*id)),
            Expression::Range(range) => {
                out.push_str(range.op().name());
                out.push('(');
                let first = range.cells()[0];
                let last = range.cells()[range.cells().len() - 1];
                push_address(out, address_of(first));
                if first != last {
                    out.push(':');
                    push_address(out, address_of(last));
                }
                out.push(')');
            }
            Expression::Negate(operand) => {
                out.push('-');
                operand.render_operand(out, address_of, operand.precedence() < 3);
            }
            Expression::Binary { op, left, right } => {
                let (left_parens, right_parens) = match op {
                    BinaryOp::Pow => (left.precedence() < 5, right.precedence() < 3),
                    _ => {
                        let own = self.precedence();
                        (left.precedence() < own, right.precedence() <= own)
                    }
                };
                left.render_operand(out, address_of, left_parens);
                out.push(op.symbol());
                right.render_operand(out, address_of, right_parens);
            }
        }
    }

    fn render_operand(
        &self,
        out: &mut String,
        address_of: &dyn Fn(CellId) -> Option<CellRef>,
        parens: bool,
    ) {
        if parens {
            out.push('(');
            self.render_into(out, address_of);
            out.push(')');
        } else {
            self.render_into(out, address_of);
        }
    }
}

fn push_unique(out: &mut Vec<CellId>, id: CellId) {
    if !out.contains(&id) {
        out.push(id);
    }
}

fn push_address(out: &mut String, cell: Option<CellRef>) {
    match cell {
        Some(cell) => out.push_str(&cell.to_string()),
        None => out.push_str("#REF!"),
    }
}
