//! Formula engine API.
//!
//! This module provides the core computation engine for the spreadsheet:
//!
//! - [`CellValue`] - Computed values (number or text)
//! - [`Expression`] - Parsed formula trees and their evaluation
//! - [`Parser`], [`parse_input`] - Text to [`Expression`]
//! - [`Cell`], [`Notifier`], [`Dependent`] - Cells and change propagation
//! - [`CellRef`], [`encode_column`], [`decode_column`] - A1 notation
//! - [`format_number`] - Format values for display

mod cell;
mod cell_ref;
mod expr;
mod format;
mod parser;
mod value;

pub use cell::{Cell, CellId, Dependent, ListenerId, Notifier, Subscriber};
pub use cell_ref::{CellRef, decode_column, encode_column};
pub use expr::{BinaryOp, ExprError, Expression, RangeAggregate, RangeOp, ValueSource};
pub use format::format_number;
pub use parser::{AddressResolver, NoReferences, ParseError, Parser, parse_input};
pub use value::{CellValue, ValueKind};
