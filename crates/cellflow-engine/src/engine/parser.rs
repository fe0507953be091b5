//! Recursive-descent formula parser.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := factor (('*' | '/') factor)*
//! factor     := ('+' | '-') factor | primary ('^' factor)?
//! primary    := number | '(' expression ')' | address
//!             | function '(' address (':' address)? ')'
//! ```
//!
//! Unary signs wrap the whole factor, so `-2^2` is `-(2^2)`, and `^`
//! recurses into `factor`, which makes it right-associative. Whitespace is
//! skipped lazily, only when a token is about to be matched.
//!
//! Nesting is bounded: at most [`MAX_NESTING`] factors may be open at once
//! (each `(` and each unary sign opens one), and the finished tree may be at
//! most [`MAX_DEPTH`] nodes deep. Deeper formulas fail with
//! [`ParseError::TooDeep`].

use thiserror::Error;

use super::cell::CellId;
use super::cell_ref::CellRef;
use super::expr::{BinaryOp, ExprError, Expression, RangeOp};

/// Maximum number of factors being parsed at the same time.
pub const MAX_NESTING: usize = 256;
/// Maximum depth of a parsed expression tree.
pub const MAX_DEPTH: usize = 1024;

/// Turns addresses found in a formula into cell handles.
pub trait AddressResolver {
    fn resolve_address(&self, at: &CellRef) -> Option<CellId>;

    /// Every cell of the inclusive rectangle spanned by `start` and `end`,
    /// in row-major order.
    fn resolve_range(&self, start: &CellRef, end: &CellRef) -> Option<Vec<CellId>>;
}

/// Resolver for formulas that may not reference cells.
pub struct NoReferences;

impl AddressResolver for NoReferences {
    fn resolve_address(&self, _at: &CellRef) -> Option<CellId> {
        None
    }

    fn resolve_range(&self, _start: &CellRef, _end: &CellRef) -> Option<Vec<CellId>> {
        None
    }
}

/// Malformed formula text. Positions count characters from the start of
/// the formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected '{ch}' at position {at}")]
    UnexpectedCharacter { at: usize, ch: char },

    #[error("Unexpected end of formula at position {at}")]
    UnexpectedEnd { at: usize },

    #[error("Unexpected trailing '{ch}' at position {at}")]
    UnexpectedTrailingInput { at: usize, ch: char },

    #[error("Unmatched '(' at position {at}")]
    UnmatchedParen { at: usize },

    #[error("Invalid number '{literal}' at position {at}")]
    InvalidNumber { at: usize, literal: String },

    #[error("Invalid cell address '{label}' at position {at}")]
    InvalidAddress { at: usize, label: String },

    #[error("Cell address '{label}' at position {at} is outside the sheet")]
    UnresolvedAddress { at: usize, label: String },

    #[error("Unknown function '{name}' at position {at}")]
    UnknownFunction { at: usize, name: String },

    #[error("Formula nested too deeply at position {at}")]
    TooDeep { at: usize },

    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// Classify and parse the raw text entered into a cell.
///
/// - Empty or whitespace-only -> empty text
/// - Starts with '=' -> formula (without the '=')
/// - Quoted string -> text (without quotes)
/// - Starts like a number or arithmetic -> formula
/// - Otherwise -> text
///
/// A formula that fails to parse is an error, never silently text.
pub fn parse_input(raw: &str, resolver: &dyn AddressResolver) -> Result<Expression, ParseError> {
    tracing::trace!(input = raw, "parsing cell input");
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Expression::Text(String::new()));
    }

    if let Some(formula) = trimmed.strip_prefix('=') {
        return Parser::parse_with(formula, resolver);
    }

    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        let text = &trimmed[1..trimmed.len() - 1];
        return Ok(Expression::Text(text.to_string()));
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '(')) {
        return Parser::parse_with(trimmed, resolver);
    }

    Ok(Expression::Text(trimmed.to_string()))
}

pub struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    nesting: usize,
    resolver: &'a dyn AddressResolver,
}

impl<'a> Parser<'a> {
    /// Parse a formula that may not reference cells.
    pub fn parse(input: &str) -> Result<Expression, ParseError> {
        Parser::parse_with(input, &NoReferences)
    }

    pub fn parse_with(
        input: &str,
        resolver: &'a dyn AddressResolver,
    ) -> Result<Expression, ParseError> {
        let mut parser = Parser {
            chars: input.chars().collect(),
            pos: 0,
            nesting: 0,
            resolver,
        };
        let expr = parser.parse_expression()?;
        parser.skip_whitespace();
        if let Some(ch) = parser.peek() {
            return Err(ParseError::UnexpectedTrailingInput { at: parser.pos, ch });
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn unexpected(&self) -> ParseError {
        match self.peek() {
            Some(ch) => ParseError::UnexpectedCharacter { at: self.pos, ch },
            None => ParseError::UnexpectedEnd { at: self.pos },
        }
    }

    /// Reject `expr` if it is deeper than [`MAX_DEPTH`].
    fn bounded(&self, at: usize, expr: Expression) -> Result<Expression, ParseError> {
        if expr.depth() > MAX_DEPTH {
            return Err(ParseError::TooDeep { at });
        }
        Ok(expr)
    }

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_term()?;
        loop {
            let op = if self.eat('+') {
                BinaryOp::Add
            } else if self.eat('-') {
                BinaryOp::Sub
            } else {
                return Ok(expr);
            };
            let at = self.pos - 1;
            let right = self.parse_term()?;
            expr = self.bounded(at, Expression::binary(op, expr, right))?;
        }
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.parse_factor()?;
        loop {
            let op = if self.eat('*') {
                BinaryOp::Mul
            } else if self.eat('/') {
                BinaryOp::Div
            } else {
                return Ok(expr);
            };
            let at = self.pos - 1;
            let right = self.parse_factor()?;
            expr = self.bounded(at, Expression::binary(op, expr, right))?;
        }
    }

    /// Every `(` and unary sign passes through here, so this is where
    /// nesting is counted.
    fn parse_factor(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        if self.nesting >= MAX_NESTING {
            return Err(ParseError::TooDeep { at: start });
        }
        self.nesting += 1;
        let factor = self.parse_signed_factor(start);
        self.nesting -= 1;
        factor
    }

    fn parse_signed_factor(&mut self, start: usize) -> Result<Expression, ParseError> {
        if self.eat('+') {
            return self.parse_factor();
        }
        if self.eat('-') {
            let operand = self.parse_factor()?;
            return self.bounded(start, Expression::negate(operand));
        }

        let base = self.parse_primary()?;
        if self.eat('^') {
            let exponent = self.parse_factor()?;
            return self.bounded(start, Expression::binary(BinaryOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                if !self.eat(')') {
                    return Err(ParseError::UnmatchedParen { at: start });
                }
                Ok(expr)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let literal = self.take_while(|c| c.is_ascii_digit() || c == '.');
                match literal.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(Expression::Number(n)),
                    _ => Err(ParseError::InvalidNumber { at: start, literal }),
                }
            }
            Some(c) if c.is_ascii_uppercase() => {
                let name = self.take_while(|c| c.is_ascii_uppercase());
                if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    let label = format!("{name}{digits}");
                    let cell = to_cell_ref(start, &label)?;
                    let id = self
                        .resolver
                        .resolve_address(&cell)
                        .ok_or(ParseError::UnresolvedAddress { at: start, label })?;
                    return Ok(Expression::Reference(id));
                }
                if self.eat('(') {
                    let op = RangeOp::from_name(&name)
                        .ok_or(ParseError::UnknownFunction { at: start, name })?;
                    return self.parse_range_call(op, self.pos - 1);
                }
                Err(ParseError::InvalidAddress { at: start, label: name })
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse `address (':' address)? ')'` after a function's opening paren.
    fn parse_range_call(&mut self, op: RangeOp, paren: usize) -> Result<Expression, ParseError> {
        let (at, first_label, first) = self.parse_address()?;
        let (label, last) = if self.eat(':') {
            let (_, last_label, last) = self.parse_address()?;
            (format!("{first_label}:{last_label}"), last)
        } else {
            (first_label, first.clone())
        };

        if !self.eat(')') {
            return Err(match self.peek() {
                None => ParseError::UnmatchedParen { at: paren },
                Some(_) => self.unexpected(),
            });
        }

        let cells = self
            .resolver
            .resolve_range(&first, &last)
            .ok_or(ParseError::UnresolvedAddress { at, label })?;
        Ok(Expression::range(op, cells)?)
    }

    fn parse_address(&mut self) -> Result<(usize, String, CellRef), ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let letters = self.take_while(|c| c.is_ascii_uppercase());
        if letters.is_empty() {
            return Err(self.unexpected());
        }
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.unexpected());
        }
        let label = format!("{letters}{digits}");
        let cell = to_cell_ref(start, &label)?;
        Ok((start, label, cell))
    }
}

fn to_cell_ref(at: usize, label: &str) -> Result<CellRef, ParseError> {
    CellRef::from_str(label).ok_or_else(|| ParseError::InvalidAddress {
        at,
        label: label.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::expr::ValueSource;
    use crate::engine::value::CellValue;

    /// A 3x3 sheet where cell (col, row) has id `row * 3 + col` and value `id + 1`.
    struct Sheet {
        values: Vec<CellValue>,
    }

    impl Sheet {
        fn new() -> Sheet {
            Sheet {
                values: (0..9).map(|i| CellValue::Number(i as f64 + 1.0)).collect(),
            }
        }

        fn id(&self, at: &CellRef) -> Option<CellId> {
            (at.col < 3 && at.row < 3).then(|| CellId::new(at.row * 3 + at.col))
        }
    }

    impl AddressResolver for Sheet {
        fn resolve_address(&self, at: &CellRef) -> Option<CellId> {
            self.id(at)
        }

        fn resolve_range(&self, start: &CellRef, end: &CellRef) -> Option<Vec<CellId>> {
            self.id(start)?;
            self.id(end)?;
            let mut out = Vec::new();
            for row in start.row.min(end.row)..=start.row.max(end.row) {
                for col in start.col.min(end.col)..=start.col.max(end.col) {
                    out.push(CellId::new(row * 3 + col));
                }
            }
            Some(out)
        }
    }

    impl ValueSource for Sheet {
        fn value_of(&self, id: CellId) -> Option<&CellValue> {
            self.values.get(id.index())
        }
    }

    fn eval(input: &str) -> f64 {
        Parser::parse(input)
            .unwrap_or_else(|e| panic!("{input}: {e}"))
            .evaluate(&Sheet::new())
            .as_number()
    }

    fn eval_on_sheet(input: &str) -> f64 {
        let sheet = Sheet::new();
        Parser::parse_with(input, &sheet)
            .unwrap_or_else(|e| panic!("{input}: {e}"))
            .evaluate(&sheet)
            .as_number()
    }

    #[test]
    fn test_standard_precedence() {
        assert_eq!(eval("2+3*4"), 14.0);
        assert_eq!(eval("(2+3)*4"), 20.0);
        assert_eq!(eval("10-4-3"), 3.0);
        assert_eq!(eval("12/3/2"), 2.0);
        assert_eq!(eval("1 + 2 * 3 - 4 / 2"), 5.0);
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(eval("2^3^2"), 512.0);
        assert_eq!(eval("(2^3)^2"), 64.0);
        assert_eq!(eval("2*3^2"), 18.0);
    }

    #[test]
    fn test_unary_minus_wraps_power() {
        assert_eq!(eval("-2^2"), -4.0);
        assert_eq!(eval("(-2)^2"), 4.0);
        assert_eq!(eval("2^-1"), 0.5);
        assert_eq!(eval("--3"), 3.0);
        assert_eq!(eval("+-+4"), -4.0);
        assert_eq!(eval("3 - -2"), 5.0);
    }

    #[test]
    fn test_whitespace_is_skipped_around_tokens() {
        assert_eq!(eval("  ( 1 +2 ) *  3  "), 9.0);
        assert_eq!(eval("\t4\t/\t2"), 2.0);
    }

    #[test]
    fn test_number_literals() {
        assert_eq!(eval(".5"), 0.5);
        assert_eq!(eval("3."), 3.0);
        assert_eq!(eval("007"), 7.0);
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert_eq!(Parser::parse("1+"), Err(ParseError::UnexpectedEnd { at: 2 }));
        assert_eq!(Parser::parse("(1+2"), Err(ParseError::UnmatchedParen { at: 0 }));
        assert_eq!(
            Parser::parse("1.2.3"),
            Err(ParseError::InvalidNumber {
                at: 0,
                literal: "1.2.3".to_string()
            })
        );
        assert!(matches!(Parser::parse("."), Err(ParseError::InvalidNumber { .. })));
        assert_eq!(
            Parser::parse("1 2"),
            Err(ParseError::UnexpectedTrailingInput { at: 2, ch: '2' })
        );
        assert_eq!(
            Parser::parse("1+)"),
            Err(ParseError::UnexpectedCharacter { at: 2, ch: ')' })
        );
        assert_eq!(
            Parser::parse("2*?"),
            Err(ParseError::UnexpectedCharacter { at: 2, ch: '?' })
        );
        assert_eq!(Parser::parse(""), Err(ParseError::UnexpectedEnd { at: 0 }));
        assert_eq!(
            Parser::parse("1)"),
            Err(ParseError::UnexpectedTrailingInput { at: 1, ch: ')' })
        );
    }

    #[test]
    fn test_references_need_a_resolver() {
        assert_eq!(
            Parser::parse("A1+1"),
            Err(ParseError::UnresolvedAddress {
                at: 0,
                label: "A1".to_string()
            })
        );
    }

    #[test]
    fn test_cell_references_resolve_through_the_sheet() {
        assert_eq!(eval_on_sheet("A1"), 1.0);
        assert_eq!(eval_on_sheet("B2*2"), 10.0);
        assert_eq!(eval_on_sheet("C3 - A1"), 8.0);
        assert_eq!(eval_on_sheet("-B1^2"), -4.0);
    }

    #[test]
    fn test_range_functions() {
        assert_eq!(eval_on_sheet("SUM(A1:B2)"), 1.0 + 2.0 + 4.0 + 5.0);
        assert_eq!(eval_on_sheet("AVG(A1:C1)"), 2.0);
        assert_eq!(eval_on_sheet("MAX(C3:A1)"), 9.0);
        assert_eq!(eval_on_sheet("MIN( B2 : C3 )"), 5.0);
        assert_eq!(eval_on_sheet("SUM(B3)"), 8.0);
        assert_eq!(eval_on_sheet("SUM(A1:A3)*2+1"), 25.0);
    }

    #[test]
    fn test_range_resolves_row_major() {
        let sheet = Sheet::new();
        let expr = Parser::parse_with("SUM(B2:A1)", &sheet).unwrap();
        assert_eq!(
            expr.precedents(),
            [0, 1, 3, 4].map(CellId::new).to_vec()
        );
    }

    #[test]
    fn test_reference_errors() {
        let sheet = Sheet::new();
        let parse = |s: &str| Parser::parse_with(s, &sheet);
        assert_eq!(
            parse("D1"),
            Err(ParseError::UnresolvedAddress {
                at: 0,
                label: "D1".into()
            })
        );
        assert_eq!(
            parse("A0"),
            Err(ParseError::InvalidAddress {
                at: 0,
                label: "A0".into()
            })
        );
        assert_eq!(
            parse("1+ABC"),
            Err(ParseError::InvalidAddress {
                at: 2,
                label: "ABC".into()
            })
        );
        assert_eq!(
            parse("FOO(A1:B2)"),
            Err(ParseError::UnknownFunction {
                at: 0,
                name: "FOO".into()
            })
        );
        assert_eq!(parse("SUM(A1:B2"), Err(ParseError::UnmatchedParen { at: 3 }));
        assert_eq!(
            parse("SUM(A1:B2 x"),
            Err(ParseError::UnexpectedCharacter { at: 10, ch: 'x' })
        );
        assert_eq!(
            parse("SUM(1)"),
            Err(ParseError::UnexpectedCharacter { at: 4, ch: '1' })
        );
        assert_eq!(
            parse("SUM(A1:D9)"),
            Err(ParseError::UnresolvedAddress {
                at: 4,
                label: "A1:D9".into()
            })
        );
        assert_eq!(
            parse("a1"),
            Err(ParseError::UnexpectedCharacter { at: 0, ch: 'a' })
        );
    }

    #[test]
    fn test_parse_input_classification() {
        let sheet = Sheet::new();
        let parse = |s: &str| parse_input(s, &sheet);
        assert_eq!(parse(""), Ok(Expression::Text(String::new())));
        assert_eq!(parse("   "), Ok(Expression::Text(String::new())));
        assert_eq!(parse("Revenue"), Ok(Expression::Text("Revenue".into())));
        assert_eq!(parse("\"42\""), Ok(Expression::Text("42".into())));
        assert_eq!(parse("5"), Ok(Expression::Number(5.0)));
        assert_eq!(parse("=A1"), Ok(Expression::Reference(CellId::new(0))));
        assert!(matches!(parse("-3"), Ok(Expression::Negate(_))));
    }

    #[test]
    fn test_parse_input_never_falls_back_to_text() {
        let sheet = Sheet::new();
        assert!(parse_input("1+", &sheet).is_err());
        assert!(parse_input("(1+2", &sheet).is_err());
        assert!(parse_input("1.2.3", &sheet).is_err());
        assert!(parse_input("=hello", &sheet).is_err());
        assert!(parse_input("=", &sheet).is_err());
    }

    #[test]
    fn test_overflowing_literal_is_rejected() {
        let literal = "9".repeat(400);
        assert_eq!(
            Parser::parse(&format!("1+{literal}")),
            Err(ParseError::InvalidNumber { at: 2, literal })
        );
        assert_eq!(eval(&"9".repeat(308)), 1e308);
    }

    #[test]
    fn test_nested_parentheses_are_capped() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(eval(&nested(MAX_NESTING - 1)), 1.0);
        assert_eq!(
            Parser::parse(&nested(MAX_NESTING)),
            Err(ParseError::TooDeep { at: MAX_NESTING })
        );
        assert_eq!(
            Parser::parse(&nested(100_000)),
            Err(ParseError::TooDeep { at: MAX_NESTING })
        );
    }

    #[test]
    fn test_unary_chains_are_capped() {
        assert_eq!(eval(&format!("{}1", "-".repeat(200))), 1.0);
        assert_eq!(
            Parser::parse(&format!("{}1", "-".repeat(20_000))),
            Err(ParseError::TooDeep { at: MAX_NESTING })
        );
    }

    #[test]
    fn test_long_operator_chains_are_capped() {
        let chain = |n: usize| format!("1{}", "+1".repeat(n));
        assert_eq!(eval(&chain(MAX_DEPTH - 1)), MAX_DEPTH as f64);
        // The failing `+` is the MAX_DEPTH-th one.
        assert_eq!(
            Parser::parse(&chain(50_000)),
            Err(ParseError::TooDeep {
                at: 2 * MAX_DEPTH - 1
            })
        );
    }

    #[test]
    fn test_render_round_trips_through_parser() {
        let sheet = Sheet::new();
        let names = |id: CellId| Some(CellRef::new(id.index() % 3, id.index() / 3));
        for input in [
            "1-(2-3)",
            "-2^2",
            "(-2)^2",
            "2^3^2",
            "(2^3)^2",
            "A1*(B2+C3)/2",
            "SUM(A1:C3)-MAX(B2)",
            "--A1",
            "0.25*4",
        ] {
            let expr = Parser::parse_with(input, &sheet).unwrap();
            let rendered = expr.render(&names);
            assert_eq!(rendered, input);
            assert_eq!(Parser::parse_with(&rendered, &sheet).unwrap(), expr);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arith() -> impl Strategy<Value = String> {
            let leaf = (0u32..100).prop_map(|n| n.to_string());
            leaf.prop_recursive(4, 32, 2, |inner| {
                (inner.clone(), prop::sample::select(vec!['+', '-', '*', '/']), inner)
                    .prop_map(|(l, op, r)| format!("({l}){op}({r})"))
            })
        }

        proptest! {
            #[test]
            fn prop_render_reparses_to_same_tree(src in arith()) {
                let expr = Parser::parse(&src).unwrap();
                let rendered = expr.render(&|_| None);
                prop_assert_eq!(Parser::parse(&rendered).unwrap(), expr);
            }

            #[test]
            fn prop_integer_sums_match_native(a in 0u32..10_000, b in 0u32..10_000, c in 1u32..100) {
                let got = Parser::parse(&format!("{a} + {b} * {c}"))
                    .unwrap()
                    .evaluate(&Sheet::new())
                    .as_number();
                prop_assert_eq!(got, f64::from(a) + f64::from(b) * f64::from(c));
            }
        }
    }
}
