//! Recursive descent parser for query expressions.
//!
//! Operator precedence, lowest to highest:
//!
//! 1. `or`
//! 2. `and`
//! 3. `=`, `!=`
//! 4. `<`, `<=`, `>`, `>=`
//! 5. `+`, `-`
//! 6. `*`, `div`, `mod`
//! 7. unary `-`
//! 8. `|`
//! 9. path and filter expressions
//!
//! Each grammar production is a method on the internal `Parser`. Name test
//! prefixes are resolved against the [`Namespaces`] given to [`parse`], and
//! function names against the [`Function`] library, so a successfully
//! parsed expression cannot fail on a lookup later.

use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, Step};
use super::lexer::{Lexer, Token};
use super::Namespaces;
use crate::error::{Error, Result};

/// Maximum nesting of parentheses, predicates and function arguments.
/// Each level costs a dozen parser frames and a handful of evaluator
/// frames, so this stays well inside a 2 MB thread stack.
const MAX_NESTING: usize = 32;

/// Maximum number of operators (binary, union and unary minus) in one
/// expression.
const MAX_OPERATORS: usize = 1024;

/// Parses an expression, resolving prefixes through `namespaces`.
///
/// # Errors
///
/// Returns [`Error::InvalidQuerySyntax`] with the byte offset of the
/// offending token, or [`Error::UnknownFunction`] for a call to a function
/// outside the library.
pub fn parse(input: &str, namespaces: &Namespaces) -> Result<Expr> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(Error::query("empty expression", 0));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
        operators: 0,
        namespaces,
    };
    let expr = parser.parse_or_expr()?;

    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected '{token}' after expression")));
    }
    Ok(expr)
}

struct Parser<'n> {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    /// Offset reported for errors at end of input.
    end: usize,
    depth: usize,
    operators: usize,
    namespaces: &'n Namespaces,
}

impl Parser<'_> {
    // -----------------------------------------------------------------------
    // Token access
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{token}', found {}",
                self.describe_current()
            )))
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |&(_, o)| o)
    }

    fn describe_current(&self) -> String {
        self.peek()
            .map_or_else(|| "end of expression".to_string(), |t| format!("'{t}'"))
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::query(message, self.offset())
    }

    // -----------------------------------------------------------------------
    // Operators
    // -----------------------------------------------------------------------

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Parses a nested expression, bounding the recursion depth.
    fn parse_nested(&mut self) -> Result<Expr> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("expression nested deeper than {MAX_NESTING} levels")));
        }
        self.depth += 1;
        let expr = self.parse_or_expr();
        self.depth -= 1;
        expr
    }

    /// Counts the operator at the current token and consumes it.
    fn take_operator(&mut self) -> Result<()> {
        if self.operators >= MAX_OPERATORS {
            return Err(self.error(format!("more than {MAX_OPERATORS} operators in expression")));
        }
        self.operators += 1;
        self.pos += 1;
        Ok(())
    }

    /// `OrExpr ::= AndExpr ('or' AndExpr)*`
    fn parse_or_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expr()?;
        while self.check(&Token::Or) {
            self.take_operator()?;
            let right = self.parse_and_expr()?;
            left = Self::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    /// `AndExpr ::= EqualityExpr ('and' EqualityExpr)*`
    fn parse_and_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality_expr()?;
        while self.check(&Token::And) {
            self.take_operator()?;
            let right = self.parse_equality_expr()?;
            left = Self::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    /// `EqualityExpr ::= RelationalExpr (('=' | '!=') RelationalExpr)*`
    fn parse_equality_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Eq,
                Some(Token::NotEqual) => BinaryOp::Neq,
                _ => break,
            };
            self.take_operator()?;
            let right = self.parse_relational_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// `RelationalExpr ::= AdditiveExpr (('<' | '<=' | '>' | '>=') AdditiveExpr)*`
    fn parse_relational_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::LessThan) => BinaryOp::Lt,
                Some(Token::LessThanEqual) => BinaryOp::Lte,
                Some(Token::GreaterThan) => BinaryOp::Gt,
                Some(Token::GreaterThanEqual) => BinaryOp::Gte,
                _ => break,
            };
            self.take_operator()?;
            let right = self.parse_additive_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// `AdditiveExpr ::= MultiplicativeExpr (('+' | '-') MultiplicativeExpr)*`
    fn parse_additive_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.take_operator()?;
            let right = self.parse_multiplicative_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// `MultiplicativeExpr ::= UnaryExpr (('*' | 'div' | 'mod') UnaryExpr)*`
    fn parse_multiplicative_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Div) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => break,
            };
            self.take_operator()?;
            let right = self.parse_unary_expr()?;
            left = Self::binary(op, left, right);
        }
        Ok(left)
    }

    /// `UnaryExpr ::= '-'* UnionExpr`
    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let mut negations = 0;
        while self.check(&Token::Minus) {
            self.take_operator()?;
            negations += 1;
        }
        let mut expr = self.parse_union_expr()?;
        for _ in 0..negations {
            expr = Expr::UnaryNeg(Box::new(expr));
        }
        Ok(expr)
    }

    /// `UnionExpr ::= PathExpr ('|' PathExpr)*`
    fn parse_union_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_path_expr()?;
        while self.check(&Token::Pipe) {
            self.take_operator()?;
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // -----------------------------------------------------------------------
    // Paths and filters
    // -----------------------------------------------------------------------

    /// ```text
    /// PathExpr ::= LocationPath
    ///            | FilterExpr
    ///            | FilterExpr '/' RelativeLocationPath
    ///            | FilterExpr '//' RelativeLocationPath
    /// ```
    fn parse_path_expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(
                Token::Slash
                | Token::DoubleSlash
                | Token::Dot
                | Token::DotDot
                | Token::At
                | Token::AxisName(_)
                | Token::NodeType(_)
                | Token::Name(_),
            ) => self.parse_location_path(),

            Some(
                Token::VariableReference(_)
                | Token::Literal(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::FunctionName(_),
            ) => {
                let primary = self.parse_primary_expr()?;
                let predicates = self.parse_predicates()?;
                let mut steps = Vec::new();
                if self.eat(&Token::DoubleSlash) {
                    steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
                    self.parse_relative_location_path_into(&mut steps)?;
                } else if self.eat(&Token::Slash) {
                    self.parse_relative_location_path_into(&mut steps)?;
                }
                if predicates.is_empty() && steps.is_empty() {
                    Ok(primary)
                } else {
                    Ok(Expr::Filter {
                        expr: Box::new(primary),
                        predicates,
                        steps,
                    })
                }
            }

            _ => Err(self.error(format!(
                "expected expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// ```text
    /// PrimaryExpr ::= VariableReference | '(' Expr ')' | Literal | Number | FunctionCall
    /// ```
    fn parse_primary_expr(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::VariableReference(name)) => {
                Err(self.error(format!("variable references are not supported (${name})")))
            }
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::String(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::LeftParen) => {
                self.pos += 1;
                let expr = self.parse_nested()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Some(Token::FunctionName(name)) => self.parse_function_call(&name),
            _ => Err(self.error(format!(
                "expected primary expression, found {}",
                self.describe_current()
            ))),
        }
    }

    /// `FunctionCall ::= FunctionName '(' (Argument (',' Argument)*)? ')'`
    fn parse_function_call(&mut self, name: &str) -> Result<Expr> {
        let position = self.offset();
        let function = Function::lookup(name).ok_or_else(|| Error::UnknownFunction {
            name: name.to_string(),
            position,
        })?;
        self.pos += 1;
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !self.check(&Token::RightParen) {
            args.push(self.parse_nested()?);
            while self.eat(&Token::Comma) {
                args.push(self.parse_nested()?);
            }
        }
        self.expect(&Token::RightParen)?;

        if !function.accepts(args.len()) {
            let (min, max) = function.arity();
            let expected = match max {
                Some(max) if max == min => format!("{min}"),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(Error::query(
                format!(
                    "{function}() takes {expected} argument(s), {} given",
                    args.len()
                ),
                position,
            ));
        }
        Ok(Expr::FunctionCall { function, args })
    }

    /// ```text
    /// LocationPath ::= RelativeLocationPath | '/' RelativeLocationPath? | '//' RelativeLocationPath
    /// ```
    fn parse_location_path(&mut self) -> Result<Expr> {
        let mut steps = Vec::new();
        if self.eat(&Token::Slash) {
            if self.is_step_start() {
                self.parse_relative_location_path_into(&mut steps)?;
            }
            Ok(Expr::Path {
                absolute: true,
                steps,
            })
        } else if self.eat(&Token::DoubleSlash) {
            steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
            self.parse_relative_location_path_into(&mut steps)?;
            Ok(Expr::Path {
                absolute: true,
                steps,
            })
        } else {
            self.parse_relative_location_path_into(&mut steps)?;
            Ok(Expr::Path {
                absolute: false,
                steps,
            })
        }
    }

    /// ```text
    /// RelativeLocationPath ::= Step (('/' | '//') Step)*
    /// ```
    fn parse_relative_location_path_into(&mut self, steps: &mut Vec<Step>) -> Result<()> {
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step::new(Axis::DescendantOrSelf, NodeTest::Node));
            } else if !self.eat(&Token::Slash) {
                return Ok(());
            }
            steps.push(self.parse_step()?);
        }
    }

    fn is_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::Name(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
            )
        )
    }

    /// ```text
    /// Step ::= AxisSpecifier NodeTest Predicate* | '.' | '..'
    /// ```
    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::Self_, NodeTest::Node));
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = self.parse_axis_specifier()?;
        let node_test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    /// `AxisSpecifier ::= AxisName '::' | '@'?`
    fn parse_axis_specifier(&mut self) -> Result<Axis> {
        if self.eat(&Token::At) {
            return Ok(Axis::Attribute);
        }
        let Some(Token::AxisName(name)) = self.peek().cloned() else {
            return Ok(Axis::Child);
        };
        let axis = match Axis::parse(&name) {
            Some(axis) => axis,
            None if name == "namespace" => {
                return Err(self.error("the namespace axis is not supported"))
            }
            None => return Err(self.error(format!("unknown axis '{name}'"))),
        };
        self.pos += 1;
        self.expect(&Token::ColonColon)?;
        Ok(axis)
    }

    /// ```text
    /// NodeTest ::= NameTest | NodeType '(' ')' | 'processing-instruction' '(' Literal ')'
    /// ```
    fn parse_node_test(&mut self) -> Result<NodeTest> {
        match self.peek().cloned() {
            Some(Token::NodeType(name)) => {
                self.pos += 1;
                self.expect(&Token::LeftParen)?;
                let test = match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RightParen)?;
                Ok(test)
            }
            Some(Token::Name(name)) => {
                let test = self.resolve_name_test(&name)?;
                self.pos += 1;
                Ok(test)
            }
            _ => Err(self.error(format!(
                "expected node test, found {}",
                self.describe_current()
            ))),
        }
    }

    fn resolve_name_test(&self, name: &str) -> Result<NodeTest> {
        if name == "*" {
            return Ok(NodeTest::Wildcard);
        }
        let Some((prefix, local)) = name.split_once(':') else {
            return Ok(NodeTest::Name {
                namespace: None,
                local: name.to_string(),
            });
        };
        let uri = self
            .namespaces
            .resolve(prefix)
            .ok_or_else(|| self.error(format!("undefined namespace prefix '{prefix}'")))?
            .to_string();
        if local == "*" {
            Ok(NodeTest::NamespaceWildcard(uri))
        } else {
            Ok(NodeTest::Name {
                namespace: Some(uri),
                local: local.to_string(),
            })
        }
    }

    /// `Predicate ::= '[' Expr ']'`
    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.parse_nested()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}
