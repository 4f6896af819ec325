//! XPath 1.0 parser for `must`, `when` and `path` statements

use super::ast::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use super::error::ParseError;
use super::functions::FunctionRegistry;
use std::sync::Arc;

/// Token types for the expression parser
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Literal(String),
    Name { prefix: Option<String>, local: String },
    Wildcard { prefix: Option<String> },
    FunctionName(String),
    NodeType(String),
    AxisName(String),
    Operator(BinaryOp),
    Minus,
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Comma,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Variable(String),
    Eof,
}

impl Token {
    /// Whether a following `*` or name must be read as an operator
    fn allows_operator_after(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::AxisName(_)
                | Token::LeftParen
                | Token::LeftBracket
                | Token::Comma
                | Token::Operator(_)
                | Token::Minus
                | Token::Slash
                | Token::DoubleSlash
        )
    }

    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Literal(s) => format!("'{s}'"),
            Token::Name {
                prefix: Some(p),
                local,
            } => format!("{p}:{local}"),
            Token::Name { prefix: None, local } => local.clone(),
            Token::Wildcard { .. } => "*".to_string(),
            Token::FunctionName(n) | Token::NodeType(n) | Token::AxisName(n) => n.clone(),
            Token::Operator(op) => op.symbol().to_string(),
            Token::Minus => "-".to_string(),
            Token::Slash => "/".to_string(),
            Token::DoubleSlash => "//".to_string(),
            Token::Dot => ".".to_string(),
            Token::DotDot => "..".to_string(),
            Token::At => "@".to_string(),
            Token::Comma => ",".to_string(),
            Token::LeftParen => "(".to_string(),
            Token::RightParen => ")".to_string(),
            Token::LeftBracket => "[".to_string(),
            Token::RightBracket => "]".to_string(),
            Token::Variable(v) => format!("${v}"),
            Token::Eof => "<end>".to_string(),
        }
    }
}

/// Tokenizer for breaking input into tokens
struct Tokenizer<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
    tokens: Vec<(Token, usize)>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().collect(),
            index: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).map(|(_, c)| *c)
    }

    fn position(&self) -> usize {
        self.chars
            .get(self.index)
            .map_or(self.input.len(), |(pos, _)| *pos)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.index += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.index += 1;
        }
    }

    fn operator_context(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|(token, _)| token.allows_operator_after())
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        loop {
            self.skip_whitespace();
            let position = self.position();
            let Some(ch) = self.peek() else {
                self.tokens.push((Token::Eof, position));
                return Ok(self.tokens);
            };
            let token = match ch {
                '(' => self.single(Token::LeftParen),
                ')' => self.single(Token::RightParen),
                '[' => self.single(Token::LeftBracket),
                ']' => self.single(Token::RightBracket),
                ',' => self.single(Token::Comma),
                '@' => self.single(Token::At),
                '|' => self.single(Token::Operator(BinaryOp::Union)),
                '+' => self.single(Token::Operator(BinaryOp::Add)),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Operator(BinaryOp::Equal)),
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        Token::Operator(BinaryOp::NotEqual)
                    } else {
                        return Err(ParseError::UnexpectedToken {
                            token: "!".to_string(),
                            position,
                        });
                    }
                }
                '<' | '>' => {
                    self.advance();
                    let or_equal = self.peek() == Some('=');
                    if or_equal {
                        self.advance();
                    }
                    Token::Operator(match (ch, or_equal) {
                        ('<', false) => BinaryOp::Less,
                        ('<', true) => BinaryOp::LessOrEqual,
                        (_, false) => BinaryOp::Greater,
                        (_, true) => BinaryOp::GreaterOrEqual,
                    })
                }
                '/' => {
                    self.advance();
                    if self.peek() == Some('/') {
                        self.advance();
                        Token::DoubleSlash
                    } else {
                        Token::Slash
                    }
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.read_number()?
                    } else if self.peek_at(1) == Some('.') {
                        self.index += 2;
                        Token::DotDot
                    } else {
                        self.single(Token::Dot)
                    }
                }
                '\'' | '"' => self.read_literal(ch)?,
                '0'..='9' => self.read_number()?,
                '*' => {
                    self.advance();
                    if self.operator_context() {
                        Token::Operator(BinaryOp::Multiply)
                    } else {
                        Token::Wildcard { prefix: None }
                    }
                }
                '$' => {
                    self.advance();
                    let name = self.read_ncname();
                    Token::Variable(name)
                }
                c if is_name_start(c) => self.read_name_token(),
                other => {
                    return Err(ParseError::UnexpectedToken {
                        token: other.to_string(),
                        position,
                    });
                }
            };
            self.tokens.push((token, position));
        }
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn read_ncname(&mut self) -> String {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if is_name_char(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        name
    }

    fn read_name_token(&mut self) -> Token {
        let first = self.read_ncname();

        if self.operator_context() {
            let op = match first.as_str() {
                "and" => Some(BinaryOp::And),
                "or" => Some(BinaryOp::Or),
                "div" => Some(BinaryOp::Divide),
                "mod" => Some(BinaryOp::Modulo),
                _ => None,
            };
            if let Some(op) = op {
                return Token::Operator(op);
            }
        }

        // prefix:local or prefix:*
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            if self.peek_at(1) == Some('*') {
                self.index += 2;
                return Token::Wildcard {
                    prefix: Some(first),
                };
            }
            if self.peek_at(1).is_some_and(is_name_start) {
                self.advance();
                let local = self.read_ncname();
                return self.classify_name(Some(first), local);
            }
        }
        self.classify_name(None, first)
    }

    fn classify_name(&mut self, prefix: Option<String>, local: String) -> Token {
        let saved = self.index;
        self.skip_whitespace();
        let next = self.peek();
        let next2 = self.peek_at(1);
        self.index = saved;

        if prefix.is_none() && next == Some(':') && next2 == Some(':') {
            self.skip_whitespace();
            self.index += 2;
            return Token::AxisName(local);
        }
        if next == Some('(') {
            let full = match &prefix {
                Some(p) => format!("{p}:{local}"),
                None => local,
            };
            return match full.as_str() {
                "node" | "text" | "comment" | "processing-instruction" => Token::NodeType(full),
                _ => Token::FunctionName(full),
            };
        }
        Token::Name { prefix, local }
    }

    fn read_number(&mut self) -> Result<Token, ParseError> {
        let start = self.position();
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '.' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::InvalidNumber {
                value: text,
                position: start,
            })
    }

    fn read_literal(&mut self, quote: char) -> Result<Token, ParseError> {
        let start = self.position();
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(Token::Literal(value)),
                Some(ch) => value.push(ch),
                None => return Err(ParseError::UnterminatedString { position: start }),
            }
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

/// Expression parser
#[derive(Debug, Clone)]
pub struct Parser {
    max_depth: usize,
    max_length: usize,
    functions: Arc<FunctionRegistry>,
}

impl Parser {
    /// Create a new parser with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: 100,
            max_length: 10_000,
            functions: Arc::new(FunctionRegistry::new()),
        }
    }

    /// Create a parser with custom limits
    #[must_use]
    pub fn with_limits(max_depth: usize, max_length: usize) -> Self {
        Self {
            max_depth,
            max_length,
            ..Self::new()
        }
    }

    /// Use `functions` to check function names and arity
    #[must_use]
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Parse an expression string
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for malformed input, unknown functions, wrong
    /// arity, or when the length or nesting limits are exceeded.
    pub fn parse(&self, input: &str) -> Result<Expr, ParseError> {
        if input.len() > self.max_length {
            return Err(ParseError::TooLong {
                length: input.len(),
                max: self.max_length,
            });
        }

        let tokens = Tokenizer::new(input).tokenize()?;
        let mut parser = ParserState {
            tokens,
            index: 0,
            depth: 0,
            max_depth: self.max_depth,
            functions: &self.functions,
        };

        let expr = parser.parse_expression()?;

        if parser.current() != &Token::Eof {
            return Err(ParseError::TrailingInput {
                input: input[parser.position()..].to_string(),
            });
        }

        Ok(expr)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal parser state
struct ParserState<'a> {
    tokens: Vec<(Token, usize)>,
    index: usize,
    depth: usize,
    max_depth: usize,
    functions: &'a FunctionRegistry,
}

impl ParserState<'_> {
    fn current(&self) -> &Token {
        self.tokens.get(self.index).map_or(&Token::Eof, |(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map_or(0, |(_, p)| *p)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn unexpected(&self) -> ParseError {
        match self.current() {
            Token::Eof => ParseError::UnexpectedEof {
                position: self.position(),
            },
            token => ParseError::UnexpectedToken {
                token: token.describe(),
                position: self.position(),
            },
        }
    }

    fn expect(&mut self, token: &Token, delimiter: char) -> Result<(), ParseError> {
        if self.current() == token {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::MissingDelimiter {
                delimiter,
                position: self.position(),
            })
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::TooDeep {
                depth: self.depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_left_assoc(
        &mut self,
        ops: &[BinaryOp],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        loop {
            let op = match self.current() {
                Token::Operator(op) if ops.contains(op) => *op,
                Token::Minus if ops.contains(&BinaryOp::Subtract) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();
            let right = next(self)?;
            left = Expr::binary(op, left, right);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(&[BinaryOp::Or], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(&[BinaryOp::And], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(&[BinaryOp::Equal, BinaryOp::NotEqual], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            &[
                BinaryOp::Less,
                BinaryOp::LessOrEqual,
                BinaryOp::Greater,
                BinaryOp::GreaterOrEqual,
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(&[BinaryOp::Add, BinaryOp::Subtract], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            &[BinaryOp::Multiply, BinaryOp::Divide, BinaryOp::Modulo],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.current() == &Token::Minus {
            self.advance();
            self.enter()?;
            let inner = self.parse_unary();
            self.leave();
            return Ok(Expr::Negate(Box::new(inner?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(&[BinaryOp::Union], Self::parse_path_expr)
    }

    fn starts_filter_expr(&self) -> bool {
        matches!(
            self.current(),
            Token::Literal(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::FunctionName(_)
                | Token::Variable(_)
        )
    }

    fn parse_path_expr(&mut self) -> Result<Expr, ParseError> {
        if !self.starts_filter_expr() {
            return self.parse_location_path().map(Expr::Path);
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let mut steps = Vec::new();
        loop {
            match self.current() {
                Token::Slash => {
                    self.advance();
                    steps.push(self.parse_step()?);
                }
                Token::DoubleSlash => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }

        if predicates.is_empty() && steps.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            })
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let position = self.position();
        match self.advance() {
            Token::Literal(value) => Ok(Expr::Literal(value)),
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::LeftParen => {
                let inner = self.parse_expression()?;
                self.expect(&Token::RightParen, ')')?;
                Ok(inner)
            }
            Token::Variable(name) => Err(ParseError::UnboundVariable { name, position }),
            Token::FunctionName(name) => self.parse_function_call(name, position),
            _ => {
                self.index = self.index.saturating_sub(1);
                Err(self.unexpected())
            }
        }
    }

    fn parse_function_call(&mut self, name: String, position: usize) -> Result<Expr, ParseError> {
        self.expect(&Token::LeftParen, '(')?;
        let mut args = Vec::new();
        if self.current() != &Token::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if self.current() == &Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::RightParen, ')')?;

        let Some((min, max)) = self.functions.arity(&name) else {
            return Err(ParseError::UnknownFunction { name, position });
        };
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            let expected = match max {
                Some(max) if max == min => min.to_string(),
                Some(max) => format!("{min} to {max}"),
                None => format!("at least {min}"),
            };
            return Err(ParseError::WrongArity {
                name,
                expected,
                actual: args.len(),
            });
        }
        Ok(Expr::FunctionCall { name, args })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut predicates = Vec::new();
        while self.current() == &Token::LeftBracket {
            self.advance();
            predicates.push(self.parse_expression()?);
            self.expect(&Token::RightBracket, ']')?;
        }
        Ok(predicates)
    }

    fn parse_location_path(&mut self) -> Result<LocationPath, ParseError> {
        let mut steps = Vec::new();
        let absolute = match self.current() {
            Token::Slash => {
                self.advance();
                if !self.starts_step() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Token::DoubleSlash => {
                self.advance();
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.parse_step()?);
        loop {
            match self.current() {
                Token::Slash => {
                    self.advance();
                    steps.push(self.parse_step()?);
                }
                Token::DoubleSlash => {
                    self.advance();
                    steps.push(Step::descendant_or_self());
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }
        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.current(),
            Token::Name { .. }
                | Token::Wildcard { .. }
                | Token::NodeType(_)
                | Token::AxisName(_)
                | Token::Dot
                | Token::DotDot
                | Token::At
        )
    }

    fn parse_step(&mut self) -> Result<Step, ParseError> {
        match self.current() {
            Token::Dot => {
                self.advance();
                return Ok(Step::current());
            }
            Token::DotDot => {
                self.advance();
                return Ok(Step::parent());
            }
            _ => {}
        }

        let position = self.position();
        let axis = match self.current().clone() {
            Token::AxisName(name) => {
                self.advance();
                Axis::from_name(&name).ok_or(ParseError::UnknownAxis { name, position })?
            }
            Token::At => {
                // Attributes never exist in a YANG data tree.
                return Err(self.unexpected());
            }
            _ => Axis::Child,
        };

        let test = match self.advance() {
            Token::Name { prefix, local } => NodeTest::Name { prefix, local },
            Token::Wildcard { prefix } => NodeTest::Wildcard { prefix },
            Token::NodeType(kind) => {
                self.expect(&Token::LeftParen, '(')?;
                self.expect(&Token::RightParen, ')')?;
                match kind.as_str() {
                    "node" => NodeTest::Node,
                    _ => NodeTest::Text,
                }
            }
            _ => {
                self.index = self.index.saturating_sub(1);
                return Err(self.unexpected());
            }
        };

        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Expr {
        Parser::new().parse(input).expect("valid expression")
    }

    #[test]
    fn test_relative_path_comparison() {
        let expr = parse("../leaf1 = 'leaf1'");
        let Expr::Binary { op, left, right } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Equal);
        assert_eq!(*right, Expr::Literal("leaf1".to_string()));
        let Expr::Path(path) = *left else {
            panic!("expected path");
        };
        assert!(!path.absolute);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0], Step::parent());
    }

    #[test]
    fn test_names_with_hyphen_and_prefix() {
        let expr = parse("/validation:validation/leaflist-range/leaflist-type");
        assert_eq!(expr.to_string(), "/validation:validation/leaflist-range/leaflist-type");
    }

    #[test]
    fn test_operator_disambiguation() {
        let expr = parse("count(a) * 2 div 1 mod 3 > 0 and b or c");
        assert_eq!(
            expr.to_string(),
            "((((((count(a) * 2) div 1) mod 3) > 0) and b) or c)"
        );

        // `*` after `/` is a wildcard, names `and`/`or` at step position are names
        let expr = parse("../*/and");
        let Expr::Path(path) = expr else {
            panic!("expected path");
        };
        assert_eq!(path.steps[1].test, NodeTest::Wildcard { prefix: None });
        assert_eq!(
            path.steps[2].test,
            NodeTest::Name {
                prefix: None,
                local: "and".to_string()
            }
        );
    }

    #[test]
    fn test_current_with_path_and_predicate() {
        let expr = parse("/ifs/interface[name = current()/../ifname]/type");
        let Expr::Path(path) = expr else {
            panic!("expected path");
        };
        assert!(path.absolute);
        assert_eq!(path.steps[1].predicates.len(), 1);
        let Expr::Binary { right, .. } = &path.steps[1].predicates[0] else {
            panic!("expected comparison");
        };
        assert!(matches!(**right, Expr::Filter { ref steps, .. } if steps.len() == 2));
    }

    #[test]
    fn test_axis_and_node_type() {
        let expr = parse("ancestor-or-self::node()/following-sibling::x[1]");
        assert_eq!(expr.to_string(), "ancestor-or-self::node()/following-sibling::x[1]");
    }

    #[test]
    fn test_negative_number_and_subtraction() {
        assert_eq!(parse("-1").to_string(), "-1");
        assert_eq!(parse("a - -1").to_string(), "(a - -1)");
    }

    #[test]
    fn test_errors() {
        let parser = Parser::new();
        assert!(matches!(parser.parse("count(a"), Err(ParseError::MissingDelimiter { delimiter: ')', .. })));
        assert!(matches!(parser.parse("unknown-fn(a)"), Err(ParseError::UnknownFunction { .. })));
        assert!(matches!(parser.parse("count(a, b)"), Err(ParseError::WrongArity { .. })));
        assert!(matches!(parser.parse("'abc"), Err(ParseError::UnterminatedString { .. })));
        assert!(matches!(parser.parse("a b"), Err(ParseError::TrailingInput { .. })));
        assert!(matches!(parser.parse("$x"), Err(ParseError::UnboundVariable { .. })));

        let limited = Parser::with_limits(3, 10);
        assert!(matches!(limited.parse("((((((1))))))"), Err(ParseError::TooLong { .. } | ParseError::TooDeep { .. })));
        assert!(matches!(limited.parse("((((1))))"), Err(ParseError::TooDeep { .. })));
    }
}
