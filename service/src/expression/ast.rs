//! Abstract syntax tree for YANG XPath expressions

use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// or
    Or,
    /// and
    And,
    /// =
    Equal,
    /// !=
    NotEqual,
    /// <
    Less,
    /// <=
    LessOrEqual,
    /// >
    Greater,
    /// >=
    GreaterOrEqual,
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// div
    Divide,
    /// mod
    Modulo,
    /// |
    Union,
}

impl BinaryOp {
    /// Operator text
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "div",
            BinaryOp::Modulo => "mod",
            BinaryOp::Union => "|",
        }
    }
}

/// Location step axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// child
    Child,
    /// parent
    Parent,
    /// self
    SelfAxis,
    /// descendant
    Descendant,
    /// descendant-or-self
    DescendantOrSelf,
    /// ancestor
    Ancestor,
    /// ancestor-or-self
    AncestorOrSelf,
    /// following-sibling
    FollowingSibling,
    /// preceding-sibling
    PrecedingSibling,
}

impl Axis {
    /// Parse an axis name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "parent" => Axis::Parent,
            "self" => Axis::SelfAxis,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            _ => return None,
        })
    }

    /// Axis name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Parent => "parent",
            Axis::SelfAxis => "self",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
        }
    }

    /// Whether proximity positions count backwards in document order
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf | Axis::PrecedingSibling
        )
    }
}

/// Node test of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `prefix:local` or `local`
    Name {
        /// Optional prefix
        prefix: Option<String>,
        /// Local name
        local: String,
    },
    /// `*` or `prefix:*`
    Wildcard {
        /// Optional prefix
        prefix: Option<String>,
    },
    /// `node()`
    Node,
    /// `text()`
    Text,
}

/// One location step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Axis
    pub axis: Axis,
    /// Node test
    pub test: NodeTest,
    /// Predicates applied in order
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `..`
    #[must_use]
    pub fn parent() -> Self {
        Self {
            axis: Axis::Parent,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }

    /// `.`
    #[must_use]
    pub fn current() -> Self {
        Self {
            axis: Axis::SelfAxis,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }

    /// `descendant-or-self::node()`, the expansion of `//`
    #[must_use]
    pub fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// Location path
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Starts at the root
    pub absolute: bool,
    /// Steps in order
    pub steps: Vec<Step>,
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// String literal
    Literal(String),
    /// Location path
    Path(LocationPath),
    /// Primary expression with predicates, optionally followed by a path
    Filter {
        /// Primary expression
        primary: Box<Expr>,
        /// Predicates on the primary result
        predicates: Vec<Expr>,
        /// Relative steps after `/`
        steps: Vec<Step>,
    },
    /// Function call
    FunctionCall {
        /// Function name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Unary minus
    Negate(Box<Expr>),
}

impl Expr {
    /// Create a binary expression
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Call `visit` on this expression and every sub-expression
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Number(_) | Expr::Literal(_) => {}
            Expr::Path(path) => {
                for step in &path.steps {
                    for predicate in &step.predicates {
                        predicate.walk(visit);
                    }
                }
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                primary.walk(visit);
                for predicate in predicates {
                    predicate.walk(visit);
                }
                for step in steps {
                    for predicate in &step.predicates {
                        predicate.walk(visit);
                    }
                }
            }
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    arg.walk(visit);
                }
            }
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Negate(inner) => inner.walk(visit),
        }
    }
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeTest::Name {
                prefix: Some(prefix),
                local,
            } => write!(f, "{prefix}:{local}"),
            NodeTest::Name { prefix: None, local } => f.write_str(local),
            NodeTest::Wildcard { prefix: Some(prefix) } => write!(f, "{prefix}:*"),
            NodeTest::Wildcard { prefix: None } => f.write_str("*"),
            NodeTest::Node => f.write_str("node()"),
            NodeTest::Text => f.write_str("text()"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.axis, &self.test) {
            (Axis::Parent, NodeTest::Node) => f.write_str("..")?,
            (Axis::SelfAxis, NodeTest::Node) => f.write_str(".")?,
            (Axis::Child, test) => write!(f, "{test}")?,
            (axis, test) => write!(f, "{}::{test}", axis.name())?,
        }
        for predicate in &self.predicates {
            write!(f, "[{predicate}]")?;
        }
        Ok(())
    }
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[Step], leading_slash: bool) -> fmt::Result {
    for (i, step) in steps.iter().enumerate() {
        if i > 0 || leading_slash {
            f.write_str("/")?;
        }
        write!(f, "{step}")?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Literal(s) if s.contains('\'') => write!(f, "\"{s}\""),
            Expr::Literal(s) => write!(f, "'{s}'"),
            Expr::Path(path) => {
                if path.absolute && path.steps.is_empty() {
                    return f.write_str("/");
                }
                write_steps(f, &path.steps, path.absolute)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                write!(f, "{primary}")?;
                for predicate in predicates {
                    write!(f, "[{predicate}]")?;
                }
                write_steps(f, steps, true)
            }
            Expr::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {} {right})", op.symbol()),
            Expr::Negate(inner) => write!(f, "-{inner}"),
        }
    }
}
