/// Source span as a byte range.
pub type Span = std::ops::Range<usize>;

/// An AST node with source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// The wrapped AST node.
    pub node: T,
    /// The byte range of this node in the source text.
    pub span: Span,
}

// ---------------------------------------------------------------------------
// Catalog files
// ---------------------------------------------------------------------------

/// A parsed catalog definition file.
#[derive(Debug, Clone)]
pub struct CatalogFile {
    /// Item declarations in file order.
    pub items: Vec<Spanned<ItemDecl>>,
}

/// `item <id> { ... }`
#[derive(Debug, Clone)]
pub struct ItemDecl {
    /// The item id.
    pub id: Spanned<String>,
    /// Property lines in source order.
    pub properties: Vec<Spanned<ItemProperty>>,
}

/// One `key value` line inside an item declaration.
#[derive(Debug, Clone)]
pub struct ItemProperty {
    /// Property name, e.g. `total`.
    pub key: Spanned<String>,
    /// Literal or script body.
    pub value: PropertyValue,
}

/// The value side of an item property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A string literal.
    Str(String),
    /// An integer literal.
    Integer(i64),
    /// `true` or `false`.
    Boolean(bool),
    /// A braced script body. The span covers the braces themselves.
    Body(Span),
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// A statement list.
pub type Block = Vec<Spanned<Stmt>>;

/// An effect statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = value`
    Let {
        /// The new local.
        name: Spanned<String>,
        /// Initial value.
        value: Spanned<Expr>,
    },
    /// `target = value`, where target is a field or a local.
    Assign {
        /// Field or local name.
        target: Spanned<String>,
        /// Assigned value.
        value: Spanned<Expr>,
    },
    /// `if c { .. } else if c { .. } else { .. }`
    If {
        /// Condition and body of the `if` and each `else if`.
        branches: Vec<(Spanned<Expr>, Block)>,
        /// The final `else`, if any.
        otherwise: Option<Block>,
    },
    /// `return` or `return value`
    Return(Option<Spanned<Expr>>),
    /// `pass`
    Pass,
    /// A bare expression, normally a call.
    Expr(Spanned<Expr>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Boolean literal.
    Boolean(bool),
    /// A field, local, signal literal, or reply literal; resolved by the
    /// compiler.
    Name(String),
    /// `not x` or `-x`.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        expr: Box<Spanned<Expr>>,
    },
    /// `lhs op rhs`.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Spanned<Expr>>,
        /// Right operand.
        rhs: Box<Spanned<Expr>>,
    },
    /// `name(args..)`, a built-in function.
    Call {
        /// Function name.
        name: Spanned<String>,
        /// Arguments in order.
        args: Vec<Spanned<Expr>>,
    },
    /// `choose { w: expr, .. }`
    Choose(Vec<(Spanned<f64>, Spanned<Expr>)>),
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `not`
    Not,
    /// `-`
    Neg,
}

/// Infix operators, loosest binding last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`, also string concatenation.
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `and`
    And,
    /// `or`
    Or,
}

impl BinaryOp {
    /// Source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}
