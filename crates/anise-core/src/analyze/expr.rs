use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::ast::{Symbol, Value};
use crate::runtime::Var;

use super::frame::FrameId;

/// Where an expression sits relative to its enclosing function body:
/// `Tail` is the returned position, `Statement` a discarded one, and
/// `Value` a nested expression whose result feeds an enclosing form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprPosition {
    Value,
    Statement,
    Tail,
}

/// Common record embedded in every expression variant.
#[derive(Clone, Debug)]
pub struct ExprBase {
    pub position: ExprPosition,
    pub frame: FrameId,
    pub needs_box: bool,
}

impl ExprBase {
    pub fn new(position: ExprPosition, frame: FrameId, needs_box: bool) -> Self {
        Self {
            position,
            frame,
            needs_box,
        }
    }
}

/// Per-arity analysis state. Created fresh for each arity; `recur` in
/// the body flips `is_tail_recursive`.
#[derive(Clone, Debug, Default)]
pub struct FunctionContext {
    pub param_count: usize,
    pub is_variadic: bool,
    pub is_tail_recursive: bool,
}

pub type FnCtxRef = Rc<RefCell<FunctionContext>>;

#[derive(Clone, Debug)]
pub struct PrimitiveLiteral {
    pub base: ExprBase,
    pub value: Value,
}

/// Reference to a local; the binding is addressed by the frame whose
/// locals hold it plus the symbol name.
#[derive(Clone, Debug)]
pub struct LocalReference {
    pub base: ExprBase,
    pub name: Symbol,
    pub binding_frame: FrameId,
}

#[derive(Clone, Debug)]
pub struct VarDeref {
    pub base: ExprBase,
    pub qualified_name: Symbol,
    pub var: Arc<Var>,
}

/// Reifies the var itself rather than its value.
#[derive(Clone, Debug)]
pub struct VarRef {
    pub base: ExprBase,
    pub qualified_name: Symbol,
    pub var: Arc<Var>,
}

#[derive(Clone, Debug)]
pub struct Def {
    pub base: ExprBase,
    pub name: Symbol,
    pub value: Option<Box<Expr>>,
}

#[derive(Clone, Debug)]
pub struct If {
    pub base: ExprBase,
    pub condition: Box<Expr>,
    pub then: Box<Expr>,
    pub else_: Option<Box<Expr>>,
}

#[derive(Clone, Debug)]
pub struct Let {
    pub base: ExprBase,
    pub frame: FrameId,
    pub pairs: Vec<(Symbol, Expr)>,
    pub body: Do,
}

#[derive(Clone, Debug)]
pub struct Do {
    pub base: ExprBase,
    pub body: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct Function {
    pub base: ExprBase,
    pub name: String,
    pub arities: Vec<FunctionArity>,
}

#[derive(Clone, Debug)]
pub struct FunctionArity {
    pub params: Vec<Symbol>,
    pub body: Do,
    pub frame: FrameId,
    pub fn_ctx: FunctionContext,
}

#[derive(Clone, Debug)]
pub struct Recur {
    pub base: ExprBase,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct Call {
    pub base: ExprBase,
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct VectorExpr {
    pub base: ExprBase,
    pub elements: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct MapExpr {
    pub base: ExprBase,
    pub pairs: Vec<(Expr, Expr)>,
}

/// One segment of a `native/raw` block: verbatim host text or an
/// interpolated, analyzed expression.
#[derive(Clone, Debug)]
pub enum RawPart {
    Text(String),
    Expr(Expr),
}

#[derive(Clone, Debug)]
pub struct NativeRaw {
    pub base: ExprBase,
    pub chunks: Vec<RawPart>,
}

/// The analyzed expression tree. Value-typed; analyzers build nodes
/// bottom-up and nothing mutates a node after it is returned.
#[derive(Clone, Debug)]
pub enum Expr {
    PrimitiveLiteral(PrimitiveLiteral),
    LocalReference(LocalReference),
    VarDeref(VarDeref),
    VarRef(VarRef),
    Def(Def),
    If(If),
    Let(Let),
    Do(Do),
    Fn(Function),
    Recur(Recur),
    Call(Call),
    Vector(VectorExpr),
    Map(MapExpr),
    NativeRaw(NativeRaw),
}

impl Expr {
    pub fn base(&self) -> &ExprBase {
        match self {
            Expr::PrimitiveLiteral(e) => &e.base,
            Expr::LocalReference(e) => &e.base,
            Expr::VarDeref(e) => &e.base,
            Expr::VarRef(e) => &e.base,
            Expr::Def(e) => &e.base,
            Expr::If(e) => &e.base,
            Expr::Let(e) => &e.base,
            Expr::Do(e) => &e.base,
            Expr::Fn(e) => &e.base,
            Expr::Recur(e) => &e.base,
            Expr::Call(e) => &e.base,
            Expr::Vector(e) => &e.base,
            Expr::Map(e) => &e.base,
            Expr::NativeRaw(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ExprBase {
        match self {
            Expr::PrimitiveLiteral(e) => &mut e.base,
            Expr::LocalReference(e) => &mut e.base,
            Expr::VarDeref(e) => &mut e.base,
            Expr::VarRef(e) => &mut e.base,
            Expr::Def(e) => &mut e.base,
            Expr::If(e) => &mut e.base,
            Expr::Let(e) => &mut e.base,
            Expr::Do(e) => &mut e.base,
            Expr::Fn(e) => &mut e.base,
            Expr::Recur(e) => &mut e.base,
            Expr::Call(e) => &mut e.base,
            Expr::Vector(e) => &mut e.base,
            Expr::Map(e) => &mut e.base,
            Expr::NativeRaw(e) => &mut e.base,
        }
    }
}
