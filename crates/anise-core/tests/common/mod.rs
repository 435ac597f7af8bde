#![allow(dead_code)]

use anise_core::analyze::expr::{Expr, Function, FunctionArity};
use anise_core::ast::Symbol;
use anise_core::{analyze_source, Analysis, AniseError, RuntimeCtx};

/// Fresh context with a handful of core vars interned in `user`, enough
/// for call-shaped sources to resolve.
pub fn bootstrap_ctx() -> RuntimeCtx {
    let ctx = RuntimeCtx::new();
    for name in ["+", "-", "*", "zero?", "dec", "inc", "count", "str"] {
        let qualified = ctx.qualify_symbol(&Symbol::parse(name));
        ctx.intern_var(&qualified).unwrap();
    }
    ctx
}

pub fn analyze(src: &str) -> Analysis {
    analyze_with(src, &bootstrap_ctx())
}

pub fn analyze_with(src: &str, ctx: &RuntimeCtx) -> Analysis {
    analyze_source(src, ctx).unwrap_or_else(|err| panic!("analysis failed for {}: {}", src, err))
}

pub fn analyze_err(src: &str) -> AniseError {
    match analyze_source(src, &bootstrap_ctx()) {
        Ok(_) => panic!("expected analysis error for {}", src),
        Err(err) => err,
    }
}

/// The driver wraps every unit in a synthetic nullary fn; these unwrap
/// back to the forms under test.
pub fn root_fn(analysis: &Analysis) -> &Function {
    let Expr::Fn(function) = &analysis.expr else {
        panic!("expected top-level fn wrapper");
    };
    function
}

pub fn root_arity(analysis: &Analysis) -> &FunctionArity {
    &root_fn(analysis).arities[0]
}

pub fn root_body(analysis: &Analysis) -> &[Expr] {
    &root_arity(analysis).body.body
}

pub fn last_form(analysis: &Analysis) -> &Expr {
    root_body(analysis).last().expect("empty analyzed body")
}
