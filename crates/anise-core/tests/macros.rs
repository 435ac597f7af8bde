mod common;

use anise_core::analyze::expr::{Expr, ExprPosition, Function};
use anise_core::ast::{Symbol, Value};
use anise_core::module::ModuleWriter;
use anise_core::reader::Reader;
use anise_core::{AniseError, Processor};
use common::{analyze_with, bootstrap_ctx, last_form, root_arity, root_body};

fn register_when(ctx: &anise_core::RuntimeCtx) {
    ctx.register_macro("when*", |_, form| {
        let Value::List(items) = form else {
            return Ok(form.clone());
        };
        Ok(Value::list(vec![
            Value::symbol("if"),
            items[1].clone(),
            items[2].clone(),
            Value::Nil,
        ]))
    })
    .unwrap();
}

#[test]
fn macro_calls_restart_analysis_on_the_expansion() {
    let ctx = bootstrap_ctx();
    register_when(&ctx);

    let expanded = analyze_with("(when* (zero? 0) 1)", &ctx);
    let direct = analyze_with("(if (zero? 0) 1 nil)", &ctx);

    let Expr::If(expanded_if) = last_form(&expanded) else {
        panic!("expected macro call to analyze as if");
    };
    let Expr::If(direct_if) = last_form(&direct) else {
        panic!("expected if");
    };

    // Restart keeps the original position and yields the same tree as
    // analyzing the expansion directly.
    assert_eq!(expanded_if.base.position, ExprPosition::Tail);
    assert!(matches!(expanded_if.condition.as_ref(), Expr::Call(_)));
    assert!(matches!(direct_if.condition.as_ref(), Expr::Call(_)));

    let Expr::PrimitiveLiteral(else_branch) = expanded_if.else_.as_ref().unwrap().as_ref() else {
        panic!("expected literal else branch");
    };
    assert_eq!(else_branch.value, Value::Nil);
}

#[test]
fn macro_vars_are_not_lifted() {
    let ctx = bootstrap_ctx();
    register_when(&ctx);

    let analysis = analyze_with("(when* true 1)", &ctx);
    let frame = analysis.frames.get(root_arity(&analysis).frame);
    assert!(!frame
        .lifted_vars()
        .contains(&Symbol::new("user", "when*")));
}

fn set_unboxed_arity_meta(ctx: &anise_core::RuntimeCtx, name: &str, arg_count: i64) {
    let var = ctx.intern_var(&Symbol::new("user", name)).unwrap();
    var.set_meta(Value::map(vec![(
        Value::keyword("arities"),
        Value::map(vec![(
            Value::Int(arg_count),
            Value::map(vec![
                (Value::keyword("supports-unboxed-input?"), Value::Bool(true)),
                (Value::keyword("unboxed-output?"), Value::Bool(true)),
            ]),
        )]),
    )]));
}

#[test]
fn unboxed_arity_meta_relaxes_call_boxing() {
    let ctx = bootstrap_ctx();
    set_unboxed_arity_meta(&ctx, "fast-inc", 1);

    let analysis = analyze_with("(def fast-inc (fn* [n] n)) (fast-inc 5) nil", &ctx);
    let Expr::Call(call) = &root_body(&analysis)[1] else {
        panic!("expected call");
    };
    assert!(!call.base.needs_box);
    assert!(!call.args[0].base().needs_box);
}

#[test]
fn boxed_positions_keep_the_return_boxed() {
    let ctx = bootstrap_ctx();
    set_unboxed_arity_meta(&ctx, "fast-inc", 1);

    // In tail position the call result must stay boxed even though the
    // callee supports unboxed output; the arguments may still relax.
    let analysis = analyze_with("(def fast-inc (fn* [n] n)) (fast-inc 5)", &ctx);
    let Expr::Call(call) = last_form(&analysis) else {
        panic!("expected call");
    };
    assert!(call.base.needs_box);
    assert!(!call.args[0].base().needs_box);
}

#[test]
fn variadic_arities_never_relax_boxing() {
    let ctx = bootstrap_ctx();
    set_unboxed_arity_meta(&ctx, "spread", 1);

    let analysis = analyze_with("(def spread (fn* [& xs] xs)) (spread 5) nil", &ctx);
    let Expr::Call(call) = &root_body(&analysis)[1] else {
        panic!("expected call");
    };
    assert!(call.base.needs_box);
    assert!(call.args[0].base().needs_box);
}

#[test]
fn arity_meta_without_a_known_var_is_an_internal_error() {
    let ctx = bootstrap_ctx();
    set_unboxed_arity_meta(&ctx, "ghost", 1);

    let err = anise_core::analyze_source("(ghost 5)", &ctx).unwrap_err();
    assert!(matches!(err, AniseError::Internal(_)));
    assert!(err.to_string().contains("undefined var"));
}

#[test]
fn arity_meta_on_a_non_function_is_an_internal_error() {
    let ctx = bootstrap_ctx();
    set_unboxed_arity_meta(&ctx, "ghost", 1);

    let err = anise_core::analyze_source("(def ghost 1) (ghost 5)", &ctx).unwrap_err();
    assert!(matches!(err, AniseError::Internal(_)));
    assert!(err.to_string().contains("non-function var"));
}

struct RecordingWriter;

impl ModuleWriter for RecordingWriter {
    fn declaration(&self, module: &str, f: &Function) -> String {
        format!("// {} => {} ({} arities)", module, f.name, f.arities.len())
    }
}

#[test]
fn compiling_mode_records_dependencies_and_writes_modules() {
    let ctx = bootstrap_ctx();
    ctx.set_compiling(true);
    ctx.set_current_module("repl");

    let mut processor = Processor::new(&ctx).with_module_writer(Box::new(RecordingWriter));
    processor
        .analyze_program(Reader::new("(def f (fn* [a] a))"))
        .unwrap();

    // Both the inner fn and the synthetic wrapper become nested modules,
    // innermost first.
    let deps = ctx.module_dependencies("repl");
    assert_eq!(deps.len(), 2);
    for dep in &deps {
        assert!(dep.starts_with("user$fn_"), "unexpected module {}", dep);
        let source = ctx.module_source(dep).unwrap();
        assert!(source.contains("(1 arities)"));
        assert!(source.starts_with(&format!("// {}", dep)));
    }
}

#[test]
fn without_compiling_no_modules_are_touched() {
    let ctx = bootstrap_ctx();
    let mut processor = Processor::new(&ctx).with_module_writer(Box::new(RecordingWriter));
    processor
        .analyze_program(Reader::new("(fn* [a] a)"))
        .unwrap();
    assert!(ctx.module_dependencies("").is_empty());
}
