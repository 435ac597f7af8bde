mod common;

use anise_core::analyze::expr::{Expr, ExprPosition, RawPart};
use anise_core::ast::{Symbol, Value};
use common::{analyze, last_form, root_arity, root_body, root_fn};

#[test]
fn def_produces_a_qualified_var_with_lifted_parts() {
    let analysis = analyze("(def x 1)");

    let Expr::Def(def) = last_form(&analysis) else {
        panic!("expected def");
    };
    assert_eq!(def.name, Symbol::new("user", "x"));
    assert!(def.base.needs_box);

    let Some(value) = &def.value else {
        panic!("expected initializer");
    };
    let Expr::PrimitiveLiteral(literal) = value.as_ref() else {
        panic!("expected literal initializer");
    };
    assert_eq!(literal.value, Value::Int(1));
    assert!(literal.base.needs_box);

    let frame = root_arity(&analysis).frame;
    let frame = analysis.frames.get(frame);
    assert!(frame.lifted_vars().contains(&Symbol::new("user", "x")));
    assert!(frame.lifted_constants().contains(&Value::Int(1)));
    assert!(analysis.vars.contains_key(&Symbol::new("user", "x")));
}

#[test]
fn declaration_only_def_has_no_initializer() {
    let analysis = analyze("(def x)");
    let Expr::Def(def) = last_form(&analysis) else {
        panic!("expected def");
    };
    assert!(def.value.is_none());
    assert!(analysis.vars.is_empty());
}

#[test]
fn fn_registers_params_without_usage_flags() {
    let analysis = analyze("(fn* [a b] a)");

    let Expr::Fn(function) = last_form(&analysis) else {
        panic!("expected fn");
    };
    assert_eq!(function.arities.len(), 1);
    let arity = &function.arities[0];
    assert_eq!(arity.params, vec![Symbol::parse("a"), Symbol::parse("b")]);
    assert_eq!(arity.fn_ctx.param_count, 2);
    assert!(!arity.fn_ctx.is_variadic);
    assert!(!arity.fn_ctx.is_tail_recursive);

    assert_eq!(arity.body.body.len(), 1);
    let Expr::LocalReference(reference) = &arity.body.body[0] else {
        panic!("expected local reference body");
    };
    assert_eq!(reference.name, Symbol::parse("a"));
    assert_eq!(reference.base.position, ExprPosition::Tail);

    let b = analysis.frames.binding(arity.frame, "b").unwrap();
    assert!(!b.has_boxed_usage);
    assert!(!b.has_unboxed_usage);
}

#[test]
fn anonymous_and_named_fns_get_unique_munged_names() {
    let anonymous = analyze("(fn* [] 1)");
    let named = analyze("(fn* my-fn [] 1)");

    assert!(root_name(&anonymous).starts_with("fn_"));
    assert!(root_name(&named).starts_with("my_fn_"));

    fn root_name(analysis: &anise_core::Analysis) -> &str {
        let Expr::Fn(function) = last_form(analysis) else {
            panic!("expected fn");
        };
        &function.name
    }
}

#[test]
fn variadic_params_set_the_function_context() {
    let analysis = analyze("(fn* [a & rest] rest)");
    let Expr::Fn(function) = last_form(&analysis) else {
        panic!("expected fn");
    };
    let arity = &function.arities[0];
    assert!(arity.fn_ctx.is_variadic);
    assert_eq!(arity.fn_ctx.param_count, 2);
    assert_eq!(arity.params, vec![Symbol::parse("a"), Symbol::parse("rest")]);
}

#[test]
fn multi_arity_fns_analyze_each_arity() {
    let analysis = analyze("(fn* ([a] a) ([a b] b))");
    let Expr::Fn(function) = last_form(&analysis) else {
        panic!("expected fn");
    };
    assert_eq!(function.arities.len(), 2);
    assert_eq!(function.arities[0].fn_ctx.param_count, 1);
    assert_eq!(function.arities[1].fn_ctx.param_count, 2);
}

#[test]
fn shadowed_params_lose_their_name() {
    let analysis = analyze("(fn* [a a] a)");
    let Expr::Fn(function) = last_form(&analysis) else {
        panic!("expected fn");
    };
    let arity = &function.arities[0];
    assert_eq!(arity.params[0], Symbol::new("", ""));
    assert_eq!(arity.params[1], Symbol::parse("a"));
}

#[test]
fn do_marks_statement_and_tail_positions() {
    let analysis = analyze("(do 1 2 3)");
    let Expr::Do(body) = last_form(&analysis) else {
        panic!("expected do");
    };
    assert_eq!(body.body.len(), 3);
    assert_eq!(body.body[0].base().position, ExprPosition::Statement);
    assert!(!body.body[0].base().needs_box);
    assert_eq!(body.body[1].base().position, ExprPosition::Statement);
    assert_eq!(body.body[2].base().position, ExprPosition::Tail);
    assert!(body.body[2].base().needs_box);
    assert!(body.base.needs_box);
}

#[test]
fn let_installs_bindings_in_order() {
    let analysis = analyze("(let* [x 1 y x] y)");

    let Expr::Let(let_expr) = last_form(&analysis) else {
        panic!("expected let");
    };
    assert_eq!(let_expr.pairs.len(), 2);
    assert_eq!(let_expr.pairs[0].0, Symbol::parse("x"));
    assert_eq!(let_expr.pairs[1].0, Symbol::parse("y"));

    let Expr::LocalReference(y_init) = &let_expr.pairs[1].1 else {
        panic!("expected local reference initializer");
    };
    assert_eq!(y_init.name, Symbol::parse("x"));

    let Expr::LocalReference(body_ref) = let_expr.body.body.last().unwrap() else {
        panic!("expected local reference body");
    };
    assert_eq!(body_ref.name, Symbol::parse("y"));

    let x = analysis.frames.binding(let_expr.frame, "x").unwrap();
    assert!(x.has_unboxed_usage);
    assert!(!x.needs_box);
    let y = analysis.frames.binding(let_expr.frame, "y").unwrap();
    assert!(y.value_expr.is_some());
}

#[test]
fn if_forces_boxing_on_both_branches() {
    let analysis = analyze("(if (zero? 1) 2 3)");
    let Expr::If(if_expr) = last_form(&analysis) else {
        panic!("expected if");
    };
    assert!(if_expr.base.needs_box);
    assert!(!if_expr.condition.base().needs_box);
    assert!(if_expr.then.base().needs_box);
    assert!(if_expr.else_.as_ref().unwrap().base().needs_box);
}

#[test]
fn if_without_else_leaves_the_branch_absent() {
    let analysis = analyze("(if true 1)");
    let Expr::If(if_expr) = last_form(&analysis) else {
        panic!("expected if");
    };
    assert!(if_expr.else_.is_none());
}

#[test]
fn quote_lifts_the_unevaluated_form() {
    let analysis = analyze("(quote (a b))");
    let Expr::PrimitiveLiteral(literal) = last_form(&analysis) else {
        panic!("expected literal");
    };
    let quoted = Value::list(vec![Value::symbol("a"), Value::symbol("b")]);
    assert_eq!(literal.value, quoted);

    let frame = analysis.frames.get(root_arity(&analysis).frame);
    assert!(frame.lifted_constants().contains(&quoted));
}

#[test]
fn empty_list_is_a_literal_not_a_call() {
    let analysis = analyze("()");
    let Expr::PrimitiveLiteral(literal) = last_form(&analysis) else {
        panic!("expected literal");
    };
    assert_eq!(literal.value, Value::list(vec![]));
}

#[test]
fn var_special_reifies_the_var() {
    let analysis = analyze("(def x 1) (var x)");
    let Expr::VarRef(var_ref) = last_form(&analysis) else {
        panic!("expected var ref");
    };
    assert_eq!(var_ref.qualified_name, Symbol::new("user", "x"));
    assert_eq!(var_ref.var.ns, "user");
    assert!(var_ref.base.needs_box);
}

#[test]
fn symbols_resolve_to_var_derefs_and_lift() {
    let analysis = analyze("zero?");
    let Expr::VarDeref(deref) = last_form(&analysis) else {
        panic!("expected var deref");
    };
    assert_eq!(deref.qualified_name, Symbol::new("user", "zero?"));
    assert!(deref.base.needs_box);

    let frame = analysis.frames.get(root_arity(&analysis).frame);
    assert_eq!(frame.lifted_vars(), &[Symbol::new("user", "zero?")]);
}

#[test]
fn calls_analyze_callee_and_args() {
    let analysis = analyze("(+ 1 2)");
    let Expr::Call(call) = last_form(&analysis) else {
        panic!("expected call");
    };
    assert!(matches!(call.callee.as_ref(), Expr::VarDeref(_)));
    assert_eq!(call.args.len(), 2);
    assert!(call.base.needs_box);
    assert!(call.args.iter().all(|arg| arg.base().needs_box));
}

#[test]
fn calls_through_locals_use_the_binding() {
    let analysis = analyze("(fn* [f] (f 1))");
    let Expr::Fn(function) = last_form(&analysis) else {
        panic!("expected fn");
    };
    let Expr::Call(call) = &function.arities[0].body.body[0] else {
        panic!("expected call body");
    };
    assert!(matches!(call.callee.as_ref(), Expr::LocalReference(_)));
}

#[test]
fn all_literal_vectors_collapse_to_constants() {
    let analysis = analyze("[1 2 3]");
    let Expr::PrimitiveLiteral(literal) = last_form(&analysis) else {
        panic!("expected lifted vector literal");
    };
    let whole = Value::vector(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(literal.value, whole);

    let frame = analysis.frames.get(root_arity(&analysis).frame);
    assert!(frame.lifted_constants().contains(&whole));
    assert!(frame.lifted_constants().contains(&Value::Int(1)));
}

#[test]
fn vectors_with_computed_elements_stay_vectors() {
    let analysis = analyze("[(+ 1 2) 3]");
    let Expr::Vector(vector) = last_form(&analysis) else {
        panic!("expected vector node");
    };
    assert_eq!(vector.elements.len(), 2);
    assert!(matches!(vector.elements[0], Expr::Call(_)));
    assert!(vector.base.needs_box);
}

#[test]
fn maps_analyze_pairs_in_source_order() {
    let analysis = analyze("{:a 1 :b (+ 1 2)}");
    let Expr::Map(map) = last_form(&analysis) else {
        panic!("expected map node");
    };
    assert_eq!(map.pairs.len(), 2);
    let Expr::PrimitiveLiteral(first_key) = &map.pairs[0].0 else {
        panic!("expected literal key");
    };
    assert_eq!(first_key.value, Value::keyword("a"));
    assert!(matches!(map.pairs[1].1, Expr::Call(_)));
}

#[test]
fn sets_fall_through_to_literals() {
    let analysis = analyze("#{1 2}");
    let Expr::PrimitiveLiteral(literal) = last_form(&analysis) else {
        panic!("expected literal");
    };
    assert!(matches!(literal.value, Value::Set(_)));
}

#[test]
fn native_raw_interleaves_text_and_analyzed_exprs() {
    let analysis = analyze("(native/raw \"int v = #{(+ 1 2)}#;\")");
    let Expr::NativeRaw(raw) = last_form(&analysis) else {
        panic!("expected native/raw");
    };
    assert_eq!(raw.chunks.len(), 3);

    let RawPart::Text(before) = &raw.chunks[0] else {
        panic!("expected leading text");
    };
    assert_eq!(before, "int v = ");

    let RawPart::Expr(Expr::Call(call)) = &raw.chunks[1] else {
        panic!("expected interpolated call");
    };
    assert_eq!(call.args.len(), 2);
    assert!(call.base.needs_box);

    let RawPart::Text(after) = &raw.chunks[2] else {
        panic!("expected trailing text");
    };
    assert_eq!(after, ";");
}

#[test]
fn empty_native_raw_has_no_chunks() {
    let analysis = analyze("(native/raw \"\")");
    let Expr::NativeRaw(raw) = last_form(&analysis) else {
        panic!("expected native/raw");
    };
    assert!(raw.chunks.is_empty());
}

#[test]
fn analysis_is_deterministic() {
    let src = "(def x 1) [1 2 x]";
    let first = analyze(src);
    let second = analyze(src);

    let first_frame = first.frames.get(root_arity(&first).frame);
    let second_frame = second.frames.get(root_arity(&second).frame);
    assert_eq!(
        first_frame.lifted_constants(),
        second_frame.lifted_constants()
    );
    assert_eq!(first_frame.lifted_vars(), second_frame.lifted_vars());
    assert_eq!(root_body(&first).len(), root_body(&second).len());
    assert_eq!(root_fn(&first).arities.len(), 1);
}
