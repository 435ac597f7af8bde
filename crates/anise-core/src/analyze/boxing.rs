use super::expr::{Do, Expr};

/// Forces the tail of a tail-recursive arity body to be boxed. Unboxed
/// values may be initialized through an immediately-invoked expression,
/// which cannot live inside the loop/continue that tail recursion
/// compiles into. Pure structural rewrite; non-tail subexpressions are
/// untouched.
pub fn force_boxed(mut body: Do) -> Do {
    body.base.needs_box = true;
    if let Some(last) = body.body.pop() {
        body.body.push(box_tail(last));
    }
    body
}

/// Branching constructs have one tail per branch; every one is visited.
fn box_tail(expr: Expr) -> Expr {
    match expr {
        Expr::If(mut e) => {
            e.base.needs_box = true;
            e.then = Box::new(box_tail(*e.then));
            e.else_ = e.else_.map(|branch| Box::new(box_tail(*branch)));
            Expr::If(e)
        }
        Expr::Let(mut e) => {
            e.base.needs_box = true;
            e.body = force_boxed(e.body);
            Expr::Let(e)
        }
        Expr::Do(e) => Expr::Do(force_boxed(e)),
        mut other => {
            other.base_mut().needs_box = true;
            other
        }
    }
}
