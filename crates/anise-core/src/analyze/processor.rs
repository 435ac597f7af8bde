use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use im::Vector;

use crate::ast::{map_get, truthy, Symbol, Value};
use crate::error::AniseError;
use crate::module::{nest_module, ModuleWriter};
use crate::reader::Reader;
use crate::runtime::RuntimeCtx;

use super::boxing::force_boxed;
use super::expr::{
    Call, Def, Do, Expr, ExprBase, ExprPosition, FnCtxRef, Function, FunctionArity,
    FunctionContext, If, Let, LocalReference, MapExpr, NativeRaw, PrimitiveLiteral, RawPart, Recur,
    VarDeref, VarRef, VectorExpr,
};
use super::frame::{FrameArena, FrameId, FrameKind, LocalBinding};

/// Upper bound on fixed parameters, dictated by the generated calling
/// convention. Overflow goes through `& args`.
pub const MAX_PARAMS: usize = 10;

const INTERP_START: &str = "#{";
const INTERP_END: &str = "}#";

type SpecialFn<'rt> = fn(
    &mut Processor<'rt>,
    &Vector<Value>,
    FrameId,
    ExprPosition,
    Option<&FnCtxRef>,
    bool,
) -> Result<Expr, AniseError>;

/// Everything an analysis run produced: the wrapped top-level function
/// expression, the frame tree with its lifted constants and vars, and
/// the var-to-initializer map consumed by call-site metadata checks.
#[derive(Debug)]
pub struct Analysis {
    pub expr: Expr,
    pub frames: FrameArena,
    pub root_frame: FrameId,
    pub vars: HashMap<Symbol, Expr>,
}

/// The semantic analyzer. Holds the special-form dispatch table and all
/// state mutated during one analysis: the frame arena and the global
/// var map. One processor per compilation unit.
pub struct Processor<'rt> {
    ctx: &'rt RuntimeCtx,
    specials: HashMap<Symbol, SpecialFn<'rt>>,
    frames: FrameArena,
    root_frame: FrameId,
    vars: HashMap<Symbol, Expr>,
    module_writer: Option<Box<dyn ModuleWriter>>,
}

impl<'rt> Processor<'rt> {
    pub fn new(ctx: &'rt RuntimeCtx) -> Self {
        let mut frames = FrameArena::new();
        let root_frame = frames.alloc(FrameKind::Root, None);

        let mut specials: HashMap<Symbol, SpecialFn<'rt>> = HashMap::new();
        specials.insert(Symbol::parse("def"), Processor::analyze_def);
        specials.insert(Symbol::parse("fn*"), Processor::analyze_fn);
        specials.insert(Symbol::parse("recur"), Processor::analyze_recur);
        specials.insert(Symbol::parse("do"), Processor::analyze_do);
        specials.insert(Symbol::parse("let*"), Processor::analyze_let);
        specials.insert(Symbol::parse("if"), Processor::analyze_if);
        specials.insert(Symbol::parse("quote"), Processor::analyze_quote);
        specials.insert(Symbol::parse("var"), Processor::analyze_var);
        specials.insert(Symbol::parse("native/raw"), Processor::analyze_native_raw);

        Self {
            ctx,
            specials,
            frames,
            root_frame,
            vars: HashMap::new(),
            module_writer: None,
        }
    }

    pub fn with_module_writer(mut self, writer: Box<dyn ModuleWriter>) -> Self {
        self.module_writer = Some(writer);
        self
    }

    pub fn frames(&self) -> &FrameArena {
        &self.frames
    }

    pub fn root_frame(&self) -> FrameId {
        self.root_frame
    }

    pub fn vars(&self) -> &HashMap<Symbol, Expr> {
        &self.vars
    }

    pub fn into_analysis(self, expr: Expr) -> Analysis {
        Analysis {
            expr,
            frames: self.frames,
            root_frame: self.root_frame,
            vars: self.vars,
        }
    }

    /// Root driver. Wraps the stream of forms into an anonymous nullary
    /// function so that downstream code generation only ever deals with
    /// a single function, whether the input is a namespace, a REPL
    /// expression, or a source function. The first parse error wins.
    pub fn analyze_program<I>(&mut self, forms: I) -> Result<Expr, AniseError>
    where
        I: IntoIterator<Item = Result<Value, AniseError>>,
    {
        let mut iter = forms.into_iter();
        let Some(first) = iter.next() else {
            return Err(AniseError::internal("already retrieved result"));
        };

        let mut wrapped = Vector::new();
        wrapped.push_back(Value::symbol("fn*"));
        wrapped.push_back(Value::Vector(Vector::new()));
        wrapped.push_back(first?);
        for form in iter {
            wrapped.push_back(form?);
        }

        let root = self.root_frame;
        self.analyze(&Value::List(wrapped), root, ExprPosition::Value, None, true)
    }

    pub fn analyze(
        &mut self,
        value: &Value,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        match value {
            Value::List(items) => self.analyze_call(items, frame, position, fn_ctx, needs_box),
            Value::Vector(items) => self.analyze_vector(items, frame, position, fn_ctx, needs_box),
            Value::Map(pairs) => self.analyze_map(pairs, frame, position, fn_ctx, needs_box),
            Value::Symbol(sym) => self.analyze_symbol(sym, frame, position, fn_ctx, needs_box),
            Value::Nil
            | Value::Bool(_)
            | Value::Int(_)
            | Value::Float(_)
            | Value::Str(_)
            | Value::Keyword(_)
            | Value::Set(_) => {
                self.analyze_primitive_literal(value, frame, position, fn_ctx, needs_box)
            }
            Value::Var(_) => Err(AniseError::internal(format!(
                "unsupported analysis of {}",
                value.type_name()
            ))),
        }
    }

    fn analyze_call(
        &mut self,
        items: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        // An empty list evaluates to a list, not a call.
        if items.is_empty() {
            let literal = Value::List(items.clone());
            return self.analyze_primitive_literal(&literal, frame, position, fn_ctx, needs_box);
        }

        let arg_count = items.len() - 1;
        let head = &items[0];

        let mut needs_ret_box = true;
        let mut needs_arg_box = true;
        let callee = if let Value::Symbol(sym) = head {
            if let Some(&special) = self.specials.get(sym) {
                return special(self, items, frame, position, fn_ctx, needs_box);
            }

            let callee = self.analyze_symbol(sym, frame, ExprPosition::Value, fn_ctx, true)?;

            // If this is a macro call, expand and start over on the result.
            let form = Value::List(items.clone());
            let expanded = self.ctx.macroexpand(&form)?;
            if expanded != form {
                return self.analyze(&expanded, frame, position, fn_ctx, needs_box);
            }

            // When the callee var's meta declares unboxed support for this
            // exact arg count, the call can relax argument and return boxing.
            if let Expr::VarDeref(var_deref) = &callee {
                if let Some(meta) = var_deref.var.meta() {
                    let arities_key = Value::Keyword(self.ctx.intern_keyword("", "arities"));
                    let arity_meta = map_get(&meta, &arities_key)
                        .and_then(|per_count| map_get(per_count, &Value::Int(arg_count as i64)))
                        .cloned();
                    if let Some(arity_meta) = arity_meta {
                        let input_key =
                            Value::Keyword(self.ctx.intern_keyword("", "supports-unboxed-input?"));
                        let output_key =
                            Value::Keyword(self.ctx.intern_keyword("", "unboxed-output?"));
                        let supports_unboxed_input =
                            map_get(&arity_meta, &input_key).is_some_and(truthy);
                        let supports_unboxed_output =
                            map_get(&arity_meta, &output_key).is_some_and(truthy);

                        if supports_unboxed_input || supports_unboxed_output {
                            let Some(init) = self.vars.get(&var_deref.qualified_name) else {
                                return Err(AniseError::internal(format!(
                                    "undefined var: {}",
                                    var_deref.qualified_name
                                )));
                            };
                            let Expr::Fn(function) = init else {
                                return Err(AniseError::internal(
                                    "unsupported arity meta on non-function var",
                                ));
                            };
                            // Unboxed calls must hit an exact fixed arity;
                            // variadic calls stay boxed.
                            for arity in &function.arities {
                                if arity.fn_ctx.param_count == arg_count
                                    && !arity.fn_ctx.is_variadic
                                {
                                    needs_arg_box = !supports_unboxed_input;
                                    needs_ret_box = needs_box || !supports_unboxed_output;
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            callee
        } else {
            self.analyze(head, frame, ExprPosition::Value, fn_ctx, needs_box)?
        };

        let mut args = Vec::with_capacity(arg_count);
        for form in items.iter().skip(1) {
            args.push(self.analyze(form, frame, ExprPosition::Value, fn_ctx, needs_arg_box)?);
        }

        Ok(Expr::Call(Call {
            base: ExprBase::new(position, frame, needs_ret_box),
            callee: Box::new(callee),
            args,
        }))
    }

    fn analyze_symbol(
        &mut self,
        sym: &Symbol,
        frame: FrameId,
        position: ExprPosition,
        _fn_ctx: Option<&FnCtxRef>,
        mut needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if let Some(found) = self.frames.find_local_or_capture(frame, sym) {
            self.frames.register_captures(sym, &found);

            // Referring to a boxed local makes the reference boxed.
            let origin_needs_box = self
                .frames
                .binding(found.frame, &sym.name)
                .map(|binding| binding.needs_box)
                .unwrap_or(false);
            needs_box |= origin_needs_box;

            let mut resolved = found;
            if !resolved.crossed_fns.is_empty() {
                // Captured locals are always boxed, even when the
                // originating local is not.
                needs_box = true;
                // The walk above resolved the originating binding. The
                // capture is registered now, so a second walk resolves the
                // binding installed in the current function; later lookups
                // of this local never cross again.
                resolved = self.frames.find_local_or_capture(frame, sym).ok_or_else(|| {
                    AniseError::internal(format!("missing capture binding for {}", sym))
                })?;
            }

            let Some(binding) = self.frames.binding_mut(resolved.frame, &sym.name) else {
                return Err(AniseError::internal(format!(
                    "missing local binding for {}",
                    sym
                )));
            };
            if needs_box {
                binding.has_boxed_usage = true;
            } else {
                binding.has_unboxed_usage = true;
            }

            return Ok(Expr::LocalReference(LocalReference {
                base: ExprBase::new(position, frame, needs_box),
                name: sym.clone(),
                binding_frame: resolved.frame,
            }));
        }

        let qualified = self.ctx.qualify_symbol(sym);
        let Some(var) = self.ctx.find_var(&qualified) else {
            return Err(AniseError::name(format!("unbound symbol: {}", sym)));
        };

        // Macros are not lifted; they have no runtime presence.
        if !var.is_macro() {
            self.frames.lift_var(frame, qualified.clone());
        }

        Ok(Expr::VarDeref(VarDeref {
            base: ExprBase::new(position, frame, true),
            qualified_name: qualified,
            var,
        }))
    }

    fn analyze_def(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if !(2..=3).contains(&list.len()) {
            return Err(AniseError::shape(
                "invalid def: expects a name and optional value",
            ));
        }

        let name_form = &list[1];
        let Value::Symbol(sym) = name_form else {
            return Err(AniseError::type_mismatch("symbol", name_form.type_name()));
        };
        if sym.is_qualified() {
            return Err(AniseError::name("invalid def: name must not be qualified"));
        }

        let qualified_sym = self.ctx.qualify_symbol(sym);
        self.frames.lift_var(frame, qualified_sym.clone());
        self.ctx.intern_var(&qualified_sym)?;

        let value = match list.get(2) {
            Some(value_form) => {
                let expr = self.analyze(value_form, frame, ExprPosition::Value, fn_ctx, true)?;
                self.vars.insert(qualified_sym.clone(), expr.clone());
                Some(Box::new(expr))
            }
            None => None,
        };

        Ok(Expr::Def(Def {
            base: ExprBase::new(position, frame, true),
            name: qualified_sym,
            value,
        }))
    }

    fn analyze_fn(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        _fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() < 2 {
            return Err(AniseError::shape("invalid fn: missing forms"));
        }

        let mut start = 1;
        let name = if let Value::Symbol(sym) = &list[1] {
            start = 2;
            if list.len() < 3 {
                return Err(AniseError::shape("invalid fn: missing forms"));
            }
            self.ctx.unique_string(&sym.name)
        } else {
            self.ctx.unique_string("fn")
        };
        let name = self.ctx.munge(&name);

        let mut arities = Vec::new();
        match &list[start] {
            Value::Vector(_) => {
                arities.push(self.analyze_fn_arity(list, start, frame)?);
            }
            Value::List(_) => {
                for arity_form in list.iter().skip(start) {
                    let Value::List(arity_list) = arity_form else {
                        return Err(AniseError::shape("invalid fn: expected arity list"));
                    };
                    arities.push(self.analyze_fn_arity(arity_list, 0, frame)?);
                }
            }
            _ => return Err(AniseError::shape("invalid fn syntax")),
        }

        // At most one variadic arity, and it must cover more fixed
        // params than any non-variadic arity.
        let mut variadic_count = 0usize;
        let mut variadic_params = 0usize;
        for arity in &arities {
            if arity.fn_ctx.is_variadic {
                variadic_count += 1;
                variadic_params = arity.fn_ctx.param_count;
            }
        }
        if variadic_count > 1 {
            return Err(AniseError::name(
                "invalid fn: has more than one variadic arity",
            ));
        }
        if variadic_count > 0 {
            for arity in &arities {
                if !arity.fn_ctx.is_variadic && arity.fn_ctx.param_count >= variadic_params {
                    return Err(AniseError::name(
                        "invalid fn: fixed arity has >= params than variadic arity",
                    ));
                }
            }
        }
        for (i, arity) in arities.iter().enumerate() {
            for other in arities.iter().skip(i + 1) {
                if arity.fn_ctx.param_count == other.fn_ctx.param_count
                    && arity.fn_ctx.is_variadic == other.fn_ctx.is_variadic
                {
                    return Err(AniseError::name("invalid fn: duplicate arity definition"));
                }
            }
        }

        let function = Function {
            base: ExprBase::new(position, frame, true),
            name,
            arities,
        };

        if self.ctx.compiling() {
            // Register the generated module as a dependency of the current
            // module so code to load it can be emitted.
            let module = nest_module(&self.ctx.current_ns(), &function.name);
            self.ctx
                .add_module_dependency(&self.ctx.current_module(), &module);
            if let Some(writer) = &self.module_writer {
                let source = writer.declaration(&module, &function);
                self.ctx.write_module(&module, &source);
            }
        }

        Ok(Expr::Fn(function))
    }

    fn analyze_fn_arity(
        &mut self,
        list: &Vector<Value>,
        start: usize,
        current_frame: FrameId,
    ) -> Result<FunctionArity, AniseError> {
        let Some(Value::Vector(params)) = list.get(start) else {
            return Err(AniseError::shape("invalid fn parameter vector"));
        };

        let frame = self.frames.alloc(FrameKind::Fn, Some(current_frame));
        let mut param_symbols: Vec<Symbol> = Vec::with_capacity(params.len());
        let mut is_variadic = false;
        for (i, param) in params.iter().enumerate() {
            let Value::Symbol(sym) = param else {
                return Err(AniseError::shape("invalid parameter; must be a symbol"));
            };
            if sym.is_qualified() {
                return Err(AniseError::name("invalid parameter; must be unqualified"));
            }
            if sym.name == "&" {
                if is_variadic {
                    return Err(AniseError::name(
                        "invalid function; parameters contain multiple &",
                    ));
                } else if i + 1 == params.len() {
                    return Err(AniseError::name("invalid function; missing symbol after &"));
                } else if i + 2 != params.len() {
                    return Err(AniseError::name("invalid function; param after rest args"));
                }
                is_variadic = true;
                continue;
            }

            if self.frames.binding(frame, &sym.name).is_some() {
                // TODO: Warn on shadowed parameters.
                // The host rejects duplicate parameter names but accepts
                // unnamed ones, so the shadowed occurrence loses its name
                // and becomes unreferenceable.
                for earlier in param_symbols.iter_mut() {
                    if earlier.name == sym.name {
                        *earlier = Symbol::new("", "");
                        break;
                    }
                }
            }
            self.frames
                .insert_local(frame, LocalBinding::new(sym.clone(), None, frame, false));
            param_symbols.push(sym.clone());
        }

        // Counted after the loop; `&` is not itself a parameter.
        if param_symbols.len() > MAX_PARAMS {
            return Err(AniseError::shape(format!(
                "invalid parameter count; must be <= {}; use & args to capture the rest",
                MAX_PARAMS
            )));
        }

        let fn_ctx: FnCtxRef = Rc::new(RefCell::new(FunctionContext {
            param_count: param_symbols.len(),
            is_variadic,
            is_tail_recursive: false,
        }));

        let mut body = Do {
            base: ExprBase::new(ExprPosition::Tail, frame, true),
            body: Vec::new(),
        };
        let form_count = list.len() - start - 1;
        for (i, form) in list.iter().skip(start + 1).enumerate() {
            let last = i + 1 == form_count;
            let form_position = if last {
                ExprPosition::Tail
            } else {
                ExprPosition::Statement
            };
            let expr = self.analyze(form, frame, form_position, Some(&fn_ctx), last)?;
            body.body.push(expr);
        }

        let fn_ctx = fn_ctx.borrow().clone();
        // Recursion compiles into a loop, which cannot initialize unboxed
        // values through an immediately-invoked expression; box the tail.
        let body = if fn_ctx.is_tail_recursive {
            force_boxed(body)
        } else {
            body
        };

        Ok(FunctionArity {
            params: param_symbols,
            body,
            frame,
            fn_ctx,
        })
    }

    fn analyze_recur(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        let Some(fn_ctx) = fn_ctx else {
            return Err(AniseError::position(
                "unable to use recur outside of a function or loop",
            ));
        };
        if position != ExprPosition::Tail {
            return Err(AniseError::position("recur used outside of tail position"));
        }

        let arg_count = list.len() - 1;
        let expected = fn_ctx.borrow().param_count;
        if expected != arg_count {
            return Err(AniseError::shape(format!(
                "invalid number of args passed to recur; expected {}, found {}",
                expected, arg_count
            )));
        }

        let mut args = Vec::with_capacity(arg_count);
        for form in list.iter().skip(1) {
            args.push(self.analyze(form, frame, ExprPosition::Value, Some(fn_ctx), true)?);
        }

        fn_ctx.borrow_mut().is_tail_recursive = true;

        Ok(Expr::Recur(Recur {
            base: ExprBase::new(position, frame, true),
            args,
        }))
    }

    fn analyze_do(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        let mut body = Vec::new();
        let mut do_needs_box = true;
        let form_count = list.len() - 1;
        for (i, item) in list.iter().skip(1).enumerate() {
            let last = i + 1 == form_count;
            let form_position = if last { position } else { ExprPosition::Statement };
            let form_needs_box = if form_position == ExprPosition::Statement {
                false
            } else {
                needs_box
            };
            let expr = self.analyze(item, frame, form_position, fn_ctx, form_needs_box)?;
            if last {
                do_needs_box = expr.base().needs_box;
            }
            body.push(expr);
        }

        Ok(Expr::Do(Do {
            base: ExprBase::new(position, frame, do_needs_box),
            body,
        }))
    }

    fn analyze_let(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() < 2 {
            return Err(AniseError::shape("invalid let: expects a binding vector"));
        }
        let Value::Vector(bindings) = &list[1] else {
            return Err(AniseError::shape("invalid let* bindings: must be a vector"));
        };
        if bindings.len() % 2 == 1 {
            return Err(AniseError::shape(
                "invalid let* bindings: must be an even number",
            ));
        }

        let let_frame = self.frames.alloc(FrameKind::Let, Some(frame));
        let mut pairs = Vec::with_capacity(bindings.len() / 2);
        let mut i = 0;
        while i < bindings.len() {
            let name_form = &bindings[i];
            let value_form = &bindings[i + 1];
            let Value::Symbol(sym) = name_form else {
                return Err(AniseError::shape(
                    "invalid let* binding: left hand must be an unqualified symbol",
                ));
            };
            if sym.is_qualified() {
                return Err(AniseError::name(
                    "invalid let* binding: left hand must be an unqualified symbol",
                ));
            }

            // Earlier bindings are visible to later initializers, so the
            // binding is installed before the next pair is analyzed.
            let init = self.analyze(value_form, let_frame, ExprPosition::Value, fn_ctx, false)?;
            let binding = LocalBinding::new(
                sym.clone(),
                Some(Box::new(init.clone())),
                let_frame,
                init.base().needs_box,
            );
            self.frames.insert_local(let_frame, binding);
            pairs.push((sym.clone(), init));
            i += 2;
        }

        let mut let_needs_box = needs_box;
        let mut body = Vec::new();
        let form_count = list.len() - 2;
        for (i, item) in list.iter().skip(2).enumerate() {
            let last = i + 1 == form_count;
            let form_position = if last { position } else { ExprPosition::Statement };
            let expr = self.analyze(item, let_frame, form_position, fn_ctx, needs_box)?;
            // Whether the let is boxed is ultimately up to its last form.
            if last {
                let_needs_box = expr.base().needs_box;
            }
            body.push(expr);
        }

        let body = Do {
            base: ExprBase::new(position, let_frame, let_needs_box),
            body,
        };
        Ok(Expr::Let(Let {
            base: ExprBase::new(position, let_frame, let_needs_box),
            frame: let_frame,
            pairs,
            body,
        }))
    }

    fn analyze_if(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() < 3 {
            return Err(AniseError::shape("invalid if: expects at least two forms"));
        }
        if list.len() > 4 {
            return Err(AniseError::shape("invalid if: expects at most three forms"));
        }

        // The branches are not guaranteed to share an unboxed
        // representation, so the whole if stays boxed.
        let needs_box = true;

        let condition = self.analyze(&list[1], frame, ExprPosition::Value, fn_ctx, false)?;
        let then = self.analyze(&list[2], frame, position, fn_ctx, needs_box)?;
        let else_ = match list.get(3) {
            Some(form) => Some(Box::new(self.analyze(form, frame, position, fn_ctx, needs_box)?)),
            None => None,
        };

        Ok(Expr::If(If {
            base: ExprBase::new(position, frame, needs_box),
            condition: Box::new(condition),
            then: Box::new(then),
            else_,
        }))
    }

    fn analyze_quote(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() != 2 {
            return Err(AniseError::shape("invalid quote: expects one argument"));
        }
        self.analyze_primitive_literal(&list[1], frame, position, fn_ctx, needs_box)
    }

    fn analyze_var(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        _fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() != 2 {
            return Err(AniseError::shape(
                "invalid var reference: expects one argument",
            ));
        }
        let arg = &list[1];
        let Value::Symbol(sym) = arg else {
            return Err(AniseError::type_mismatch("symbol", arg.type_name()));
        };

        let qualified = self.ctx.qualify_symbol(sym);
        let Some(var) = self.ctx.find_var(&qualified) else {
            return Err(AniseError::name("invalid var reference: var not found"));
        };

        Ok(Expr::VarRef(VarRef {
            base: ExprBase::new(position, frame, true),
            qualified_name: qualified,
            var,
        }))
    }

    /// `native/raw` bodies are split into chunks of verbatim host code
    /// and interpolated forms, the latter re-lexed and analyzed.
    fn analyze_native_raw(
        &mut self,
        list: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        if list.len() != 2 {
            return Err(AniseError::shape("invalid native/raw: expects one argument"));
        }
        let code_form = &list[1];
        let Value::Str(code) = code_form else {
            return Err(AniseError::type_mismatch("string", code_form.type_name()));
        };

        let base = ExprBase::new(position, frame, true);
        if code.is_empty() {
            return Ok(Expr::NativeRaw(NativeRaw {
                base,
                chunks: Vec::new(),
            }));
        }

        // TODO: Use } alone as the end delimiter once values carry token
        // spans that can resolve nesting.
        let mut chunks = Vec::new();
        let mut cursor = 0usize;
        while cursor < code.len() {
            let Some(open) = code[cursor..].find(INTERP_START).map(|i| cursor + i) else {
                chunks.push(RawPart::Text(code[cursor..].to_string()));
                break;
            };
            let Some(close) = code[open..].find(INTERP_END).map(|i| open + i) else {
                return Err(AniseError::interpolation(format!(
                    "no matching {} found for native/raw interpolation",
                    INTERP_END
                )));
            };

            let mut reader = Reader::new(&code[open + INTERP_START.len()..close]);
            let Some(first) = reader.next() else {
                return Err(AniseError::interpolation(
                    "invalid native/raw: exactly one expression per interpolation",
                ));
            };
            let form = first?;
            let expr = self.analyze(&form, frame, ExprPosition::Value, fn_ctx, true)?;
            if open > cursor {
                chunks.push(RawPart::Text(code[cursor..open].to_string()));
            }
            chunks.push(RawPart::Expr(expr));
            if reader.next().is_some() {
                return Err(AniseError::interpolation(
                    "invalid native/raw: exactly one expression per interpolation",
                ));
            }
            cursor = close + INTERP_END.len();
        }

        Ok(Expr::NativeRaw(NativeRaw { base, chunks }))
    }

    fn analyze_vector(
        &mut self,
        items: &Vector<Value>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        let mut elements = Vec::with_capacity(items.len());
        let mut literal = true;
        for item in items {
            let expr = self.analyze(item, frame, ExprPosition::Value, fn_ctx, true)?;
            if !matches!(expr, Expr::PrimitiveLiteral(_)) {
                literal = false;
            }
            elements.push(expr);
        }

        if literal {
            // TODO: Order lifted sub-constants and reuse them during codegen.
            let value = Value::Vector(items.clone());
            self.frames.lift_constant(frame, value.clone());
            return Ok(Expr::PrimitiveLiteral(PrimitiveLiteral {
                base: ExprBase::new(position, frame, true),
                value,
            }));
        }

        Ok(Expr::Vector(VectorExpr {
            base: ExprBase::new(position, frame, true),
            elements,
        }))
    }

    fn analyze_map(
        &mut self,
        pairs: &Vector<(Value, Value)>,
        frame: FrameId,
        position: ExprPosition,
        fn_ctx: Option<&FnCtxRef>,
        _needs_box: bool,
    ) -> Result<Expr, AniseError> {
        // TODO: Detect all-literal maps and lift them like vectors.
        let mut analyzed = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key_expr = self.analyze(key, frame, ExprPosition::Value, fn_ctx, true)?;
            let value_expr = self.analyze(value, frame, ExprPosition::Value, fn_ctx, true)?;
            analyzed.push((key_expr, value_expr));
        }

        // TODO: Check key uniqueness.
        Ok(Expr::Map(MapExpr {
            base: ExprBase::new(position, frame, true),
            pairs: analyzed,
        }))
    }

    fn analyze_primitive_literal(
        &mut self,
        value: &Value,
        frame: FrameId,
        position: ExprPosition,
        _fn_ctx: Option<&FnCtxRef>,
        needs_box: bool,
    ) -> Result<Expr, AniseError> {
        self.frames.lift_constant(frame, value.clone());
        Ok(Expr::PrimitiveLiteral(PrimitiveLiteral {
            base: ExprBase::new(position, frame, needs_box),
            value: value.clone(),
        }))
    }
}
