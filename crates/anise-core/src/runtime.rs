use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ast::{map_get, Keyword, Symbol, Value};
use crate::error::AniseError;
use crate::symbols;

pub const DEFAULT_NS: &str = "user";

/// A namespaced mutable cell naming a runtime value. Identity is the
/// qualified name; interning the same name twice yields the same cell.
#[derive(Debug)]
pub struct Var {
    pub ns: String,
    pub name: String,
    root: RwLock<Option<Value>>,
    meta: RwLock<Option<Value>>,
}

impl Var {
    fn new(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            name: name.into(),
            root: RwLock::new(None),
            meta: RwLock::new(None),
        }
    }

    pub fn qualified_symbol(&self) -> Symbol {
        Symbol::new(self.ns.clone(), self.name.clone())
    }

    pub fn root(&self) -> Option<Value> {
        self.root.read().unwrap().clone()
    }

    pub fn set_root(&self, value: Value) {
        *self.root.write().unwrap() = Some(value);
    }

    pub fn meta(&self) -> Option<Value> {
        self.meta.read().unwrap().clone()
    }

    pub fn set_meta(&self, meta: Value) {
        *self.meta.write().unwrap() = Some(meta);
    }

    /// A var names a macro iff its meta map binds `:macro` to a non-nil
    /// value.
    pub fn is_macro(&self) -> bool {
        let Some(meta) = self.meta() else {
            return false;
        };
        let key = Value::Keyword(Keyword::new("", "macro"));
        !matches!(map_get(&meta, &key), None | Some(Value::Nil))
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.ns == other.ns && self.name == other.name
    }
}

impl Eq for Var {}

#[derive(Debug, Default)]
struct Namespace {
    vars: HashMap<String, Arc<Var>>,
}

pub type MacroExpander = Arc<dyn Fn(&RuntimeCtx, &Value) -> Result<Value, AniseError>>;

/// Shared, read-mostly state the analyzer leans on: namespaces and vars,
/// keyword interning, macro expansion, and module bookkeeping for
/// ahead-of-time compilation. One context per compilation unit.
pub struct RuntimeCtx {
    namespaces: RefCell<HashMap<String, Namespace>>,
    current_ns: RefCell<String>,
    macros: RefCell<HashMap<Symbol, MacroExpander>>,
    compiling: Cell<bool>,
    current_module: RefCell<String>,
    module_dependencies: RefCell<HashMap<String, Vec<String>>>,
    modules: RefCell<HashMap<String, String>>,
}

impl Default for RuntimeCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeCtx {
    pub fn new() -> Self {
        let ctx = Self {
            namespaces: RefCell::new(HashMap::new()),
            current_ns: RefCell::new(DEFAULT_NS.to_string()),
            macros: RefCell::new(HashMap::new()),
            compiling: Cell::new(false),
            current_module: RefCell::new(String::new()),
            module_dependencies: RefCell::new(HashMap::new()),
            modules: RefCell::new(HashMap::new()),
        };
        ctx.ensure_ns(DEFAULT_NS);
        ctx
    }

    fn ensure_ns(&self, name: &str) {
        self.namespaces
            .borrow_mut()
            .entry(name.to_string())
            .or_default();
    }

    pub fn current_ns(&self) -> String {
        self.current_ns.borrow().clone()
    }

    pub fn set_current_ns(&self, name: &str) {
        self.ensure_ns(name);
        *self.current_ns.borrow_mut() = name.to_string();
    }

    /// Qualifies an unqualified symbol against the current namespace.
    /// Already-qualified symbols pass through unchanged.
    pub fn qualify_symbol(&self, sym: &Symbol) -> Symbol {
        if sym.is_qualified() {
            sym.clone()
        } else {
            Symbol::new(self.current_ns(), sym.name.clone())
        }
    }

    pub fn intern_var(&self, sym: &Symbol) -> Result<Arc<Var>, AniseError> {
        if !sym.is_qualified() {
            return Err(AniseError::name(format!(
                "unable to intern var: unqualified symbol {}",
                sym
            )));
        }
        let mut namespaces = self.namespaces.borrow_mut();
        let ns = namespaces.entry(sym.ns.clone()).or_default();
        let var = ns
            .vars
            .entry(sym.name.clone())
            .or_insert_with(|| Arc::new(Var::new(sym.ns.clone(), sym.name.clone())));
        Ok(var.clone())
    }

    pub fn find_var(&self, sym: &Symbol) -> Option<Arc<Var>> {
        if !sym.is_qualified() {
            return None;
        }
        self.namespaces
            .borrow()
            .get(&sym.ns)
            .and_then(|ns| ns.vars.get(&sym.name))
            .cloned()
    }

    pub fn intern_keyword(&self, ns: &str, name: &str) -> Keyword {
        Keyword::new(ns, name)
    }

    /// Interns a var in the current namespace, marks it `:macro`, and
    /// registers its host expander.
    pub fn register_macro<F>(&self, name: &str, expander: F) -> Result<Arc<Var>, AniseError>
    where
        F: Fn(&RuntimeCtx, &Value) -> Result<Value, AniseError> + 'static,
    {
        let qualified = self.qualify_symbol(&Symbol::parse(name));
        let var = self.intern_var(&qualified)?;
        let macro_key = Value::Keyword(self.intern_keyword("", "macro"));
        var.set_meta(Value::map(vec![(macro_key, Value::Bool(true))]));
        self.macros.borrow_mut().insert(qualified, Arc::new(expander));
        Ok(var)
    }

    /// Single-step expansion. Returns the form unchanged unless it is a
    /// call whose head resolves to a macro var with a registered
    /// expander; callers restart analysis on a non-identity result.
    pub fn macroexpand(&self, form: &Value) -> Result<Value, AniseError> {
        let Value::List(items) = form else {
            return Ok(form.clone());
        };
        let Some(Value::Symbol(head)) = items.front() else {
            return Ok(form.clone());
        };
        let qualified = self.qualify_symbol(head);
        let Some(var) = self.find_var(&qualified) else {
            return Ok(form.clone());
        };
        if !var.is_macro() {
            return Ok(form.clone());
        }
        let expander = self.macros.borrow().get(&qualified).cloned();
        match expander {
            Some(expand) => expand(self, form),
            None => Ok(form.clone()),
        }
    }

    pub fn unique_string(&self, prefix: &str) -> String {
        symbols::unique_string(prefix)
    }

    pub fn munge(&self, name: &str) -> String {
        symbols::munge(name)
    }

    pub fn compiling(&self) -> bool {
        self.compiling.get()
    }

    pub fn set_compiling(&self, compiling: bool) {
        self.compiling.set(compiling);
    }

    pub fn current_module(&self) -> String {
        self.current_module.borrow().clone()
    }

    pub fn set_current_module(&self, module: &str) {
        *self.current_module.borrow_mut() = module.to_string();
    }

    pub fn add_module_dependency(&self, from: &str, to: &str) {
        self.module_dependencies
            .borrow_mut()
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
    }

    pub fn module_dependencies(&self, module: &str) -> Vec<String> {
        self.module_dependencies
            .borrow()
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    pub fn write_module(&self, name: &str, source: &str) {
        self.modules
            .borrow_mut()
            .insert(name.to_string(), source.to_string());
    }

    pub fn module_source(&self, name: &str) -> Option<String> {
        self.modules.borrow().get(name).cloned()
    }
}
