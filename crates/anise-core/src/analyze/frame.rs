use std::collections::HashMap;

use crate::ast::{Symbol, Value};

use super::expr::Expr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Root,
    Fn,
    Let,
}

/// Arena handle for a lexical frame. Frames form a tree rooted at the
/// single `Root` frame; handles keep the tree free of ownership cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

#[derive(Clone, Debug)]
pub struct LocalBinding {
    pub name: Symbol,
    pub value_expr: Option<Box<Expr>>,
    pub origin_frame: FrameId,
    pub needs_box: bool,
    pub has_boxed_usage: bool,
    pub has_unboxed_usage: bool,
}

impl LocalBinding {
    pub fn new(
        name: Symbol,
        value_expr: Option<Box<Expr>>,
        origin_frame: FrameId,
        needs_box: bool,
    ) -> Self {
        Self {
            name,
            value_expr,
            origin_frame,
            needs_box,
            has_boxed_usage: false,
            has_unboxed_usage: false,
        }
    }
}

#[derive(Debug)]
pub struct LocalFrame {
    pub kind: FrameKind,
    pub parent: Option<FrameId>,
    locals: HashMap<String, LocalBinding>,
    lifted_constants: Vec<Value>,
    lifted_vars: Vec<Symbol>,
}

impl LocalFrame {
    fn new(kind: FrameKind, parent: Option<FrameId>) -> Self {
        Self {
            kind,
            parent,
            locals: HashMap::new(),
            lifted_constants: Vec::new(),
            lifted_vars: Vec::new(),
        }
    }

    pub fn locals(&self) -> &HashMap<String, LocalBinding> {
        &self.locals
    }

    /// Lifted sets are kept in first-reference order; code generation
    /// relies on it.
    pub fn lifted_constants(&self) -> &[Value] {
        &self.lifted_constants
    }

    pub fn lifted_vars(&self) -> &[Symbol] {
        &self.lifted_vars
    }
}

/// Result of a scope walk. `crossed_fns` lists, innermost first, every
/// `fn` frame between the reference and the frame holding the binding; a
/// non-empty list marks a closure capture.
#[derive(Clone, Debug)]
pub struct FoundLocal {
    pub frame: FrameId,
    pub crossed_fns: Vec<FrameId>,
}

#[derive(Debug, Default)]
pub struct FrameArena {
    frames: Vec<LocalFrame>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: FrameKind, parent: Option<FrameId>) -> FrameId {
        let id = FrameId(self.frames.len());
        self.frames.push(LocalFrame::new(kind, parent));
        id
    }

    pub fn get(&self, id: FrameId) -> &LocalFrame {
        &self.frames[id.0]
    }

    pub fn get_mut(&mut self, id: FrameId) -> &mut LocalFrame {
        &mut self.frames[id.0]
    }

    pub fn insert_local(&mut self, frame: FrameId, binding: LocalBinding) {
        let key = binding.name.name.clone();
        self.get_mut(frame).locals.insert(key, binding);
    }

    pub fn binding(&self, frame: FrameId, name: &str) -> Option<&LocalBinding> {
        self.get(frame).locals.get(name)
    }

    pub fn binding_mut(&mut self, frame: FrameId, name: &str) -> Option<&mut LocalBinding> {
        self.get_mut(frame).locals.get_mut(name)
    }

    pub fn find_local_or_capture(&self, start: FrameId, sym: &Symbol) -> Option<FoundLocal> {
        let mut crossed_fns = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            let frame = self.get(id);
            if frame.locals.contains_key(&sym.name) {
                return Some(FoundLocal {
                    frame: id,
                    crossed_fns,
                });
            }
            if frame.kind == FrameKind::Fn {
                crossed_fns.push(id);
            }
            current = frame.parent;
        }
        None
    }

    /// Installs a capture binding in every crossed `fn` frame so a
    /// repeated lookup resolves without crossing, and marks the
    /// originating binding as boxed. Captures are always boxed.
    pub fn register_captures(&mut self, sym: &Symbol, found: &FoundLocal) {
        if found.crossed_fns.is_empty() {
            return;
        }
        for &fn_frame in &found.crossed_fns {
            if self.binding(fn_frame, &sym.name).is_none() {
                let capture = LocalBinding::new(sym.clone(), None, found.frame, true);
                self.insert_local(fn_frame, capture);
            }
        }
        if let Some(origin) = self.binding_mut(found.frame, &sym.name) {
            origin.has_boxed_usage = true;
        }
    }

    /// The nearest enclosing frame that owns lifted sets: `let` frames
    /// never do, so lookups bubble up to the enclosing `fn` or root.
    pub fn nearest_callable(&self, start: FrameId) -> FrameId {
        let mut id = start;
        loop {
            let frame = self.get(id);
            if frame.kind != FrameKind::Let {
                return id;
            }
            match frame.parent {
                Some(parent) => id = parent,
                None => return id,
            }
        }
    }

    pub fn lift_constant(&mut self, frame: FrameId, value: Value) {
        let target = self.nearest_callable(frame);
        let frame = self.get_mut(target);
        if !frame.lifted_constants.contains(&value) {
            frame.lifted_constants.push(value);
        }
    }

    pub fn lift_var(&mut self, frame: FrameId, sym: Symbol) {
        let target = self.nearest_callable(frame);
        let frame = self.get_mut(target);
        if !frame.lifted_vars.contains(&sym) {
            frame.lifted_vars.push(sym);
        }
    }
}
