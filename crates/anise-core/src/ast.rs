use std::fmt;
use std::sync::Arc;

use im::Vector;

use crate::runtime::Var;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub col: usize,
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub ns: String,
    pub name: String,
}

impl Symbol {
    pub fn new(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            name: name.into(),
        }
    }

    /// Splits `ns/name` on the first slash. A lone `/` is the symbol
    /// named `/`, and a leading slash never forms a namespace.
    pub fn parse(full: &str) -> Self {
        if full != "/" {
            if let Some((ns, name)) = full.split_once('/') {
                if !ns.is_empty() {
                    return Self::new(ns, name);
                }
            }
        }
        Self::new("", full)
    }

    pub fn is_qualified(&self) -> bool {
        !self.ns.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.ns, self.name)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Keyword {
    pub ns: String,
    pub name: String,
}

impl Keyword {
    pub fn new(ns: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ns: ns.into(),
            name: name.into(),
        }
    }

    pub fn parse(full: &str) -> Self {
        let sym = Symbol::parse(full);
        Self {
            ns: sym.ns,
            name: sym.name,
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, ":{}", self.name)
        } else {
            write!(f, ":{}/{}", self.ns, self.name)
        }
    }
}

/// A reader-produced runtime value, the input alphabet of the analyzer.
/// Maps are ordered pair sequences; the analyzer depends on source-order
/// iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Symbol(Symbol),
    List(Vector<Value>),
    Vector(Vector<Value>),
    Map(Vector<(Value, Value)>),
    Set(Vector<Value>),
    Var(Arc<Var>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Vector::from(items))
    }

    pub fn vector(items: Vec<Value>) -> Self {
        Value::Vector(Vector::from(items))
    }

    pub fn map(pairs: Vec<(Value, Value)>) -> Self {
        Value::Map(Vector::from(pairs))
    }

    pub fn symbol(full: &str) -> Self {
        Value::Symbol(Symbol::parse(full))
    }

    pub fn keyword(full: &str) -> Self {
        Value::Keyword(Keyword::parse(full))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Str(_) => "string",
            Value::Keyword(_) => "keyword",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Var(_) => "var",
        }
    }
}

pub fn truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Bool(false))
}

/// Key lookup over a map value. Returns `None` for non-map values, which
/// lets metadata chains degrade to "absent" instead of erroring.
pub fn map_get<'a>(map: &'a Value, key: &Value) -> Option<&'a Value> {
    let Value::Map(pairs) = map else {
        return None;
    };
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &Vector<Value>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        _ => write!(f, "{}", ch)?,
                    }
                }
                write!(f, "\"")
            }
            Value::Keyword(k) => write!(f, "{}", k),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "(")?;
                write_joined(f, items)?;
                write!(f, ")")
            }
            Value::Vector(items) => {
                write!(f, "[")?;
                write_joined(f, items)?;
                write!(f, "]")
            }
            Value::Map(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Set(items) => {
                write!(f, "#{{")?;
                write_joined(f, items)?;
                write!(f, "}}")
            }
            Value::Var(var) => write!(f, "#'{}/{}", var.ns, var.name),
        }
    }
}
