use im::Vector;

use crate::ast::{Keyword, Span, Symbol, Value};
use crate::error::AniseError;

/// Char-walking reader producing runtime values, one top-level form per
/// iteration. The analyzer consumes it as a lazy sequence of results; it
/// is also used to re-lex `native/raw` interpolation segments.
pub struct Reader {
    chars: Vec<char>,
    index: usize,
    line: usize,
    col: usize,
}

impl Reader {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<Value>, AniseError> {
        let mut forms = Vec::new();
        for form in self {
            forms.push(form?);
        }
        Ok(forms)
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
            index: self.index,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() || ch == ',' => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(ch) = self.bump() {
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn is_delimiter(ch: char) -> bool {
        ch.is_whitespace() || matches!(ch, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';')
    }

    fn read_form(&mut self) -> Result<Value, AniseError> {
        let start = self.span();
        match self.peek() {
            None => Err(AniseError::parse("unexpected end of input").with_span(start)),
            Some('(') => {
                self.bump();
                Ok(Value::List(self.read_seq(')', start)?))
            }
            Some('[') => {
                self.bump();
                Ok(Value::Vector(self.read_seq(']', start)?))
            }
            Some('{') => {
                self.bump();
                self.read_map(start)
            }
            Some('#') if self.peek_at(1) == Some('{') => {
                self.bump();
                self.bump();
                Ok(Value::Set(self.read_seq('}', start)?))
            }
            Some(ch @ (')' | ']' | '}')) => {
                Err(AniseError::parse(format!("unexpected {}", ch)).with_span(start))
            }
            Some('\'') => {
                self.bump();
                self.skip_trivia();
                if self.peek().is_none() {
                    return Err(
                        AniseError::parse("unexpected end of input after quote").with_span(start)
                    );
                }
                let quoted = self.read_form()?;
                Ok(Value::list(vec![Value::symbol("quote"), quoted]))
            }
            Some('"') => self.read_string(start),
            Some(_) => self.read_atom(start),
        }
    }

    fn read_seq(&mut self, close: char, start: Span) -> Result<Vector<Value>, AniseError> {
        let mut items = Vector::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => {
                    return Err(
                        AniseError::parse(format!("unexpected end of input, expected {}", close))
                            .with_span(start),
                    )
                }
                Some(ch) if ch == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(ch @ (')' | ']' | '}')) => {
                    return Err(AniseError::parse(format!("unexpected {}", ch))
                        .with_span(self.span()))
                }
                Some(_) => items.push_back(self.read_form()?),
            }
        }
    }

    fn read_map(&mut self, start: Span) -> Result<Value, AniseError> {
        let items = self.read_seq('}', start)?;
        if items.len() % 2 == 1 {
            return Err(
                AniseError::parse("map literal requires an even number of forms").with_span(start),
            );
        }
        let mut pairs = Vector::new();
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push_back((k, v));
        }
        Ok(Value::Map(pairs))
    }

    fn read_string(&mut self, start: Span) -> Result<Value, AniseError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(AniseError::parse("unterminated string").with_span(start)),
                Some('"') => return Ok(Value::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(ch) => {
                        return Err(AniseError::parse(format!("invalid escape character {}", ch))
                            .with_span(start))
                    }
                    None => return Err(AniseError::parse("unterminated string").with_span(start)),
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn read_atom(&mut self, start: Span) -> Result<Value, AniseError> {
        let mut token = String::new();
        while let Some(ch) = self.peek() {
            if Self::is_delimiter(ch) {
                break;
            }
            token.push(ch);
            self.bump();
        }

        if let Some(rest) = token.strip_prefix(':') {
            if rest.is_empty() {
                return Err(AniseError::parse("invalid keyword").with_span(start));
            }
            return Ok(Value::Keyword(Keyword::parse(rest)));
        }

        match token.as_str() {
            "nil" => return Ok(Value::Nil),
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        let mut chars = token.chars();
        let first = chars.next().unwrap_or(' ');
        let numeric = first.is_ascii_digit()
            || (matches!(first, '+' | '-') && chars.next().is_some_and(|c| c.is_ascii_digit()));
        if numeric {
            if let Ok(n) = token.parse::<i64>() {
                return Ok(Value::Int(n));
            }
            if let Ok(x) = token.parse::<f64>() {
                return Ok(Value::Float(x));
            }
            return Err(AniseError::parse(format!("invalid number: {}", token)).with_span(start));
        }

        Ok(Value::Symbol(Symbol::parse(&token)))
    }
}

impl Iterator for Reader {
    type Item = Result<Value, AniseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        self.peek()?;
        Some(self.read_form())
    }
}
