// src/doc/text.rs

//! Text codec for document trees.
//!
//! The format is line-oriented: `key=value` attributes and
//! `[tag] ... [/tag]` child blocks, indented for readability. Text
//! values are double-quoted with embedded quotes doubled; booleans are
//! `yes`/`no`; integers and floats are written bare; byte strings are
//! `b"<base64>"`. Lines starting with `#` are comments.

use super::{DocError, Node, Value};
use base64::Engine;

/// Serialize a tree to its canonical text form.
pub fn write(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    for (key, value) in &node.attributes {
        if matches!(value, Value::Null) {
            continue;
        }
        indent(out, depth);
        out.push_str(key);
        out.push('=');
        write_value(out, value);
        out.push('\n');
    }

    for (tag, child) in &node.children {
        indent(out, depth);
        out.push('[');
        out.push_str(tag);
        out.push_str("]\n");
        write_node(out, child, depth + 1);
        indent(out, depth);
        out.push_str("[/");
        out.push_str(tag);
        out.push_str("]\n");
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push_str(if *b { "yes" } else { "no" }),
        Value::Int(n) => out.push_str(&n.to_string()),
        Value::Float(f) => {
            let s = f.to_string();
            out.push_str(&s);
            // A float that happens to be integral must not read back as Int.
            if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
                out.push_str(".0");
            }
        }
        Value::Text(s) => {
            out.push('"');
            for c in s.chars() {
                if c == '"' {
                    out.push('"');
                }
                out.push(c);
            }
            out.push('"');
        }
        Value::Bytes(b) => {
            out.push_str("b\"");
            out.push_str(&base64::engine::general_purpose::STANDARD.encode(b));
            out.push('"');
        }
    }
}

/// Parse a document from its text form.
pub fn parse(input: &str) -> Result<Node, DocError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        line: 1,
    };
    let root = parser.parse_body(None)?;
    Ok(root)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_blank(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Parse attributes and children until `[/<open_tag>]` (or EOF at
    /// the top level, where `open_tag` is None).
    fn parse_body(&mut self, open_tag: Option<&str>) -> Result<Node, DocError> {
        let mut node = Node::new();

        loop {
            self.skip_blank();

            match self.peek() {
                None => {
                    return match open_tag {
                        None => Ok(node),
                        Some(tag) => Err(DocError::UnclosedTag {
                            tag: tag.to_string(),
                            line: self.line,
                        }),
                    };
                }
                Some('[') => {
                    self.bump();
                    if self.peek() == Some('/') {
                        self.bump();
                        let tag = self.read_ident()?;
                        self.expect(']')?;
                        return match open_tag {
                            Some(open) if open == tag => Ok(node),
                            Some(open) => Err(DocError::MismatchedClose {
                                expected: open.to_string(),
                                found: tag,
                                line: self.line,
                            }),
                            None => Err(DocError::MismatchedClose {
                                expected: String::new(),
                                found: tag,
                                line: self.line,
                            }),
                        };
                    }
                    let tag = self.read_ident()?;
                    self.expect(']')?;
                    let child = self.parse_body(Some(&tag))?;
                    node.push_child(tag, child);
                }
                Some(c) if c == '_' || c.is_alphanumeric() => {
                    let key = self.read_ident()?;
                    self.skip_inline_space();
                    self.expect('=')?;
                    self.skip_inline_space();
                    let value = self.read_value()?;
                    node.attributes.insert(key, value);
                }
                Some(c) => {
                    return Err(DocError::UnexpectedChar {
                        found: c,
                        line: self.line,
                    });
                }
            }
        }
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), DocError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(DocError::UnexpectedChar {
                found: c,
                line: self.line,
            }),
            None => Err(DocError::UnexpectedEof),
        }
    }

    fn read_ident(&mut self) -> Result<String, DocError> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c == '-' || c.is_alphanumeric() {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(DocError::BadAttribute { line: self.line });
        }
        Ok(ident)
    }

    fn read_value(&mut self) -> Result<Value, DocError> {
        match self.peek() {
            Some('"') => {
                let text = self.read_quoted()?;
                Ok(Value::Text(text))
            }
            Some('b') if self.chars.get(self.pos + 1) == Some(&'"') => {
                self.bump();
                let text = self.read_quoted()?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(text.as_bytes())
                    .map_err(|_| DocError::BadBytes { line: self.line })?;
                Ok(Value::Bytes(bytes))
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(c) = self.peek() {
                    if c == '\n' || c == '#' {
                        break;
                    }
                    token.push(c);
                    self.bump();
                }
                Ok(parse_bare(token.trim_end()))
            }
            None => Err(DocError::UnexpectedEof),
        }
    }

    fn read_quoted(&mut self) -> Result<String, DocError> {
        self.expect('"')?;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => {
                    // A doubled quote is an escaped literal quote.
                    if self.peek() == Some('"') {
                        self.bump();
                        text.push('"');
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
                None => return Err(DocError::UnexpectedEof),
            }
        }
    }
}

fn parse_bare(token: &str) -> Value {
    match token {
        "yes" => return Value::Bool(true),
        "no" => return Value::Bool(false),
        "" => return Value::Text(String::new()),
        _ => {}
    }
    if let Ok(n) = token.parse::<i64>() {
        return Value::Int(n);
    }
    if let Ok(f) = token.parse::<f64>() {
        return Value::Float(f);
    }
    // Forgiving fallback for hand-edited config files.
    Value::Text(token.to_string())
}
