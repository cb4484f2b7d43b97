//! Text KeyValues (the `.vdf`/`.acf` form Steam writes for humans).
//!
//! The top level is a bare sequence of pairs, not wrapped in braces. A value is
//! either a string token or `{ ... }`. Quoted strings take the character after
//! a backslash verbatim; `\n` decodes to `n`, not a newline.
//!
//! Comment detection only looks one character ahead: `//` starts a line
//! comment, while a lone `/` in front of a token is dropped. Quote a value that
//! has to begin with `/`.

use super::{KvNode, KvValue};
use crate::error::{KvError, KvResult};
use std::{
    io::{Read, Write},
    iter::Peekable,
    str::Chars,
};

const BOM: char = '\u{feff}';
const MAX_DEPTH: usize = 256;

pub fn decode(text: &str) -> KvResult<KvNode> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut tokens = Tokenizer::new(text);
    parse_body(&mut tokens, None, 0)
}

pub fn read<R: Read>(mut reader: R) -> KvResult<KvNode> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;
    let text = String::from_utf8(raw).map_err(|_| KvError::InvalidUtf8 {
        context: "text document",
    })?;
    decode(&text)
}

/// Renders `node` with tab indentation, one key or brace per line and
/// every key and leaf value quoted.
pub fn encode(node: &KvNode) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

pub fn write<W: Write>(node: &KvNode, writer: &mut W) -> KvResult<()> {
    writer.write_all(encode(node).as_bytes())?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Open,
    Close,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Text(value) => format!("\"{value}\""),
            Token::Open => "'{'".to_string(),
            Token::Close => "'}'".to_string(),
        }
    }
}

struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    /// Next token and the line it starts on, or `None` at end of input.
    fn next_token(&mut self) -> KvResult<Option<(Token, usize)>> {
        loop {
            let Some(&ch) = self.chars.peek() else {
                return Ok(None);
            };
            let line = self.line;
            match ch {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' => {
                    self.bump();
                    if self.chars.peek() == Some(&'/') {
                        self.skip_line();
                    }
                }
                '{' => {
                    self.bump();
                    return Ok(Some((Token::Open, line)));
                }
                '}' => {
                    self.bump();
                    return Ok(Some((Token::Close, line)));
                }
                '"' => {
                    self.bump();
                    return Ok(Some((Token::Text(self.quoted()?), line)));
                }
                _ => return Ok(Some((Token::Text(self.bare()), line))),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.bump() {
            if ch == '\n' {
                break;
            }
        }
    }

    fn quoted(&mut self) -> KvResult<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(KvError::UnexpectedEof {
                        context: "quoted string",
                    })
                }
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => {
                        return Err(KvError::UnexpectedEof {
                            context: "escape sequence",
                        })
                    }
                },
                Some(ch) => value.push(ch),
            }
        }
    }

    fn bare(&mut self) -> String {
        let mut value = String::new();
        while let Some(&ch) = self.chars.peek() {
            if ch.is_whitespace() || ch == '{' || ch == '}' {
                break;
            }
            value.push(ch);
            self.bump();
        }
        value
    }
}

/// Parses pairs until end of input (top level) or the brace closing `open`.
fn parse_body(
    tokens: &mut Tokenizer<'_>,
    open: Option<(&str, usize)>,
    depth: usize,
) -> KvResult<KvNode> {
    if depth > MAX_DEPTH {
        return Err(KvError::TooDeep { limit: MAX_DEPTH });
    }

    let mut node = KvNode::new();
    loop {
        let Some((token, line)) = tokens.next_token()? else {
            return match open {
                None => Ok(node),
                Some((key, line)) => Err(KvError::Unterminated {
                    key: key.to_string(),
                    line,
                }),
            };
        };

        let key = match token {
            Token::Text(key) => key,
            Token::Close if open.is_some() => return Ok(node),
            other => {
                return Err(KvError::UnexpectedToken {
                    expected: "key",
                    found: other.describe(),
                    line,
                })
            }
        };

        let Some((token, value_line)) = tokens.next_token()? else {
            return Err(KvError::UnexpectedEof {
                context: "value",
            });
        };
        match token {
            Token::Text(value) => node.insert(key, value),
            Token::Open => {
                let child = parse_body(tokens, Some((key.as_str(), value_line)), depth + 1)?;
                node.insert(key, child);
            }
            Token::Close => {
                return Err(KvError::UnexpectedToken {
                    expected: "value",
                    found: Token::Close.describe(),
                    line: value_line,
                })
            }
        }
    }
}

fn write_node(out: &mut String, node: &KvNode, depth: usize) {
    for (key, value) in node.iter() {
        indent(out, depth);
        push_quoted(out, key);
        match value {
            KvValue::Node(child) => {
                out.push('\n');
                indent(out, depth);
                out.push_str("{\n");
                write_node(out, child, depth + 1);
                indent(out, depth);
                out.push_str("}\n");
            }
            leaf => {
                out.push('\t');
                push_quoted(out, &leaf.to_text());
                out.push('\n');
            }
        }
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

// Backslashes are escaped too, otherwise Windows paths would lose them on read.
fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}
