//! The lexical scanner.
//!
//! Lowercase identifiers are events (and channel names and bound
//! variables), uppercase identifiers are process names. Reserved
//! words: `STOP RUN SKIP CHAOS alpha mu string integer div mod`.
//! Comments are `/* … */` and `-- …`; `//` is the subordination
//! operator, not a comment. Whitespace is ignored; tabs advance the
//! column to the next multiple of 8.

use csp_engine::diag::SourcePos;

use crate::source::SyntaxError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tok {
    /// Lowercase identifier: an event, channel or variable name.
    Event(String),
    /// Uppercase identifier: a process name.
    Process(String),
    Integer(u64),
    /// A quoted string literal, quotes included.
    Str(String),

    Stop,
    Run,
    Skip,
    Chaos,
    Alpha,
    Mu,
    IntegerKw,
    StringKw,
    Div,
    Mod,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Equal,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Backslash,
    Question,
    Exclamation,
    Plus,
    Minus,
    Star,
    Arrow,          // ->
    Bar,            // |
    Parallel,       // ||
    Interleave,     // |||
    ExternalChoice, // []
    InternalChoice, // |~|
    Pipe,           // >>
    Subordination,  // //

    Eof,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub tok: Tok,
    pub pos: SourcePos,
    pub len: u32,
}

pub struct Scanner {
    chars: Vec<char>,
    index: usize,
    pos: SourcePos,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            pos: SourcePos::new(1, 1),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.index += 1;
        match ch {
            '\n' => {
                self.pos.line += 1;
                self.pos.column = 1;
            }
            '\t' => {
                self.pos.column += 8 - (self.pos.column - 1) % 8;
            }
            _ => self.pos.column += 1,
        }
        Some(ch)
    }

    /// The next token. Lexical errors are returned to the caller,
    /// which reports them and keeps scanning.
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(ch) = self.peek() else {
                return Ok(Token { tok: Tok::Eof, pos: start, len: 1 });
            };

            if ch.is_ascii_alphabetic() || ch == '_' {
                return Ok(self.identifier(start));
            }
            if ch.is_ascii_digit() {
                return self.integer(start);
            }
            if ch == '"' {
                return self.string_literal(start);
            }

            self.bump();
            let tok = match ch {
                '(' => Tok::LParen,
                ')' => Tok::RParen,
                '{' => Tok::LBrace,
                '}' => Tok::RBrace,
                '=' => Tok::Equal,
                ',' => Tok::Comma,
                ';' => Tok::Semicolon,
                ':' => Tok::Colon,
                '.' => Tok::Dot,
                '\\' => Tok::Backslash,
                '?' => Tok::Question,
                '!' => Tok::Exclamation,
                '+' => Tok::Plus,
                '*' => Tok::Star,
                '-' => match self.peek() {
                    Some('>') => {
                        self.bump();
                        Tok::Arrow
                    }
                    Some('-') => {
                        // line comment
                        while let Some(c) = self.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                        continue;
                    }
                    _ => Tok::Minus,
                },
                '/' => match self.peek() {
                    Some('/') => {
                        self.bump();
                        Tok::Subordination
                    }
                    Some('*') => {
                        self.bump();
                        self.block_comment(start)?;
                        continue;
                    }
                    _ => {
                        return Err(SyntaxError::new(start, 1, "invalid token"));
                    }
                },
                '|' => match self.peek() {
                    Some('|') => {
                        self.bump();
                        if self.peek() == Some('|') {
                            self.bump();
                            Tok::Interleave
                        } else {
                            Tok::Parallel
                        }
                    }
                    Some('~') => {
                        self.bump();
                        if self.peek() == Some('|') {
                            self.bump();
                            Tok::InternalChoice
                        } else {
                            return Err(SyntaxError::new(
                                start,
                                2,
                                "invalid token",
                            ));
                        }
                    }
                    _ => Tok::Bar,
                },
                '[' => {
                    if self.peek() == Some(']') {
                        self.bump();
                        Tok::ExternalChoice
                    } else {
                        return Err(SyntaxError::new(start, 1, "invalid token"));
                    }
                }
                '>' => {
                    if self.peek() == Some('>') {
                        self.bump();
                        Tok::Pipe
                    } else {
                        return Err(SyntaxError::new(start, 1, "invalid token"));
                    }
                }
                _ => {
                    return Err(SyntaxError::new(start, 1, "invalid token"));
                }
            };
            let len = self.pos.column.saturating_sub(start.column).max(1);
            return Ok(Token { tok, pos: start, len });
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn identifier(&mut self, start: SourcePos) -> Token {
        let first = self.peek().unwrap_or(' ');
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let len = text.chars().count() as u32;
        let tok = match text.as_str() {
            "STOP" => Tok::Stop,
            "RUN" => Tok::Run,
            "SKIP" => Tok::Skip,
            "CHAOS" => Tok::Chaos,
            "alpha" => Tok::Alpha,
            "mu" => Tok::Mu,
            "integer" => Tok::IntegerKw,
            "string" => Tok::StringKw,
            "div" => Tok::Div,
            "mod" => Tok::Mod,
            _ if first.is_ascii_uppercase() => Tok::Process(text),
            _ => Tok::Event(text),
        };
        Token { tok, pos: start, len }
    }

    fn integer(&mut self, start: SourcePos) -> Result<Token, SyntaxError> {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let len = text.len() as u32;
        match text.parse::<u64>() {
            Ok(value) => {
                Ok(Token { tok: Tok::Integer(value), pos: start, len })
            }
            Err(_) => {
                Err(SyntaxError::new(start, len, "integer literal too large"))
            }
        }
    }

    fn string_literal(&mut self, start: SourcePos) -> Result<Token, SyntaxError> {
        self.bump(); // opening quote
        let mut text = String::from("\"");
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(SyntaxError::new(
                        start,
                        text.chars().count() as u32,
                        "unterminated string literal",
                    ));
                }
                Some('"') => {
                    self.bump();
                    text.push('"');
                    let len = text.chars().count() as u32;
                    return Ok(Token { tok: Tok::Str(text), pos: start, len });
                }
                Some(ch) => {
                    self.bump();
                    text.push(ch);
                }
            }
        }
    }

    fn block_comment(&mut self, start: SourcePos) -> Result<(), SyntaxError> {
        let mut star = false;
        loop {
            match self.bump() {
                None => {
                    return Err(SyntaxError::new(
                        start,
                        2,
                        "unexpected eof in delimited comment",
                    ));
                }
                Some('/') if star => return Ok(()),
                Some(ch) => star = ch == '*',
            }
        }
    }
}
