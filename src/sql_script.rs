//! Splitting of `.sql` files into executable statements.
//!
//! Understands the parts of mysql-client syntax that can hide a delimiter:
//! quoted strings and identifiers, comments, and the `DELIMITER` directive
//! used around stored routines and triggers.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::AdminError;

const DEFAULT_DELIMITER: &str = ";";

/// A single statement together with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlStatement {
    pub text: String,
    /// 1-based line of the statement's first significant character
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("unterminated {kind} starting at line {line}")]
    Unterminated { kind: &'static str, line: usize },

    #[error("DELIMITER directive without a delimiter at line {line}")]
    EmptyDelimiter { line: usize },
}

/// A parsed script file.
#[derive(Debug, Clone)]
pub struct SqlScript {
    pub path: PathBuf,
    pub statements: Vec<SqlStatement>,
}

impl SqlScript {
    /// Reads and splits a script file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AdminError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let statements = split_statements(&contents)?;
        debug!(
            path = %path.display(),
            statements = statements.len(),
            "Loaded SQL script"
        );
        Ok(Self {
            path: path.to_path_buf(),
            statements,
        })
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

struct Splitter<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    delimiter: Vec<char>,
    buffer: String,
    start_line: Option<usize>,
    line_blank: bool,
    statements: &'a mut Vec<SqlStatement>,
}

impl<'a> Splitter<'a> {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn at_delimiter(&self) -> bool {
        !self.delimiter.is_empty() && self.chars[self.pos..].starts_with(&self.delimiter)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.line_blank = true;
        } else if !c.is_whitespace() {
            self.line_blank = false;
        }
        Some(c)
    }

    /// Pushes significant text, recording where the statement began.
    fn push_content(&mut self, c: char) {
        if self.start_line.is_none() && !c.is_whitespace() {
            self.start_line = Some(self.line);
        }
        self.buffer.push(c);
    }

    fn finish_statement(&mut self) {
        let text = self.buffer.trim();
        if let Some(line) = self.start_line {
            if !text.is_empty() {
                self.statements.push(SqlStatement {
                    text: text.to_string(),
                    line,
                });
            }
        }
        self.buffer.clear();
        self.start_line = None;
    }

    fn at_delimiter_directive(&self) -> bool {
        const KEYWORD: [char; 9] = ['d', 'e', 'l', 'i', 'm', 'i', 't', 'e', 'r'];
        if !self.line_blank || self.start_line.is_some() {
            return false;
        }
        let rest = &self.chars[self.pos..];
        rest.len() > KEYWORD.len()
            && rest
                .iter()
                .zip(KEYWORD.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
            && matches!(rest[KEYWORD.len()], ' ' | '\t')
    }

    fn read_delimiter_directive(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        let mut directive = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            directive.push(c);
            self.advance();
        }
        let token = directive
            .split_whitespace()
            .nth(1)
            .ok_or(ScriptError::EmptyDelimiter { line })?;
        debug!(line, delimiter = token, "Switching statement delimiter");
        self.delimiter = token.chars().collect();
        // The directive line itself never counts as statement content.
        self.line_blank = true;
        Ok(())
    }

    fn read_quoted(&mut self, quote: char) -> Result<(), ScriptError> {
        let line = self.line;
        let kind = match quote {
            '`' => "quoted identifier",
            _ => "string literal",
        };
        let opening = self.advance().unwrap_or(quote);
        self.push_content(opening);
        loop {
            let c = self
                .advance()
                .ok_or(ScriptError::Unterminated { kind, line })?;
            self.buffer.push(c);
            if c == '\\' && quote != '`' {
                let escaped = self
                    .advance()
                    .ok_or(ScriptError::Unterminated { kind, line })?;
                self.buffer.push(escaped);
            } else if c == quote {
                if self.peek(0) == Some(quote) {
                    let doubled = self.advance().unwrap_or(quote);
                    self.buffer.push(doubled);
                } else {
                    return Ok(());
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_block_comment(&mut self) -> Result<(), ScriptError> {
        let line = self.line;
        // `/*! ... */` and `/*+ ... */` are executed by the server.
        let executable = matches!(self.peek(2), Some('!') | Some('+'));
        let mut comment = String::new();
        comment.push(self.advance().unwrap_or('/'));
        comment.push(self.advance().unwrap_or('*'));
        loop {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                self.advance();
                self.advance();
                comment.push_str("*/");
                break;
            }
            let c = self.advance().ok_or(ScriptError::Unterminated {
                kind: "block comment",
                line,
            })?;
            comment.push(c);
        }

        if executable {
            if self.start_line.is_none() {
                self.start_line = Some(line);
            }
            self.buffer.push_str(&comment);
        } else if !self.buffer.is_empty() {
            self.buffer.push(' ');
        }
        Ok(())
    }

    fn run(mut self) -> Result<(), ScriptError> {
        while let Some(c) = self.peek(0) {
            if self.at_delimiter_directive() {
                self.read_delimiter_directive()?;
                continue;
            }

            if self.at_delimiter() {
                for _ in 0..self.delimiter.len() {
                    self.advance();
                }
                self.finish_statement();
                continue;
            }

            match c {
                '\'' | '"' | '`' => self.read_quoted(c)?,
                '#' => self.skip_line_comment(),
                '-' if self.peek(1) == Some('-')
                    && self.peek(2).map_or(true, char::is_whitespace) =>
                {
                    self.skip_line_comment()
                }
                '/' if self.peek(1) == Some('*') => self.read_block_comment()?,
                _ => {
                    self.advance();
                    self.push_content(c);
                }
            }
        }
        self.finish_statement();
        Ok(())
    }
}

/// Splits a script into statements.
///
/// Fragments holding only whitespace or comments are dropped, so a trailing
/// delimiter or a commented-out block never produces an empty statement.
pub fn split_statements(script: &str) -> Result<Vec<SqlStatement>, ScriptError> {
    let mut statements = Vec::new();
    Splitter {
        chars: script.chars().collect(),
        pos: 0,
        line: 1,
        delimiter: DEFAULT_DELIMITER.chars().collect(),
        buffer: String::new(),
        start_line: None,
        line_blank: true,
        statements: &mut statements,
    }
    .run()?;
    Ok(statements)
}
