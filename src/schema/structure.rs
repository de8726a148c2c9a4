//! Structure constraint mini-language
//!
//! The `structure` cell of `column.tsv` holds one of:
//! - `primary` — key column, values unique and present
//! - `unique` — values unique among non-blank cells
//! - `from(<table>.<column>)` — foreign key into another table's column
//! - `tree(<column>)` — parent pointer into the named key column of the
//!   same table
//! - empty — no constraint
//!
//! Parsed by a small recursive descent so malformed structure strings fail
//! the schema build with a precise diagnostic rather than being silently
//! ignored.

use std::fmt;

use thiserror::Error;

/// Errors produced while parsing a structure expression
#[derive(Debug, Clone, Error)]
pub enum StructureError {
    /// Input ended mid-expression
    #[error("structure ended unexpectedly, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// A character that does not fit the grammar at this position
    #[error("unexpected character {found:?} at byte {at}, expected {expected}")]
    Unexpected {
        found: char,
        at: usize,
        expected: &'static str,
    },

    /// A keyword outside the grammar
    #[error("unknown structure '{name}'")]
    UnknownKeyword { name: String },

    /// Well-formed expression followed by extra input
    #[error("trailing input at byte {at}")]
    TrailingInput { at: usize },
}

/// A parsed structure constraint attached to a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structure {
    /// Key column: unique, and blank cells are violations
    Primary,
    /// Unique among non-blank cells
    Unique,
    /// Every non-blank value must exist in `table.column`
    From { table: String, column: String },
    /// Parent pointer into the named key column of the same table
    Tree { column: String },
}

impl Structure {
    /// Parses a non-empty structure cell.
    ///
    /// Callers map an empty cell to `None` before reaching here.
    pub fn parse(input: &str) -> Result<Self, StructureError> {
        let mut cursor = Cursor::new(input);
        let structure = cursor.structure()?;
        cursor.skip_ws();
        if cursor.pos < cursor.input.len() {
            return Err(StructureError::TrailingInput { at: cursor.pos });
        }
        Ok(structure)
    }

    /// Whether values under this constraint must be unique.
    ///
    /// `primary` implies `unique`.
    pub fn requires_unique(&self) -> bool {
        matches!(self, Structure::Primary | Structure::Unique)
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Structure::Primary => write!(f, "primary"),
            Structure::Unique => write!(f, "unique"),
            Structure::From { table, column } => write!(f, "from({}.{})", table, column),
            Structure::Tree { column } => write!(f, "tree({})", column),
        }
    }
}

struct Cursor<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn expect(&mut self, expected: char, label: &'static str) -> Result<(), StructureError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(StructureError::Unexpected {
                found: c,
                at: self.pos,
                expected: label,
            }),
            None => Err(StructureError::UnexpectedEnd { expected: label }),
        }
    }

    fn structure(&mut self) -> Result<Structure, StructureError> {
        self.skip_ws();
        let keyword = self.ident("a structure keyword")?;
        match keyword.as_str() {
            "primary" => Ok(Structure::Primary),
            "unique" => Ok(Structure::Unique),
            "from" => {
                self.skip_ws();
                self.expect('(', "'('")?;
                let table = self.table_name()?;
                self.expect('.', "'.'")?;
                let column = self.ident("a column name")?;
                self.skip_ws();
                self.expect(')', "')'")?;
                Ok(Structure::From { table, column })
            }
            "tree" => {
                self.skip_ws();
                self.expect('(', "'('")?;
                self.skip_ws();
                let column = self.ident("a column name")?;
                self.skip_ws();
                self.expect(')', "')'")?;
                Ok(Structure::Tree { column })
            }
            other => Err(StructureError::UnknownKeyword {
                name: other.to_string(),
            }),
        }
    }

    fn ident(&mut self, label: &'static str) -> Result<String, StructureError> {
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_alphanumeric() || b == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            match self.peek() {
                Some(c) => Err(StructureError::Unexpected {
                    found: c,
                    at: start,
                    expected: label,
                }),
                None => Err(StructureError::UnexpectedEnd { expected: label }),
            }
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    /// Table names may carry a `{placeholder}` segment; the dot separating
    /// the column is not part of the name.
    fn table_name(&mut self) -> Result<String, StructureError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'{' || b == b'}' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            match self.peek() {
                Some(c) => Err(StructureError::Unexpected {
                    found: c,
                    at: start,
                    expected: "a table name",
                }),
                None => Err(StructureError::UnexpectedEnd {
                    expected: "a table name",
                }),
            }
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }
}
