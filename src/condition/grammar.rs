//! Condition expressions: parsing, compilation, evaluation

use std::fmt;

use regex::Regex;

use super::errors::{ConditionError, ConditionResult};

/// A regex literal compiled at parse time.
///
/// The original source text is kept so conditions can be printed back in the
/// form they were written in.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    fn anchored(source: &str) -> ConditionResult<Self> {
        // Full-match semantics: the whole cell must match.
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
            ConditionError::BadPattern {
                pattern: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    fn unanchored(source: &str) -> ConditionResult<Self> {
        let regex = Regex::new(source).map_err(|e| ConditionError::BadPattern {
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// A compiled, composable predicate over a raw cell value
#[derive(Debug, Clone)]
pub enum Condition {
    /// The whole value matches the pattern
    Match(Pattern),
    /// The pattern occurs nowhere in the value
    Exclude(Pattern),
    /// The value is one of the listed literals
    In(Vec<String>),
    /// At least one sub-condition accepts the value
    Any(Vec<Condition>),
    /// The sub-condition rejects the value
    Not(Box<Condition>),
    /// The value is the empty string
    Blank,
}

impl Condition {
    /// Parses and compiles a condition expression.
    pub fn parse(input: &str) -> ConditionResult<Self> {
        let mut parser = Parser::new(input);
        let condition = parser.condition()?;
        parser.skip_ws();
        if parser.pos < parser.input.len() {
            return Err(ConditionError::TrailingInput { at: parser.pos });
        }
        Ok(condition)
    }

    /// Evaluates the condition against a raw cell value.
    ///
    /// `Any` short-circuits on the first accepting sub-condition.
    pub fn evaluate(&self, value: &str) -> bool {
        match self {
            Condition::Match(pattern) => pattern.is_match(value),
            Condition::Exclude(pattern) => !pattern.is_match(value),
            Condition::In(items) => items.iter().any(|item| item == value),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(value)),
            Condition::Not(condition) => !condition.evaluate(value),
            Condition::Blank => value.is_empty(),
        }
    }

    /// Whether the condition accepts the empty string.
    ///
    /// Used to warn about `primary`/`unique` columns whose datatype admits
    /// blank values.
    pub fn accepts_blank(&self) -> bool {
        self.evaluate("")
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Match(p) => write!(f, "match(/{}/)", p.source),
            Condition::Exclude(p) => write!(f, "exclude(/{}/)", p.source),
            Condition::In(items) => {
                write!(f, "in(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\"", item.replace('\\', "\\\\").replace('"', "\\\""))?;
                }
                write!(f, ")")
            }
            Condition::Any(conditions) => {
                write!(f, "any(")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Condition::Not(c) => write!(f, "not({})", c),
            Condition::Blank => write!(f, "blank"),
        }
    }
}

/// Recursive-descent parser over the condition grammar
struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
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

    fn expect(&mut self, expected: char) -> ConditionResult<()> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(ConditionError::Unexpected {
                found: c,
                at: self.pos,
                expected: match expected {
                    '(' => "'('",
                    ')' => "')'",
                    '/' => "'/'",
                    '"' => "'\"'",
                    _ => "punctuation",
                },
            }),
            None => Err(ConditionError::UnexpectedEnd {
                expected: "punctuation",
            }),
        }
    }

    fn condition(&mut self) -> ConditionResult<Condition> {
        self.skip_ws();
        let name = self.ident()?;
        match name.as_str() {
            "blank" => Ok(Condition::Blank),
            "match" => {
                self.skip_ws();
                self.expect('(')?;
                let pattern = self.regex_literal()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Condition::Match(Pattern::anchored(&pattern)?))
            }
            "exclude" => {
                self.skip_ws();
                self.expect('(')?;
                let pattern = self.regex_literal()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Condition::Exclude(Pattern::unanchored(&pattern)?))
            }
            "in" => {
                self.skip_ws();
                self.expect('(')?;
                let mut items = vec![self.string_literal()?];
                loop {
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => {
                            self.pos += 1;
                            items.push(self.string_literal()?);
                        }
                        Some(')') => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            return Err(ConditionError::Unexpected {
                                found: c,
                                at: self.pos,
                                expected: "',' or ')'",
                            })
                        }
                        None => {
                            return Err(ConditionError::UnexpectedEnd {
                                expected: "',' or ')'",
                            })
                        }
                    }
                }
                Ok(Condition::In(items))
            }
            "any" => {
                self.skip_ws();
                self.expect('(')?;
                let mut conditions = vec![self.condition()?];
                loop {
                    self.skip_ws();
                    match self.peek() {
                        Some(',') => {
                            self.pos += 1;
                            conditions.push(self.condition()?);
                        }
                        Some(')') => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            return Err(ConditionError::Unexpected {
                                found: c,
                                at: self.pos,
                                expected: "',' or ')'",
                            })
                        }
                        None => {
                            return Err(ConditionError::UnexpectedEnd {
                                expected: "',' or ')'",
                            })
                        }
                    }
                }
                Ok(Condition::Any(conditions))
            }
            "not" => {
                self.skip_ws();
                self.expect('(')?;
                let inner = self.condition()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Condition::Not(Box::new(inner)))
            }
            other => Err(ConditionError::UnknownFunction {
                name: other.to_string(),
            }),
        }
    }

    fn ident(&mut self) -> ConditionResult<String> {
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
                Some(c) => Err(ConditionError::Unexpected {
                    found: c,
                    at: start,
                    expected: "a condition name",
                }),
                None => Err(ConditionError::UnexpectedEnd {
                    expected: "a condition name",
                }),
            }
        } else {
            Ok(self.input[start..self.pos].to_string())
        }
    }

    /// `/.../` with `\/` escaping the delimiter.
    fn regex_literal(&mut self) -> ConditionResult<String> {
        self.skip_ws();
        self.expect('/')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('/') => {
                            out.push('/');
                            self.pos += 1;
                        }
                        Some(c) => {
                            // Everything else passes through for the regex
                            // engine to interpret.
                            out.push('\\');
                            out.push(c);
                            self.pos += c.len_utf8();
                        }
                        None => {
                            return Err(ConditionError::UnexpectedEnd {
                                expected: "an escaped character",
                            })
                        }
                    }
                }
                Some('/') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
                None => {
                    return Err(ConditionError::UnexpectedEnd {
                        expected: "closing '/'",
                    })
                }
            }
        }
    }

    /// `"..."` with `\"` and `\\` escapes.
    fn string_literal(&mut self) -> ConditionResult<String> {
        self.skip_ws();
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ ('"' | '\\')) => {
                            out.push(c);
                            self.pos += 1;
                        }
                        Some(c) => {
                            return Err(ConditionError::Unexpected {
                                found: c,
                                at: self.pos,
                                expected: "'\\\"' or '\\\\'",
                            })
                        }
                        None => {
                            return Err(ConditionError::UnexpectedEnd {
                                expected: "an escaped character",
                            })
                        }
                    }
                }
                Some('"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += c.len_utf8();
                }
                None => {
                    return Err(ConditionError::UnexpectedEnd {
                        expected: "closing '\"'",
                    })
                }
            }
        }
    }
}
