//! Condition logic expressions
//!
//! A rule combines its condition results with a small boolean expression
//! that references conditions by id:
//!
//! ```text
//! Expr    := OrExpr
//! OrExpr  := AndExpr ( ("OR" | "ODER") AndExpr )*
//! AndExpr := Primary ( ("AND" | "UND") Primary )*
//! Primary := INTEGER | "(" Expr ")"
//! ```
//!
//! Keywords are matched case-insensitively in English and German. AND binds
//! tighter than OR, so `1 OR 2 AND 3` reads as `1 OR (2 AND 3)`. An empty
//! expression means "any condition matched".
//!
//! The expression is evaluated while it is parsed; no syntax tree is kept.
//! Parentheses nest at most [`MAX_NESTING`] levels deep.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// Deepest parenthesis nesting the parser accepts
pub const MAX_NESTING: usize = 64;

/// Per-condition results for one (transaction, rule) pair
pub type ConditionResults = BTreeMap<u32, bool>;

/// Boolean operator kinds of the logic grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
}

/// Keyword table, consulted case-insensitively by the tokenizer
const KEYWORDS: &[(&str, Operator)] = &[
    ("AND", Operator::And),
    ("UND", Operator::And),
    ("OR", Operator::Or),
    ("ODER", Operator::Or),
];

impl Operator {
    /// Look up an operator keyword (`and`, `UND`, `Oder`, ...)
    pub fn from_keyword(word: &str) -> Option<Self> {
        KEYWORDS
            .iter()
            .find(|(keyword, _)| keyword.eq_ignore_ascii_case(word))
            .map(|(_, op)| *op)
    }
}

/// Syntax error in a logic expression
///
/// Positions are character offsets into the expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogicError {
    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("unknown keyword '{word}' at position {position}, expected AND, OR, UND or ODER")]
    UnknownKeyword { word: String, position: usize },

    #[error("condition id '{text}' at position {position} is out of range")]
    InvalidId { text: String, position: usize },

    #[error("expected a condition id or '(' at position {position}")]
    ExpectedOperand { position: usize },

    #[error("expected AND or OR at position {position}")]
    ExpectedOperator { position: usize },

    #[error("unexpected end of expression, expected a condition id or '('")]
    UnexpectedEnd,

    #[error("'(' at position {position} is never closed")]
    UnclosedParenthesis { position: usize },

    #[error("unmatched ')' at position {position}")]
    UnmatchedParenthesis { position: usize },

    #[error("'(' at position {position} nests deeper than {} levels", MAX_NESTING)]
    TooDeep { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Id(u32),
    Open,
    Close,
    Op(Operator),
}

#[derive(Debug, Clone, Copy)]
struct Spanned {
    token: Token,
    position: usize,
}

fn tokenize(expression: &str) -> Result<Vec<Spanned>, LogicError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let token = if ch == '(' {
            i += 1;
            Token::Open
        } else if ch == ')' {
            i += 1;
            Token::Close
        } else if ch.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            match text.parse::<u32>() {
                Ok(id) => Token::Id(id),
                Err(_) => return Err(LogicError::InvalidId { text, position: start }),
            }
        } else if ch.is_alphabetic() {
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match Operator::from_keyword(&word) {
                Some(op) => Token::Op(op),
                None => return Err(LogicError::UnknownKeyword { word, position: start }),
            }
        } else {
            return Err(LogicError::UnexpectedCharacter { ch, position: start });
        };

        tokens.push(Spanned { token, position: start });
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
    results: &'a ConditionResults,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], results: &'a ConditionResults) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            results,
        }
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let spanned = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(spanned)
    }

    fn eat(&mut self, op: Operator) -> bool {
        match self.peek() {
            Some(Spanned { token: Token::Op(found), .. }) if *found == op => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    // Both sides are always parsed so that syntax errors after a decided
    // operand are still reported.
    fn parse_or(&mut self) -> Result<bool, LogicError> {
        let mut value = self.parse_and()?;
        while self.eat(Operator::Or) {
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<bool, LogicError> {
        let mut value = self.parse_primary()?;
        while self.eat(Operator::And) {
            let rhs = self.parse_primary()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_primary(&mut self) -> Result<bool, LogicError> {
        let spanned = self.next().ok_or(LogicError::UnexpectedEnd)?;
        match spanned.token {
            Token::Id(id) => Ok(self.results.get(&id).copied().unwrap_or(false)),
            Token::Open => {
                if self.depth >= MAX_NESTING {
                    return Err(LogicError::TooDeep { position: spanned.position });
                }
                self.depth += 1;
                let value = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Spanned { token: Token::Close, .. }) => Ok(value),
                    Some(other) => Err(LogicError::ExpectedOperator { position: other.position }),
                    None => Err(LogicError::UnclosedParenthesis { position: spanned.position }),
                }
            }
            Token::Close | Token::Op(_) => Err(LogicError::ExpectedOperand {
                position: spanned.position,
            }),
        }
    }

    fn finish(&self) -> Result<(), LogicError> {
        match self.peek() {
            None => Ok(()),
            Some(Spanned { token: Token::Close, position }) => {
                Err(LogicError::UnmatchedParenthesis { position: *position })
            }
            Some(Spanned { position, .. }) => Err(LogicError::ExpectedOperator {
                position: *position,
            }),
        }
    }
}

/// Evaluate a logic expression against condition results
///
/// `None`, an empty or a whitespace-only expression evaluates to the OR of
/// all results. Ids missing from `results` evaluate to `false`.
pub fn evaluate(expression: Option<&str>, results: &ConditionResults) -> Result<bool, LogicError> {
    let expression = match expression {
        Some(e) if !e.trim().is_empty() => e,
        _ => return Ok(results.values().any(|&matched| matched)),
    };

    let tokens = tokenize(expression)?;
    let mut parser = Parser::new(&tokens, results);
    let value = parser.parse_or()?;
    parser.finish()?;
    Ok(value)
}

/// Check the syntax of an expression and return the condition ids it references
pub fn referenced_ids(expression: &str) -> Result<BTreeSet<u32>, LogicError> {
    if expression.trim().is_empty() {
        return Ok(BTreeSet::new());
    }

    let tokens = tokenize(expression)?;
    let no_results = ConditionResults::new();
    let mut parser = Parser::new(&tokens, &no_results);
    parser.parse_or()?;
    parser.finish()?;

    Ok(tokens
        .iter()
        .filter_map(|spanned| match spanned.token {
            Token::Id(id) => Some(id),
            _ => None,
        })
        .collect())
}
