// SPDX-License-Identifier: Apache-2.0
// Quarry - Supply Chain Dependency Graph Engine
// Copyright (C) 2026 The Quarry Authors

//! # Query Parser
//!
//! Hand-written recursive descent over a whitespace-insensitive grammar:
//!
//! ```text
//! expr := term (('or' | 'and' | 'xor') term)*
//! term := ('dependencies' | 'dependents') TYPE NAME
//!       | '(' expr ')'
//! ```
//!
//! Binary operators are left-associative with equal precedence; parentheses
//! override. `TYPE` is a type tag or `*`; `NAME` is any bare token, which
//! keeps purls (`pkg:cargo/serde@1.0.0`) usable without quoting. Parse
//! failures carry the byte offset of the offending token.

use quarry_core::{GraphError, Result};

/// The reserved name a leaderboard binds to each node in turn.
pub const FOCUS_TOKEN: &str = "focus";

/// Set-algebra operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// Union.
    Or,
    /// Intersection.
    And,
    /// Symmetric difference.
    Xor,
}

/// Which closure side an atom reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reach {
    /// `all_children`: everything the named node pulls in.
    Dependencies,
    /// `all_parents`: everything that pulls the named node in.
    Dependents,
}

/// A parsed query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A closure-cache read, optionally filtered by type tag.
    Atom {
        reach: Reach,
        kind: String,
        name: String,
        /// Byte offset of the name token, for error reporting.
        position: usize,
    },
    /// Left-associative binary set operation.
    Binary {
        op: SetOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Parse a script into an expression tree.
pub fn parse(script: &str) -> Result<Expr> {
    let tokens = lex(script);
    let mut parser = Parser {
        tokens,
        cursor: 0,
        end: script.len(),
    };
    let expr = parser.expr()?;
    if let Some(tok) = parser.peek() {
        return Err(GraphError::parse(
            tok.position,
            format!("unexpected trailing token {:?}", tok.text),
        ));
    }
    Ok(expr)
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    position: usize,
}

/// Split into parens and bare words, remembering byte offsets.
fn lex(script: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (offset, ch) in script.char_indices() {
        if ch.is_whitespace() || ch == '(' || ch == ')' {
            if let Some(begin) = start.take() {
                tokens.push(Token {
                    text: &script[begin..offset],
                    position: begin,
                });
            }
            if ch == '(' || ch == ')' {
                tokens.push(Token {
                    text: &script[offset..offset + 1],
                    position: offset,
                });
            }
        } else if start.is_none() {
            start = Some(offset);
        }
    }
    if let Some(begin) = start {
        tokens.push(Token {
            text: &script[begin..],
            position: begin,
        });
    }
    tokens
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    cursor: usize,
    /// Script length, used as the position of "unexpected end" errors.
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.cursor).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let tok = self.peek();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    fn expect(&mut self, what: &str) -> Result<Token<'a>> {
        self.next()
            .ok_or_else(|| GraphError::parse(self.end, format!("expected {what}, found end of script")))
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(tok) = self.peek() {
            if tok.text == ")" {
                break;
            }
            let op = match tok.text {
                "or" => SetOp::Or,
                "and" => SetOp::And,
                "xor" => SetOp::Xor,
                other => {
                    return Err(GraphError::parse(
                        tok.position,
                        format!("expected 'or', 'and', or 'xor', found {other:?}"),
                    ))
                }
            };
            self.cursor += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let tok = self.expect("'dependencies', 'dependents', or '('")?;
        match tok.text {
            "(" => {
                let inner = self.expr()?;
                let close = self.expect("')'")?;
                if close.text != ")" {
                    return Err(GraphError::parse(
                        close.position,
                        format!("expected ')', found {:?}", close.text),
                    ));
                }
                Ok(inner)
            }
            "dependencies" | "dependents" => {
                let reach = if tok.text == "dependencies" {
                    Reach::Dependencies
                } else {
                    Reach::Dependents
                };
                let kind = self.expect("a type tag")?;
                if kind.text == "(" || kind.text == ")" {
                    return Err(GraphError::parse(
                        kind.position,
                        format!("expected a type tag, found {:?}", kind.text),
                    ));
                }
                let name = self.expect("a node name")?;
                if name.text == "(" || name.text == ")" {
                    return Err(GraphError::parse(
                        name.position,
                        format!("expected a node name, found {:?}", name.text),
                    ));
                }
                Ok(Expr::Atom {
                    reach,
                    kind: kind.text.to_string(),
                    name: name.text.to_string(),
                    position: name.position,
                })
            }
            other => Err(GraphError::parse(
                tok.position,
                format!("expected 'dependencies', 'dependents', or '(', found {other:?}"),
            )),
        }
    }
}
