//! Rendering of token sequences back to source text.

use crate::token::{Token, TokenKind};

const INDENT: &str = "    ";

/// Render a token sequence as source text.
///
/// Spacing follows ordinary source conventions; `Newline`, `Indent` and
/// `Dedent` start a new line at the current block depth. Lexing the output
/// yields the same tokens again.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut level = 0usize;
    let mut prev: Option<&Token> = None;

    for token in tokens {
        match token.kind {
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent => {
                match token.kind {
                    TokenKind::Indent => level += 1,
                    TokenKind::Dedent => level = level.saturating_sub(1),
                    _ => {}
                }
                // Consecutive line breaks share one line
                if prev.is_none() {
                    out.truncate(out.rfind('\n').map_or(0, |i| i + 1));
                } else {
                    out.push('\n');
                }
                out.push_str(&INDENT.repeat(level));
                prev = None;
            }
            _ => {
                if let Some(prev) = prev {
                    if needs_space(prev, token) {
                        out.push(' ');
                    }
                }
                out.push_str(&token.text);
                prev = Some(token);
            }
        }
    }

    out
}

fn needs_space(prev: &Token, next: &Token) -> bool {
    if prev.kind == TokenKind::InterpolationStart || next.kind == TokenKind::InterpolationEnd {
        return false;
    }
    if prev.kind == TokenKind::Op {
        if matches!(prev.text.as_str(), "(" | "[" | "{" | "." | "$") {
            return false;
        }
        if prev.text == "!" && next.kind == TokenKind::Op {
            return !matches!(next.text.as_str(), "(" | "[" | "{" | ":");
        }
    }
    if next.kind == TokenKind::Op {
        match next.text.as_str() {
            ")" | "]" | "}" | "," | ":" | ";" | "." => return false,
            "(" | "[" | "!" => {
                let callee = prev.kind == TokenKind::Name
                    || prev.is_op(")")
                    || prev.is_op("]")
                    || prev.kind == TokenKind::String;
                return !callee;
            }
            _ => {}
        }
    }
    true
}
