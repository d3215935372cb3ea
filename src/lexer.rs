use pest::{Parser, iterators::Pair};
use pest_derive::Parser;

use crate::error::LexError;
use crate::token::{Token, TokenKind};

#[derive(Parser)]
#[grammar = "src/tokens.pest"]
pub struct TokenParser;

impl TokenParser {
    /// Lex the content of one physical line, without its terminator
    pub fn lex_line(content: &str, line: usize) -> Result<Vec<Token>, LexError> {
        let mut pairs = TokenParser::parse(Rule::line, content).map_err(|e| LexError::Syntax {
            line,
            message: e.variant.message().into_owned(),
        })?;

        let Some(line_pair) = pairs.next() else {
            return Ok(Vec::new());
        };

        Ok(line_pair
            .into_inner()
            .filter_map(Self::parse_token)
            .collect())
    }

    fn parse_token(pair: Pair<Rule>) -> Option<Token> {
        let kind = match pair.as_rule() {
            Rule::name => TokenKind::Name,
            Rule::number => TokenKind::Number,
            Rule::string => TokenKind::String,
            Rule::op => TokenKind::Op,
            _ => return None,
        };
        Some(Token::new(kind, pair.as_str()))
    }
}

/// Lex source text into a token sequence.
///
/// Blank and comment-only lines are skipped and lines inside brackets are
/// joined. A change of leading whitespace produces `Indent`/`Dedent`, which
/// replace the `Newline` that would otherwise end the previous line. No
/// `Newline` is emitted after the last line.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut indents: Vec<usize> = vec![0];
    let mut bracket_depth = 0usize;
    let mut pending_newline = false;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let content = raw.trim_start_matches([' ', '\t']);
        let width = raw.len() - content.len();

        let line_tokens = TokenParser::lex_line(content, line)?;
        if line_tokens.is_empty() {
            continue;
        }

        if bracket_depth == 0 {
            let current = indents.last().copied().unwrap_or(0);
            if width > current {
                indents.push(width);
                tokens.push(Token::indent());
            } else if width < current {
                while indents.last().is_some_and(|&level| level > width) {
                    indents.pop();
                    tokens.push(Token::dedent());
                }
                if indents.last() != Some(&width) {
                    return Err(LexError::InconsistentDedent { line });
                }
            } else if pending_newline {
                tokens.push(Token::newline());
            }
            pending_newline = false;
        }

        for token in line_tokens {
            if token.kind == TokenKind::Op {
                match token.text.as_str() {
                    "(" | "[" | "{" => bracket_depth += 1,
                    ")" | "]" | "}" => bracket_depth = bracket_depth.saturating_sub(1),
                    _ => {}
                }
            }
            tokens.push(token);
        }

        if bracket_depth == 0 {
            pending_newline = true;
        }
    }

    tokens.extend(std::iter::repeat_n(Token::dedent(), indents.len() - 1));
    Ok(tokens)
}
