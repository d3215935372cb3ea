//! Parsers for pattern and template syntax.
//!
//! The grammar of each special form is itself a [`Matcher`], matched against
//! the raw definition tokens; a new form is added by adding a grammar matcher
//! and a case that builds the node from its captures.
//!
//! Forms, tried in order at each position before falling back to a literal
//! token:
//!
//! - a delimited group, contents parsed recursively
//! - `$name:kind`, a capture variable (templates: `$name`, a substitution)
//! - `$( ... ) sep? mode`, a repetition with mode `?`, `*` or `+`
//! - `$[! ... ]`, a negative lookahead (patterns only)
//! - `$[ (alt) | (alt) ... ]`, a union (patterns only)
//! - `$$`, a literal `$`
//!
//! `$>`, `$<` and `$^` stand for `Indent`, `Dedent` and `Newline` tokens, so
//! `$> ... $<` is an indentation-delimited group.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{DefinitionError, MacroError};
use crate::lexer::lex;
use crate::matcher::{
    Capture, Delimited, Match, Matcher, MatcherItem, RepeatMode, Repeater, Union, Var, VarKind,
};
use crate::token::{Delimiter, Token, TokenKind};
use crate::transcriber::{Transcriber, TranscriberItem, TranscriberRepeater};

fn sigil() -> MatcherItem {
    Token::op("$").into()
}

/// `$($name:tt)*`
fn token_trees(name: &str) -> MatcherItem {
    Repeater::new(
        Matcher::new(vec![Var::new(name, VarKind::TokenTree).into()]),
        RepeatMode::ZeroOrMore,
        None,
    )
    .into()
}

/// Builds matchers and transcribers from their token syntax
#[derive(Debug, Clone)]
pub struct SyntaxParser {
    /// Group grammar per delimiter pair
    groups: HashMap<Delimiter, Matcher>,
    var: Matcher,
    repetition: Matcher,
    lookahead: Matcher,
    union: Matcher,
    escape: Matcher,
    substitution: Matcher,
    block_sigils: Vec<(Matcher, Token)>,
}

/// Pieces of a parsed `$( ... ) sep? mode`
struct Repetition {
    size: usize,
    body: Vec<Token>,
    separator: Option<Token>,
    mode: RepeatMode,
}

impl SyntaxParser {
    pub fn new() -> Self {
        let groups = Delimiter::REGISTRY
            .iter()
            .map(|&delimiter| {
                let grammar = Matcher::new(vec![
                    Delimited::new(delimiter, Matcher::new(vec![token_trees("body")])).into(),
                ]);
                (delimiter, grammar)
            })
            .collect();

        let var = Matcher::new(vec![
            sigil(),
            Var::new("name", VarKind::Name).into(),
            Token::op(":").into(),
            Var::new("kind", VarKind::Name).into(),
        ]);

        // Any token but a mode marker can separate repetitions
        let separator = RepeatMode::ALL
            .iter()
            .map(|mode| {
                MatcherItem::NegativeLookahead(Matcher::new(vec![Token::op(mode.marker()).into()]))
            })
            .chain([Var::new("sep", VarKind::Token).into()])
            .collect();

        let repetition = Matcher::new(vec![
            sigil(),
            Delimited::new(Delimiter::PAREN, Matcher::new(vec![token_trees("body")])).into(),
            Repeater::new(separator, RepeatMode::ZeroOrOne, None).into(),
            Var::new("mode", VarKind::Op).into(),
        ]);

        let lookahead = Matcher::new(vec![
            sigil(),
            Delimited::new(
                Delimiter::BRACKET,
                Matcher::new(vec![Token::op("!").into(), token_trees("body")]),
            )
            .into(),
        ]);

        let union = Matcher::new(vec![
            sigil(),
            Delimited::new(
                Delimiter::BRACKET,
                Matcher::new(vec![
                    Repeater::new(
                        Matcher::new(vec![Var::new("alternative", VarKind::TokenTree).into()]),
                        RepeatMode::OneOrMore,
                        Some(Token::op("|")),
                    )
                    .into(),
                ]),
            )
            .into(),
        ]);

        let escape = Matcher::new(vec![sigil(), sigil()]);

        let substitution = Matcher::new(vec![sigil(), Var::new("name", VarKind::Name).into()]);

        let block_sigils = [
            (">", Token::indent()),
            ("<", Token::dedent()),
            ("^", Token::newline()),
        ]
        .into_iter()
        .map(|(marker, token)| (Matcher::new(vec![sigil(), Token::op(marker).into()]), token))
        .collect();

        Self {
            groups,
            var,
            repetition,
            lookahead,
            union,
            escape,
            substitution,
            block_sigils,
        }
    }

    /// Parse pattern syntax into a matcher
    pub fn parse_matcher(&self, tokens: &[Token]) -> Result<Matcher, DefinitionError> {
        self.matcher_items(&self.desugar(tokens))
    }

    /// Parse template syntax into a transcriber
    pub fn parse_transcriber(&self, tokens: &[Token]) -> Result<Transcriber, DefinitionError> {
        let mut items = Vec::new();
        self.transcriber_items(&self.desugar(tokens), &mut items)?;
        Ok(Transcriber::new(items))
    }

    /// Replace block sigils with the tokens they stand for, leaving `$$` intact
    fn desugar(&self, tokens: &[Token]) -> Vec<Token> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut rest = tokens;

        while let Some(first) = rest.first() {
            if let Some(escaped) = self.escape.match_prefix(rest) {
                out.extend_from_slice(&rest[..escaped.size]);
                rest = &rest[escaped.size..];
                continue;
            }

            let sigil = self
                .block_sigils
                .iter()
                .find_map(|(grammar, token)| grammar.match_prefix(rest).map(|m| (m.size, token)));
            if let Some((size, token)) = sigil {
                out.push(token.clone());
                rest = &rest[size..];
                continue;
            }

            out.push(first.clone());
            rest = &rest[1..];
        }

        out
    }

    fn matcher_items(&self, tokens: &[Token]) -> Result<Matcher, DefinitionError> {
        let mut items = Vec::new();
        let mut rest = tokens;
        while !rest.is_empty() {
            let (size, item) = self.matcher_item(rest)?;
            items.push(item);
            rest = &rest[size..];
        }
        Ok(Matcher::new(items))
    }

    fn matcher_item(&self, tokens: &[Token]) -> Result<(usize, MatcherItem), DefinitionError> {
        if let Some((size, delimiter, body)) = self.group(tokens)? {
            let inner = self.matcher_items(&body)?;
            return Ok((size, Delimited::new(delimiter, inner).into()));
        }

        if let Some(matched) = self.var.match_prefix(tokens) {
            let name = &matched.token("name")?.text;
            let kind = &matched.token("kind")?.text;
            let kind = VarKind::from_name(kind).ok_or_else(|| DefinitionError::UnknownFragmentKind {
                name: name.clone(),
                kind: kind.clone(),
            })?;
            return Ok((matched.size, Var::new(name.as_str(), kind).into()));
        }

        if let Some(repetition) = self.repetition(tokens)? {
            let inner = self.matcher_items(&repetition.body)?;
            let repeater = Repeater::new(inner, repetition.mode, repetition.separator);
            return Ok((repetition.size, repeater.into()));
        }

        if let Some(matched) = self.lookahead.match_prefix(tokens) {
            let inner = self.matcher_items(&matched.get("body")?.flatten())?;
            return Ok((matched.size, MatcherItem::NegativeLookahead(inner)));
        }

        if let Some(matched) = self.union.match_prefix(tokens) {
            let alternatives = matched
                .get("alternative")?
                .as_repeated()
                .unwrap_or_default()
                .iter()
                .map(|alternative| self.union_alternative(alternative))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok((matched.size, Union::new(alternatives)?.into()));
        }

        if let Some(matched) = self.escape.match_prefix(tokens) {
            return Ok((matched.size, Token::op("$").into()));
        }

        self.reject_dangling_sigil(tokens, true)?;
        Ok((1, tokens[0].clone().into()))
    }

    fn union_alternative(&self, alternative: &Capture) -> Result<Matcher, DefinitionError> {
        let tokens = alternative.flatten();
        match tokens.as_slice() {
            [open, inner @ .., close] if open.is_op("(") && close.is_op(")") => {
                self.matcher_items(inner)
            }
            _ => Err(DefinitionError::MalformedUnion),
        }
    }

    fn transcriber_items(
        &self,
        tokens: &[Token],
        items: &mut Vec<TranscriberItem>,
    ) -> Result<(), DefinitionError> {
        let mut rest = tokens;

        while !rest.is_empty() {
            if let Some((size, _, body)) = self.group(rest)? {
                items.push(rest[0].clone().into());
                self.transcriber_items(&body, items)?;
                items.push(rest[size - 1].clone().into());
                rest = &rest[size..];
                continue;
            }

            if let Some(matched) = self.substitution.match_prefix(rest) {
                let name = matched.token("name")?.text.clone();
                items.push(TranscriberItem::Substitution(name));
                rest = &rest[matched.size..];
                continue;
            }

            if let Some(repetition) = self.repetition(rest)? {
                let mut inner = Vec::new();
                self.transcriber_items(&repetition.body, &mut inner)?;
                items.push(TranscriberItem::Repeater(TranscriberRepeater::new(
                    Transcriber::new(inner),
                    repetition.separator,
                )));
                rest = &rest[repetition.size..];
                continue;
            }

            if let Some(matched) = self.escape.match_prefix(rest) {
                items.push(Token::op("$").into());
                rest = &rest[matched.size..];
                continue;
            }

            self.reject_dangling_sigil(rest, false)?;
            items.push(rest[0].clone().into());
            rest = &rest[1..];
        }

        Ok(())
    }

    /// A delimited group at the start of `tokens`, with its contents
    fn group(
        &self,
        tokens: &[Token],
    ) -> Result<Option<(usize, Delimiter, Vec<Token>)>, DefinitionError> {
        let Some(first) = tokens.first() else {
            return Ok(None);
        };
        let Some(delimiter) = Delimiter::from_token(first) else {
            return Ok(None);
        };

        let matched = self
            .groups
            .get(&delimiter)
            .and_then(|grammar| grammar.match_prefix(tokens))
            .ok_or_else(|| DefinitionError::UnterminatedDelimiter {
                opener: first.clone(),
            })?;

        Ok(Some((matched.size, delimiter, matched.get("body")?.flatten())))
    }

    fn repetition(&self, tokens: &[Token]) -> Result<Option<Repetition>, DefinitionError> {
        let Some(matched) = self.repetition.match_prefix(tokens) else {
            return Ok(None);
        };
        let Some(mode) = RepeatMode::from_marker(&matched.token("mode")?.text) else {
            return Ok(None);
        };

        Ok(Some(Repetition {
            size: matched.size,
            body: matched.get("body")?.flatten(),
            separator: separator(&matched)?,
            mode,
        }))
    }

    /// A `$` that starts something no form accepted is a definition bug,
    /// except where it is simply followed by an unrelated token.
    fn reject_dangling_sigil(&self, tokens: &[Token], pattern: bool) -> Result<(), DefinitionError> {
        let [first, next, ..] = tokens else {
            return Ok(());
        };
        if !first.is_op("$") {
            return Ok(());
        }

        if next.is_op("(") {
            return Err(DefinitionError::MalformedRepetition);
        }
        if pattern && next.is_op("[") {
            return Err(DefinitionError::MalformedUnion);
        }
        if pattern && next.kind == TokenKind::Name {
            return Err(DefinitionError::MissingFragmentKind {
                name: next.text.clone(),
            });
        }
        Ok(())
    }
}

impl Default for SyntaxParser {
    fn default() -> Self {
        Self::new()
    }
}

fn separator(matched: &Match) -> Result<Option<Token>, DefinitionError> {
    Ok(matched
        .get("sep")?
        .as_repeated()
        .and_then(<[Capture]>::first)
        .and_then(Capture::as_token)
        .cloned())
}

impl FromStr for Matcher {
    type Err = MacroError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let tokens = lex(source)?;
        Ok(SyntaxParser::new().parse_matcher(&tokens)?)
    }
}

impl FromStr for Transcriber {
    type Err = MacroError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let tokens = lex(source)?;
        Ok(SyntaxParser::new().parse_transcriber(&tokens)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn matcher(source: &str) -> Matcher {
        source.parse().unwrap()
    }

    fn matcher_err(source: &str) -> DefinitionError {
        match source.parse::<Matcher>() {
            Err(MacroError::Definition(err)) => err,
            other => panic!("expected definition error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            matcher("$x:name").items(),
            &[MatcherItem::Var(Var::new("x", VarKind::Name))]
        );
        assert_eq!(
            matcher("$body:tt").items(),
            &[MatcherItem::Var(Var::new("body", VarKind::TokenTree))]
        );
    }

    #[test]
    fn test_parse_literals_and_group() {
        let parsed = matcher("f ( $a:number , [ x ] )");
        assert_eq!(parsed.items().len(), 2);
        assert_eq!(parsed.items()[0], MatcherItem::Token(Token::name("f")));

        let MatcherItem::Delimited(group) = &parsed.items()[1] else {
            panic!("expected a delimited group");
        };
        assert_eq!(group.delimiter, Delimiter::PAREN);
        assert_eq!(group.matcher.items().len(), 3);
        assert!(matches!(group.matcher.items()[2], MatcherItem::Delimited(_)));
    }

    #[test]
    fn test_parse_repetitions() {
        let parsed = matcher("$($x:name),* $($y:number)+ $($z:tt);?");
        let modes: Vec<(RepeatMode, Option<Token>)> = parsed
            .items()
            .iter()
            .map(|item| match item {
                MatcherItem::Repeater(repeater) => (repeater.mode(), repeater.separator().cloned()),
                other => panic!("expected repeater, got {other:?}"),
            })
            .collect();
        assert_eq!(
            modes,
            vec![
                (RepeatMode::ZeroOrMore, Some(Token::op(","))),
                (RepeatMode::OneOrMore, None),
                (RepeatMode::ZeroOrOne, Some(Token::op(";"))),
            ]
        );
    }

    #[test]
    fn test_parse_union_and_lookahead() {
        let parsed = matcher("$[ ($x:name) | (- $x:number) ] $[! end]");
        let MatcherItem::Union(union) = &parsed.items()[0] else {
            panic!("expected a union");
        };
        assert_eq!(union.alternatives().len(), 2);
        assert_eq!(
            parsed.items()[1],
            MatcherItem::NegativeLookahead(Matcher::new(vec![Token::name("end").into()]))
        );
    }

    #[test]
    fn test_parse_union_shape_mismatch() {
        assert_eq!(
            matcher_err("$[ ($x:name) | ($y:name) ]"),
            DefinitionError::UnionShapeMismatch
        );
        assert_eq!(
            matcher_err("$[ ($x:name) | ($($x:name)*) ]"),
            DefinitionError::UnionShapeMismatch
        );
        assert_eq!(matcher_err("$[ x | y ]"), DefinitionError::MalformedUnion);
    }

    #[test]
    fn test_parse_escape_and_block_sigils() {
        assert_eq!(matcher("$$").items(), &[MatcherItem::Token(Token::op("$"))]);
        assert_eq!(
            matcher("$$ x").items(),
            &[
                MatcherItem::Token(Token::op("$")),
                MatcherItem::Token(Token::name("x"))
            ]
        );
        assert_eq!(matcher("$^").items(), &[MatcherItem::Token(Token::newline())]);

        let parsed = matcher("a: $> $($body:tt)* $<");
        let MatcherItem::Delimited(block) = &parsed.items()[2] else {
            panic!("expected an indented block");
        };
        assert_eq!(block.delimiter, Delimiter::BLOCK);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            matcher_err("$x:widget"),
            DefinitionError::UnknownFragmentKind {
                name: "x".to_owned(),
                kind: "widget".to_owned()
            }
        );
        assert_eq!(
            matcher_err("$x"),
            DefinitionError::MissingFragmentKind { name: "x".to_owned() }
        );
        assert_eq!(matcher_err("$($x:name) foo"), DefinitionError::MalformedRepetition);
        assert_eq!(
            matcher_err("( $x:name"),
            DefinitionError::UnterminatedDelimiter {
                opener: Token::op("(")
            }
        );
    }

    #[test]
    fn test_parsed_matchers_hash_structurally() {
        let set: HashSet<Matcher> = [matcher("$($x:name),*"), matcher("$( $x:name ) , *")]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_parse_transcriber() {
        let parsed: Transcriber = "[$($x),*] $$ $y".parse().unwrap();
        assert_eq!(
            parsed.items(),
            &[
                TranscriberItem::Token(Token::op("[")),
                TranscriberItem::Repeater(TranscriberRepeater::new(
                    Transcriber::new(vec![TranscriberItem::Substitution("x".to_owned())]),
                    Some(Token::op(",")),
                )),
                TranscriberItem::Token(Token::op("]")),
                TranscriberItem::Token(Token::op("$")),
                TranscriberItem::Substitution("y".to_owned()),
            ]
        );
    }

    #[test]
    fn test_parse_transcriber_block_sigils() {
        let parsed: Transcriber = "a: $> b $^ c $<".parse().unwrap();
        let tokens: Vec<Token> = parsed
            .items()
            .iter()
            .map(|item| match item {
                TranscriberItem::Token(token) => token.clone(),
                other => panic!("expected literal, got {other:?}"),
            })
            .collect();
        assert_eq!(
            tokens,
            vec![
                Token::name("a"),
                Token::op(":"),
                Token::indent(),
                Token::name("b"),
                Token::newline(),
                Token::name("c"),
                Token::dedent(),
            ]
        );
    }

    #[test]
    fn test_parse_transcriber_errors() {
        assert!(matches!(
            "(x".parse::<Transcriber>(),
            Err(MacroError::Definition(DefinitionError::UnterminatedDelimiter { .. }))
        ));
        assert!(matches!(
            "$($x) y".parse::<Transcriber>(),
            Err(MacroError::Definition(DefinitionError::MalformedRepetition))
        ));
    }
}
