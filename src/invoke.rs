//! Rewriters that recognise macro invocations and `macro_rules!` definitions
//! in a token stream.
//!
//! Both are driven by ordinary patterns, so a host can spell invocations
//! differently by supplying its own matcher with the required captures.

use crate::error::{DefinitionError, MacroError};
use crate::matcher::{Match, Matcher};
use crate::processor::{ExpansionContext, Rewrite, Rewriter};
use crate::rules::{MacroRule, MacroRules};
use crate::syntax::SyntaxParser;
use crate::token::Token;

/// `name!(...)`, `name![...]` or `name!{...}`
pub const FUNCTION_STYLE: &str =
    "$name:name ! $[ (($($body:tt)*)) | ([$($body:tt)*]) | ({$($body:tt)*}) ]";

/// `name!:` followed by an indented block
pub const BLOCK_STYLE: &str = "$name:name !: $> $($body:tt)* $<";

pub const MACRO_RULES: &str = "macro_rules! $name:name: $> $($rules:tt)+ $<";

/// Body of a `macro_rules!` block: `[pattern]: template` per rule, where the
/// template is either the rest of the line or an indented block
pub const MACRO_RULES_BODY: &str = "$( [$($matcher:tt)*]: $[ ($> $($transcriber:tt)* $<) | ($($[!$^] $transcriber:tt)* $($^)?) ] )+";

fn require_captures(matcher: &Matcher, names: &[&str]) -> Result<(), DefinitionError> {
    let shape = matcher.shape();
    match names.iter().find(|name| !shape.contains_key(**name)) {
        Some(name) => Err(DefinitionError::MissingCapture {
            name: (*name).to_owned(),
        }),
        None => Ok(()),
    }
}

/// Expands invocations matched by a pattern capturing `name` and `body`
#[derive(Debug, Clone)]
pub struct Invoker {
    matcher: Matcher,
    /// Appended after every expansion
    suffix: Vec<Token>,
}

impl Invoker {
    pub fn new(matcher: Matcher, suffix: Vec<Token>) -> Result<Self, DefinitionError> {
        require_captures(&matcher, &["name", "body"])?;
        Ok(Self { matcher, suffix })
    }

    pub fn function_style() -> Result<Self, MacroError> {
        Ok(Self::new(FUNCTION_STYLE.parse()?, Vec::new())?)
    }

    /// Block invocations end their line, so the expansion is followed by a newline
    pub fn block_style() -> Result<Self, MacroError> {
        Ok(Self::new(BLOCK_STYLE.parse()?, vec![Token::newline()])?)
    }
}

impl Rewriter for Invoker {
    fn rewrite(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Rewrite>, MacroError> {
        let Some(matched) = self.matcher.match_prefix(tokens) else {
            return Ok(None);
        };

        let name = &matched.token("name")?.text;
        let body = matched.get("body")?.flatten();
        let mut output = ctx.registry.invoke(name, &body)?;
        output.extend_from_slice(&self.suffix);

        Ok(Some(Rewrite {
            consumed: matched.size,
            output,
        }))
    }
}

/// Registers rule sets from definitions and removes the definitions from the
/// stream
#[derive(Debug, Clone)]
pub struct Definer {
    /// Captures `name` and `rules`
    matcher: Matcher,
    /// Must fully match the `rules` tokens, capturing `matcher` and
    /// `transcriber` once per rule
    body: Matcher,
    parser: SyntaxParser,
}

impl Definer {
    pub fn new(matcher: Matcher, body: Matcher) -> Result<Self, DefinitionError> {
        require_captures(&matcher, &["name", "rules"])?;
        require_captures(&body, &["matcher", "transcriber"])?;
        Ok(Self {
            matcher,
            body,
            parser: SyntaxParser::new(),
        })
    }

    /// `macro_rules!` definitions
    pub fn standard() -> Result<Self, MacroError> {
        Ok(Self::new(MACRO_RULES.parse()?, MACRO_RULES_BODY.parse()?)?)
    }

    fn parse_rules(&self, name: &str, tokens: &[Token]) -> Result<MacroRules, DefinitionError> {
        let malformed = || DefinitionError::MalformedRules {
            name: name.to_owned(),
        };

        let body: Match = self.body.full_match(tokens).ok_or_else(malformed)?;
        let matchers = body.get("matcher")?.as_repeated().ok_or_else(malformed)?;
        let transcribers = body.get("transcriber")?.as_repeated().ok_or_else(malformed)?;

        matchers
            .iter()
            .zip(transcribers)
            .map(|(matcher, transcriber)| -> Result<MacroRule, DefinitionError> {
                Ok(MacroRule::new(
                    self.parser.parse_matcher(&matcher.flatten())?,
                    self.parser.parse_transcriber(&transcriber.flatten())?,
                ))
            })
            .collect()
    }
}

impl Rewriter for Definer {
    fn rewrite(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Rewrite>, MacroError> {
        let Some(matched) = self.matcher.match_prefix(tokens) else {
            return Ok(None);
        };

        let name = matched.token("name")?.text.clone();
        let rules = self.parse_rules(&name, &matched.get("rules")?.flatten())?;
        tracing::debug!(name = %name, rules = rules.rules().len(), "defined macro");
        ctx.registry.define(name, rules);

        Ok(Some(Rewrite {
            consumed: matched.size,
            output: Vec::new(),
        }))
    }
}
