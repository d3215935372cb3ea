use crate::error::{MacroError, TranscriptionError};
use crate::lexer::lex;
use crate::matcher::Matcher;
use crate::render::render;
use crate::syntax::SyntaxParser;
use crate::token::Token;
use crate::transcriber::Transcriber;

/// Transforms a whole token sequence
pub trait Macro {
    /// Transform `tokens`, or return `None` if they do not fit this macro
    fn apply(&self, tokens: &[Token]) -> Result<Option<Vec<Token>>, TranscriptionError>;
}

/// A pattern and the template it expands to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacroRule {
    pub matcher: Matcher,
    pub transcriber: Transcriber,
}

impl MacroRule {
    pub fn new(matcher: Matcher, transcriber: Transcriber) -> Self {
        Self {
            matcher,
            transcriber,
        }
    }

    /// Build a rule from pattern and template source text
    pub fn parse(pattern: &str, template: &str) -> Result<Self, MacroError> {
        let parser = SyntaxParser::new();
        Ok(Self {
            matcher: parser.parse_matcher(&lex(pattern)?)?,
            transcriber: parser.parse_transcriber(&lex(template)?)?,
        })
    }
}

/// Ordered rules forming one macro; the first rule that matches wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MacroRules {
    rules: Vec<MacroRule>,
}

impl MacroRules {
    pub fn new(rules: Vec<MacroRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MacroRule] {
        &self.rules
    }

    /// Expand a prefix of `tokens` with the first rule whose pattern matches it.
    ///
    /// Returns the number of tokens consumed with the expansion. Rules that
    /// would consume nothing are skipped.
    pub fn apply_prefix(
        &self,
        tokens: &[Token],
    ) -> Result<Option<(usize, Vec<Token>)>, TranscriptionError> {
        for rule in &self.rules {
            if let Some(matched) = rule.matcher.match_prefix(tokens) {
                if matched.size > 0 {
                    let output = rule.transcriber.transcribe(&matched)?;
                    return Ok(Some((matched.size, output)));
                }
            }
        }
        Ok(None)
    }
}

impl Macro for MacroRules {
    fn apply(&self, tokens: &[Token]) -> Result<Option<Vec<Token>>, TranscriptionError> {
        for rule in &self.rules {
            if let Some(matched) = rule.matcher.full_match(tokens) {
                return rule.transcriber.transcribe(&matched).map(Some);
            }
        }
        Ok(None)
    }
}

impl FromIterator<MacroRule> for MacroRules {
    fn from_iter<I: IntoIterator<Item = MacroRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Renders its arguments into a single string token
#[derive(Debug, Clone, Copy, Default)]
pub struct Stringify;

impl Macro for Stringify {
    fn apply(&self, tokens: &[Token]) -> Result<Option<Vec<Token>>, TranscriptionError> {
        Ok(Some(vec![Token::string(format!("{:?}", render(tokens)))]))
    }
}

/// Logs its rendered arguments and expands to nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLog;

impl Macro for DebugLog {
    fn apply(&self, tokens: &[Token]) -> Result<Option<Vec<Token>>, TranscriptionError> {
        tracing::info!(target: "tokrules::debug", "{}", render(tokens));
        Ok(Some(Vec::new()))
    }
}
