//! Pattern trees and the matching algorithm.
//!
//! A [`Matcher`] is an ordered sequence of [`MatcherItem`]s. Matching is
//! greedy and never backtracks: each item is tried once against the remaining
//! input, and if a later item fails the whole attempt fails even when an
//! earlier item could have consumed differently. Ordinary non-matches are
//! reported as `None`.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::DefinitionError;
use crate::token::{Delimiter, Token, TokenKind, TokenTree, tree_len};

/// Value bound to a capture variable.
///
/// Nesting of `Repeated` equals the number of repeaters enclosing the variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Token(Token),
    Tree(TokenTree),
    Repeated(Vec<Capture>),
}

impl Capture {
    /// Every token under this capture, in order
    pub fn flatten(&self) -> Vec<Token> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<Token>) {
        match self {
            Capture::Token(token) => out.push(token.clone()),
            Capture::Tree(tree) => out.extend_from_slice(tree),
            Capture::Repeated(items) => items.iter().for_each(|item| item.flatten_into(out)),
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Capture::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn as_repeated(&self) -> Option<&[Capture]> {
        match self {
            Capture::Repeated(items) => Some(items),
            _ => None,
        }
    }
}

pub type Captures = BTreeMap<String, Capture>;

/// Variable name to repetition depth
pub type Shape = BTreeMap<String, usize>;

/// Result of a successful match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Number of tokens consumed
    pub size: usize,
    pub captures: Captures,
}

impl Match {
    fn bare(size: usize) -> Self {
        Self {
            size,
            captures: Captures::new(),
        }
    }

    fn single(size: usize, name: &str, capture: Capture) -> Self {
        Self {
            size,
            captures: Captures::from([(name.to_owned(), capture)]),
        }
    }

    /// The capture bound to `name`, which the pattern is required to bind
    pub fn get(&self, name: &str) -> Result<&Capture, DefinitionError> {
        self.captures
            .get(name)
            .ok_or_else(|| DefinitionError::MissingCapture {
                name: name.to_owned(),
            })
    }

    /// The single token bound to `name`
    pub fn token(&self, name: &str) -> Result<&Token, DefinitionError> {
        self.get(name)?
            .as_token()
            .ok_or_else(|| DefinitionError::MissingCapture {
                name: name.to_owned(),
            })
    }
}

/// A pattern: a sequence of items matched one after another
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Matcher {
    items: Vec<MatcherItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MatcherItem {
    /// A token that must appear verbatim
    Token(Token),
    Delimited(Delimited),
    Var(Var),
    Repeater(Repeater),
    Union(Union),
    /// Matches nothing, and only where the inner pattern fails
    NegativeLookahead(Matcher),
}

impl Matcher {
    pub fn new(items: Vec<MatcherItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[MatcherItem] {
        &self.items
    }

    /// Match a prefix of `tokens`
    pub fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        let mut rest = tokens;
        let mut captures = Captures::new();

        for item in &self.items {
            let matched = item.match_prefix(rest)?;
            rest = &rest[matched.size..];
            captures.extend(matched.captures);
        }

        Some(Match {
            size: tokens.len() - rest.len(),
            captures,
        })
    }

    /// Match the whole of `tokens`
    pub fn full_match(&self, tokens: &[Token]) -> Option<Match> {
        self.match_prefix(tokens)
            .filter(|matched| matched.size == tokens.len())
    }

    /// The variables this pattern binds and their repetition depths
    pub fn shape(&self) -> Shape {
        let mut shape = Shape::new();
        self.collect_shape(0, &mut shape);
        shape
    }

    fn collect_shape(&self, depth: usize, shape: &mut Shape) {
        for item in &self.items {
            match item {
                MatcherItem::Token(_) | MatcherItem::NegativeLookahead(_) => {}
                MatcherItem::Delimited(delimited) => delimited.matcher.collect_shape(depth, shape),
                MatcherItem::Var(var) => {
                    shape.insert(var.name.clone(), depth);
                }
                MatcherItem::Repeater(repeater) => {
                    repeater.matcher.collect_shape(depth + 1, shape)
                }
                MatcherItem::Union(union) => {
                    // Alternatives share one shape
                    if let Some(first) = union.alternatives.first() {
                        first.collect_shape(depth, shape);
                    }
                }
            }
        }
    }
}

impl FromIterator<MatcherItem> for Matcher {
    fn from_iter<I: IntoIterator<Item = MatcherItem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl MatcherItem {
    pub fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        match self {
            MatcherItem::Token(expected) => {
                (tokens.first()? == expected).then(|| Match::bare(1))
            }
            MatcherItem::Delimited(delimited) => delimited.match_prefix(tokens),
            MatcherItem::Var(var) => var.match_prefix(tokens),
            MatcherItem::Repeater(repeater) => repeater.match_prefix(tokens),
            MatcherItem::Union(union) => union.match_prefix(tokens),
            MatcherItem::NegativeLookahead(matcher) => match matcher.match_prefix(tokens) {
                Some(_) => None,
                None => Some(Match::bare(0)),
            },
        }
    }
}

impl From<Token> for MatcherItem {
    fn from(token: Token) -> Self {
        MatcherItem::Token(token)
    }
}

impl From<Delimited> for MatcherItem {
    fn from(delimited: Delimited) -> Self {
        MatcherItem::Delimited(delimited)
    }
}

impl From<Var> for MatcherItem {
    fn from(var: Var) -> Self {
        MatcherItem::Var(var)
    }
}

impl From<Repeater> for MatcherItem {
    fn from(repeater: Repeater) -> Self {
        MatcherItem::Repeater(repeater)
    }
}

impl From<Union> for MatcherItem {
    fn from(union: Union) -> Self {
        MatcherItem::Union(union)
    }
}

/// A sub-pattern enclosed in one delimiter pair.
///
/// The inner pattern must consume everything between the opener and its
/// matching close.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Delimited {
    pub delimiter: Delimiter,
    pub matcher: Matcher,
}

impl Delimited {
    pub fn new(delimiter: Delimiter, matcher: Matcher) -> Self {
        Self { delimiter, matcher }
    }

    fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        let (first, rest) = tokens.split_first()?;
        if !self.delimiter.matches_open(first) {
            return None;
        }

        let close = self.delimiter.find_close(rest)?;
        let inner = self.matcher.full_match(&rest[..close])?;

        Some(Match {
            size: inner.size + 2,
            captures: inner.captures,
        })
    }
}

/// What a capture variable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Any single token
    Token,
    Name,
    Op,
    Number,
    String,
    /// One token, or a whole delimited group
    TokenTree,
    /// Always matches, consuming nothing
    Empty,
}

impl VarKind {
    /// Look up a kind by its pattern spelling
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "token" => VarKind::Token,
            "name" => VarKind::Name,
            "op" => VarKind::Op,
            "number" => VarKind::Number,
            "string" => VarKind::String,
            "tt" => VarKind::TokenTree,
            "empty" => VarKind::Empty,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VarKind::Token => "token",
            VarKind::Name => "name",
            VarKind::Op => "op",
            VarKind::Number => "number",
            VarKind::String => "string",
            VarKind::TokenTree => "tt",
            VarKind::Empty => "empty",
        }
    }

    fn token_kind(&self) -> Option<TokenKind> {
        match self {
            VarKind::Name => Some(TokenKind::Name),
            VarKind::Op => Some(TokenKind::Op),
            VarKind::Number => Some(TokenKind::Number),
            VarKind::String => Some(TokenKind::String),
            _ => None,
        }
    }
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named capture variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    pub name: String,
    pub kind: VarKind,
}

impl Var {
    pub fn new(name: impl Into<String>, kind: VarKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        match self.kind {
            VarKind::Empty => Some(Match::single(
                0,
                &self.name,
                Capture::Tree(TokenTree::default()),
            )),
            VarKind::TokenTree => {
                let len = tree_len(tokens)?;
                let tree = TokenTree::new(tokens[..len].to_vec());
                Some(Match::single(len, &self.name, Capture::Tree(tree)))
            }
            VarKind::Token => {
                let token = tokens.first()?;
                Some(Match::single(1, &self.name, Capture::Token(token.clone())))
            }
            VarKind::Name | VarKind::Op | VarKind::Number | VarKind::String => {
                let token = tokens.first()?;
                if Some(token.kind) != self.kind.token_kind() || Delimiter::from_token(token).is_some()
                {
                    return None;
                }
                Some(Match::single(1, &self.name, Capture::Token(token.clone())))
            }
        }
    }
}

/// How many times a repeater may match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatMode {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl RepeatMode {
    /// Look up a mode by its marker: `?`, `*` or `+`
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "?" => Some(RepeatMode::ZeroOrOne),
            "*" => Some(RepeatMode::ZeroOrMore),
            "+" => Some(RepeatMode::OneOrMore),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            RepeatMode::ZeroOrOne => "?",
            RepeatMode::ZeroOrMore => "*",
            RepeatMode::OneOrMore => "+",
        }
    }

    pub const ALL: [RepeatMode; 3] = [
        RepeatMode::ZeroOrOne,
        RepeatMode::ZeroOrMore,
        RepeatMode::OneOrMore,
    ];
}

/// A repeated sub-pattern, optionally separated.
///
/// Every variable of the sub-pattern is bound to a list with one entry per
/// repetition, so zero repetitions still bind each name, to an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repeater {
    matcher: Matcher,
    mode: RepeatMode,
    separator: Option<Token>,
    /// Variables bound by `matcher`, computed once
    names: Vec<String>,
}

impl Repeater {
    pub fn new(matcher: Matcher, mode: RepeatMode, separator: Option<Token>) -> Self {
        let names = matcher.shape().into_keys().collect();
        Self {
            matcher,
            mode,
            separator,
            names,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn mode(&self) -> RepeatMode {
        self.mode
    }

    pub fn separator(&self) -> Option<&Token> {
        self.separator.as_ref()
    }

    /// Names bound to a list by every match, even one of zero repetitions
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        let mut rest = tokens;
        let mut lists: BTreeMap<String, Vec<Capture>> = BTreeMap::new();
        let mut count = 0usize;

        loop {
            let mut attempt = rest;
            if count > 0 {
                if let Some(separator) = &self.separator {
                    match attempt.split_first() {
                        Some((first, after)) if first == separator => attempt = after,
                        _ => break,
                    }
                }
            }

            let Some(matched) = self.matcher.match_prefix(attempt) else {
                if count == 0 && self.mode == RepeatMode::OneOrMore {
                    return None;
                }
                // A separator already consumed stays consumed
                rest = attempt;
                break;
            };

            let progressed = attempt.len() - matched.size < rest.len();
            rest = &attempt[matched.size..];
            for (name, capture) in matched.captures {
                lists.entry(name).or_default().push(capture);
            }
            count += 1;

            if self.mode == RepeatMode::ZeroOrOne || !progressed {
                break;
            }
        }

        for name in &self.names {
            if !lists.contains_key(name) {
                lists.insert(name.clone(), Vec::new());
            }
        }

        Some(Match {
            size: tokens.len() - rest.len(),
            captures: lists
                .into_iter()
                .map(|(name, list)| (name, Capture::Repeated(list)))
                .collect(),
        })
    }
}

/// Ordered alternatives; the first that matches wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Union {
    alternatives: Vec<Matcher>,
}

impl Union {
    /// Build a union, rejecting alternatives that bind different variables or
    /// bind them at different repetition depths.
    pub fn new(alternatives: Vec<Matcher>) -> Result<Self, DefinitionError> {
        let (first, others) = alternatives
            .split_first()
            .ok_or(DefinitionError::EmptyUnion)?;

        let shape = first.shape();
        if others.iter().any(|alternative| alternative.shape() != shape) {
            return Err(DefinitionError::UnionShapeMismatch);
        }

        Ok(Self { alternatives })
    }

    pub fn alternatives(&self) -> &[Matcher] {
        &self.alternatives
    }

    fn match_prefix(&self, tokens: &[Token]) -> Option<Match> {
        self.alternatives
            .iter()
            .find_map(|alternative| alternative.match_prefix(tokens))
    }
}
