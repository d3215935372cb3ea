use std::fmt;
use std::ops::Deref;

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    /// Identifier or keyword
    Name,
    /// Operator or punctuation, including brackets
    Op,
    /// Numeric literal
    Number,
    /// Quoted string literal
    String,
    /// End of a logical line
    Newline,
    /// Start of an indented block
    Indent,
    /// End of an indented block
    Dedent,
    /// Start of an interpolated string
    InterpolationStart,
    /// End of an interpolated string
    InterpolationEnd,
}

/// An immutable lexical unit: a category plus its literal text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn name(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Name, text)
    }

    pub fn op(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Op, text)
    }

    pub fn number(text: impl Into<String>) -> Self {
        Self::new(TokenKind::Number, text)
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::new(TokenKind::String, text)
    }

    pub fn newline() -> Self {
        Self::new(TokenKind::Newline, "\n")
    }

    pub fn indent() -> Self {
        Self::new(TokenKind::Indent, "")
    }

    pub fn dedent() -> Self {
        Self::new(TokenKind::Dedent, "")
    }

    /// Whether this token is `Op` with exactly the given text
    pub fn is_op(&self, text: &str) -> bool {
        self.kind == TokenKind::Op && self.text == text
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A balanced open/close token pair.
///
/// When `open_text`/`close_text` is `None` only the kind is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delimiter {
    pub open_kind: TokenKind,
    pub open_text: Option<&'static str>,
    pub close_kind: TokenKind,
    pub close_text: Option<&'static str>,
}

impl Delimiter {
    pub const PAREN: Delimiter = Delimiter::exact(TokenKind::Op, "(", TokenKind::Op, ")");
    pub const BRACKET: Delimiter = Delimiter::exact(TokenKind::Op, "[", TokenKind::Op, "]");
    pub const BRACE: Delimiter = Delimiter::exact(TokenKind::Op, "{", TokenKind::Op, "}");
    pub const BLOCK: Delimiter = Delimiter::kinds(TokenKind::Indent, TokenKind::Dedent);
    pub const INTERPOLATION: Delimiter =
        Delimiter::kinds(TokenKind::InterpolationStart, TokenKind::InterpolationEnd);

    /// Every delimiter pair that must stay balanced
    pub const REGISTRY: [Delimiter; 5] = [
        Self::PAREN,
        Self::BRACKET,
        Self::BRACE,
        Self::BLOCK,
        Self::INTERPOLATION,
    ];

    const fn exact(
        open_kind: TokenKind,
        open_text: &'static str,
        close_kind: TokenKind,
        close_text: &'static str,
    ) -> Self {
        Self {
            open_kind,
            open_text: Some(open_text),
            close_kind,
            close_text: Some(close_text),
        }
    }

    const fn kinds(open_kind: TokenKind, close_kind: TokenKind) -> Self {
        Self {
            open_kind,
            open_text: None,
            close_kind,
            close_text: None,
        }
    }

    /// Classify `token` as an opener, returning the pair it opens.
    ///
    /// The registry is fixed, so this is a lookup over a constant table.
    pub fn from_token(token: &Token) -> Option<Delimiter> {
        Self::REGISTRY
            .iter()
            .find(|delimiter| delimiter.matches_open(token))
            .copied()
    }

    pub fn matches_open(&self, token: &Token) -> bool {
        token.kind == self.open_kind && self.open_text.is_none_or(|text| token.text == text)
    }

    pub fn matches_close(&self, token: &Token) -> bool {
        token.kind == self.close_kind && self.close_text.is_none_or(|text| token.text == text)
    }

    /// Index of the close matching an already-consumed opener.
    ///
    /// `tokens` starts right after the opener. Only nesting of this same pair is
    /// tracked; other delimiter kinds are opaque.
    pub fn find_close(&self, tokens: &[Token]) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in tokens.iter().enumerate() {
            if self.matches_open(token) {
                depth += 1;
            } else if self.matches_close(token) {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
        }
        None
    }
}

/// Length of the token tree at the start of `tokens`.
///
/// A non-opener is a tree of one token. An opener spans through its matching
/// close; `None` if the close is missing or `tokens` is empty.
pub fn tree_len(tokens: &[Token]) -> Option<usize> {
    let first = tokens.first()?;
    match Delimiter::from_token(first) {
        Some(delimiter) => delimiter.find_close(&tokens[1..]).map(|close| close + 2),
        None => Some(1),
    }
}

/// One balanced unit of tokens, delimiters included
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TokenTree(Vec<Token>);

impl TokenTree {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }

    pub fn into_vec(self) -> Vec<Token> {
        self.0
    }
}

impl Deref for TokenTree {
    type Target = [Token];

    fn deref(&self) -> &[Token] {
        &self.0
    }
}

impl From<Vec<Token>> for TokenTree {
    fn from(tokens: Vec<Token>) -> Self {
        Self(tokens)
    }
}

impl<'a> IntoIterator for &'a TokenTree {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
