use crate::token::Token;

/// A pattern or template that cannot be built.
///
/// Raised while a definition is parsed or constructed, before any input is matched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("union must have at least one alternative")]
    EmptyUnion,
    #[error("union alternatives must bind the same variables at the same repetition depth")]
    UnionShapeMismatch,
    #[error("unterminated delimiter `{opener}` in definition")]
    UnterminatedDelimiter { opener: Token },
    #[error("unknown fragment kind `{kind}` for variable `{name}`")]
    UnknownFragmentKind { name: String, kind: String },
    #[error("variable `{name}` is missing a fragment kind")]
    MissingFragmentKind { name: String },
    #[error("malformed repetition: expected `$( ... ) sep? mode` with mode one of `?`, `*`, `+`")]
    MalformedRepetition,
    #[error("malformed union: every alternative must be a parenthesized pattern")]
    MalformedUnion,
    #[error("syntax error in rules for macro `{name}`")]
    MalformedRules { name: String },
    #[error("pattern does not capture required variable `{name}`")]
    MissingCapture { name: String },
}

/// A template that cannot replay the captures it was given.
///
/// Always a bug in the macro definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranscriptionError {
    #[error("no macro variable named `{name}`")]
    UnknownVariable { name: String },
    #[error("macro variable `{name}` is still repeating at this depth")]
    StillRepeating { name: String },
    #[error("no variables repeat at this depth")]
    NothingRepeats,
    #[error("macro variable `{name}` repeats fewer times than its neighbours")]
    RepetitionMismatch { name: String },
}

/// Failure turning source text into tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: dedent does not match any outer indentation level")]
    InconsistentDedent { line: usize },
}

/// Errors surfaced to the host by an expansion.
#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("cannot find macro named `{name}`")]
    UnknownMacro { name: String },
    #[error("invoking macro `{name}`: arguments did not match any rule")]
    NoRuleMatched { name: String },
    #[error("transcribing macro `{name}`: {source}")]
    Transcription {
        name: String,
        #[source]
        source: TranscriptionError,
    },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("expansion exceeded the limit of {limit} rewrites")]
    RewriteLimit { limit: usize },
}
