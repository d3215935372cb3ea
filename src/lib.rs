//! Declarative token-rewriting macros.
//!
//! Macros are ordered `[pattern]: template` rule sets. Patterns match token
//! sequences and capture parts of them, templates replay the captures, and an
//! expander rewrites a token stream until no macro applies anywhere in it,
//! including inside bracketed groups and indented blocks.
//!
//! ```
//! use tokrules::{Expander, MacroRegistry};
//!
//! let mut registry = MacroRegistry::new();
//! registry
//!     .load("macro_rules! list:\n    [$($n:number),*]: [$($n),*]\n")
//!     .unwrap();
//!
//! let mut expander = Expander::new(registry).unwrap();
//! assert_eq!(expander.expand("xs = list!(1, 2, 3)").unwrap(), "xs = [1, 2, 3]");
//! ```

pub mod error;
pub mod invoke;
pub mod lexer;
pub mod matcher;
pub mod processor;
pub mod render;
pub mod rules;
pub mod syntax;
pub mod token;
pub mod transcriber;

pub use error::{DefinitionError, LexError, MacroError, TranscriptionError};
pub use invoke::{Definer, Invoker};
pub use lexer::lex;
pub use matcher::{Capture, Match, Matcher};
pub use processor::{
    Expander, ExpanderConfig, ExpansionContext, FixedPoint, MacroRegistry, Pass, Rewrite,
    Rewriter, RuleRewriter, Scanner,
};
pub use render::render;
pub use rules::{Macro, MacroRule, MacroRules};
pub use syntax::SyntaxParser;
pub use token::{Delimiter, Token, TokenKind, TokenTree};
pub use transcriber::Transcriber;
