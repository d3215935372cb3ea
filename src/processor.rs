use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::error::MacroError;
use crate::invoke::{Definer, Invoker};
use crate::lexer::lex;
use crate::render::render;
use crate::rules::{DebugLog, Macro, MacroRules, Stringify};
use crate::token::{Delimiter, Token};

/// Registry of macros by name
#[derive(Default, Clone)]
pub struct MacroRegistry(HashMap<String, Rc<dyn Macro>>);

impl MacroRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `stringify` and `debug`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.define("stringify", Stringify);
        registry.define("debug", DebugLog);
        registry
    }

    /// Load macro definitions from source text.
    /// Expands the source - `macro_rules!` blocks populate the registry as a side effect.
    pub fn load(&mut self, source: &str) -> Result<(), MacroError> {
        let mut expander = Expander::new(self.clone())?;
        let result = expander.expand(source);
        *self = expander.into_registry();
        result.map(|_| ())
    }

    /// Register a macro, replacing any previous one with the same name
    pub fn define(&mut self, name: impl Into<String>, r#macro: impl Macro + 'static) {
        self.0.insert(name.into(), Rc::new(r#macro));
    }

    /// Get a macro by name
    pub fn get(&self, name: &str) -> Option<&dyn Macro> {
        self.0.get(name).map(Rc::as_ref)
    }

    /// Check if a macro is defined
    pub fn is_defined(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Apply the macro called `name` to its argument tokens
    pub fn invoke(&self, name: &str, args: &[Token]) -> Result<Vec<Token>, MacroError> {
        let r#macro = self.get(name).ok_or_else(|| MacroError::UnknownMacro {
            name: name.to_owned(),
        })?;

        tracing::trace!(name, args = args.len(), "invoking macro");
        r#macro
            .apply(args)
            .map_err(|source| MacroError::Transcription {
                name: name.to_owned(),
                source,
            })?
            .ok_or_else(|| MacroError::NoRuleMatched {
                name: name.to_owned(),
            })
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_tuple("MacroRegistry").field(&names).finish()
    }
}

/// Limits applied to a single expansion
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExpanderConfig {
    /// Most rewrites one expansion may perform; `None` never stops
    pub max_rewrites: Option<usize>,
}

impl ExpanderConfig {
    pub const DEFAULT_MAX_REWRITES: usize = 10_000;

    pub fn unbounded() -> Self {
        Self { max_rewrites: None }
    }
}

impl Default for ExpanderConfig {
    fn default() -> Self {
        Self {
            max_rewrites: Some(Self::DEFAULT_MAX_REWRITES),
        }
    }
}

/// State threaded through one expansion
#[derive(Debug)]
pub struct ExpansionContext {
    pub registry: MacroRegistry,
    config: ExpanderConfig,
    rewrites: usize,
}

impl ExpansionContext {
    pub fn new(registry: MacroRegistry, config: ExpanderConfig) -> Self {
        Self {
            registry,
            config,
            rewrites: 0,
        }
    }

    pub fn rewrites(&self) -> usize {
        self.rewrites
    }

    /// Count one rewrite against the budget
    pub fn record_rewrite(&mut self) -> Result<(), MacroError> {
        self.rewrites += 1;
        match self.config.max_rewrites {
            Some(limit) if self.rewrites > limit => Err(MacroError::RewriteLimit { limit }),
            _ => Ok(()),
        }
    }

    pub fn into_registry(self) -> MacroRegistry {
        self.registry
    }
}

/// Replacement for a prefix of the token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Number of tokens replaced
    pub consumed: usize,
    pub output: Vec<Token>,
}

/// Transforms the beginning of a token sequence
pub trait Rewriter {
    /// Rewrite a prefix of `tokens`, or return `None` if nothing applies here
    fn rewrite(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Rewrite>, MacroError>;
}

/// Transforms a whole token sequence
pub trait Pass {
    /// Rewrite `tokens`, or return `None` if nothing changed
    fn run(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Vec<Token>>, MacroError>;
}

/// Applies a rule set wherever a prefix of the stream matches it
#[derive(Debug, Clone)]
pub struct RuleRewriter {
    name: String,
    rules: MacroRules,
}

impl RuleRewriter {
    pub fn new(name: impl Into<String>, rules: MacroRules) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }
}

impl Rewriter for RuleRewriter {
    fn rewrite(
        &self,
        tokens: &[Token],
        _ctx: &mut ExpansionContext,
    ) -> Result<Option<Rewrite>, MacroError> {
        let rewrite = self
            .rules
            .apply_prefix(tokens)
            .map_err(|source| MacroError::Transcription {
                name: self.name.clone(),
                source,
            })?;
        Ok(rewrite.map(|(consumed, output)| Rewrite { consumed, output }))
    }
}

/// Left-to-right scan applying rewriters in order.
///
/// Output of a rewrite is spliced back and scanned again from the same
/// position. Where nothing applies, the interior of a delimited group is
/// scanned as its own sequence.
pub struct Scanner {
    rewriters: Vec<Box<dyn Rewriter>>,
}

impl Scanner {
    pub fn new(rewriters: Vec<Box<dyn Rewriter>>) -> Self {
        Self { rewriters }
    }

    fn rewrite_at(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Rewrite>, MacroError> {
        for rewriter in &self.rewriters {
            if let Some(rewrite) = rewriter.rewrite(tokens, ctx)? {
                return Ok(Some(rewrite));
            }
        }
        Ok(None)
    }
}

impl Pass for Scanner {
    fn run(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Vec<Token>>, MacroError> {
        let mut input = tokens.to_vec();
        let mut output = Vec::with_capacity(input.len());
        let mut changed = false;
        let mut pos = 0;

        while pos < input.len() {
            if let Some(rewrite) = self.rewrite_at(&input[pos..], ctx)? {
                ctx.record_rewrite()?;
                tracing::trace!(
                    consumed = rewrite.consumed,
                    produced = rewrite.output.len(),
                    "rewrite"
                );
                input.splice(pos..pos + rewrite.consumed, rewrite.output);
                changed = true;
                continue;
            }

            let token = &input[pos];
            let close = Delimiter::from_token(token)
                .and_then(|delimiter| delimiter.find_close(&input[pos + 1..]))
                .map(|offset| pos + 1 + offset);

            let Some(close) = close else {
                output.push(token.clone());
                pos += 1;
                continue;
            };

            output.push(token.clone());
            let interior = &input[pos + 1..close];
            match self.run(interior, ctx)? {
                Some(expanded) => {
                    output.extend(expanded);
                    changed = true;
                }
                None => output.extend_from_slice(interior),
            }
            output.push(input[close].clone());
            pos = close + 1;
        }

        Ok(changed.then_some(output))
    }
}

/// Runs its passes until none of them changes the stream.
///
/// Starts over from the first pass after every change. Termination depends on
/// the macros involved; the rewrite budget is the only guard.
pub struct FixedPoint {
    passes: Vec<Box<dyn Pass>>,
}

impl FixedPoint {
    pub fn new(passes: Vec<Box<dyn Pass>>) -> Self {
        Self { passes }
    }
}

impl Pass for FixedPoint {
    fn run(
        &self,
        tokens: &[Token],
        ctx: &mut ExpansionContext,
    ) -> Result<Option<Vec<Token>>, MacroError> {
        let mut current = tokens.to_vec();
        let mut changed = false;

        'restart: loop {
            for (index, pass) in self.passes.iter().enumerate() {
                if let Some(next) = pass.run(&current, ctx)? {
                    ctx.record_rewrite()?;
                    tracing::trace!(pass = index, "restarting after change");
                    current = next;
                    changed = true;
                    continue 'restart;
                }
            }
            return Ok(changed.then_some(current));
        }
    }
}

/// Expander with `macro_rules!` definitions, function-style and block-style
/// invocations
pub struct Expander {
    registry: MacroRegistry,
    config: ExpanderConfig,
    pipeline: Box<dyn Pass>,
}

impl Expander {
    pub fn new(registry: MacroRegistry) -> Result<Self, MacroError> {
        let scanner = Scanner::new(vec![
            Box::new(Definer::standard()?),
            Box::new(Invoker::function_style()?),
            Box::new(Invoker::block_style()?),
        ]);

        Ok(Self::with_pipeline(
            registry,
            Box::new(FixedPoint::new(vec![Box::new(scanner)])),
        ))
    }

    /// Expander running a custom pass
    pub fn with_pipeline(registry: MacroRegistry, pipeline: Box<dyn Pass>) -> Self {
        Self {
            registry,
            config: ExpanderConfig::default(),
            pipeline,
        }
    }

    pub fn with_config(mut self, config: ExpanderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> MacroRegistry {
        self.registry
    }

    /// Expand all macros in the input text (main entry point)
    pub fn expand(&mut self, input: &str) -> Result<String, MacroError> {
        let tokens = lex(input)?;
        Ok(render(&self.expand_tokens(&tokens)?))
    }

    /// Expand a list of tokens.
    ///
    /// Definitions made along the way stay in the registry, even when the
    /// expansion fails part way.
    pub fn expand_tokens(&mut self, tokens: &[Token]) -> Result<Vec<Token>, MacroError> {
        let mut ctx = ExpansionContext::new(std::mem::take(&mut self.registry), self.config.clone());
        let result = self.pipeline.run(tokens, &mut ctx);
        tracing::debug!(rewrites = ctx.rewrites(), "expansion finished");
        self.registry = ctx.into_registry();
        Ok(result?.unwrap_or_else(|| tokens.to_vec()))
    }
}
