//! Template trees that replay captures into output tokens.

use crate::error::TranscriptionError;
use crate::matcher::{Capture, Captures, Match};
use crate::token::Token;

/// A template: a sequence of items emitted one after another
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Transcriber {
    items: Vec<TranscriberItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TranscriberItem {
    /// Emitted verbatim
    Token(Token),
    /// Replaced by the capture bound to this name
    Substitution(String),
    Repeater(TranscriberRepeater),
}

/// A sub-template emitted once per repetition of the captures it uses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranscriberRepeater {
    pub transcriber: Transcriber,
    pub separator: Option<Token>,
}

impl Transcriber {
    pub fn new(items: Vec<TranscriberItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[TranscriberItem] {
        &self.items
    }

    pub fn transcribe(&self, matched: &Match) -> Result<Vec<Token>, TranscriptionError> {
        let mut out = Vec::new();
        self.transcribe_into(&matched.captures, &mut Vec::new(), &mut out)?;
        Ok(out)
    }

    /// Emit into `out`. `path` holds one index per enclosing repeater and picks
    /// which repetition of each list capture is projected.
    fn transcribe_into(
        &self,
        captures: &Captures,
        path: &mut Vec<usize>,
        out: &mut Vec<Token>,
    ) -> Result<(), TranscriptionError> {
        for item in &self.items {
            match item {
                TranscriberItem::Token(token) => out.push(token.clone()),
                TranscriberItem::Substitution(name) => match lookup(captures, name, path)? {
                    (Capture::Token(token), _) => out.push(token.clone()),
                    (Capture::Tree(tree), _) => out.extend_from_slice(tree),
                    (Capture::Repeated(_), _) => {
                        return Err(TranscriptionError::StillRepeating { name: name.clone() });
                    }
                },
                TranscriberItem::Repeater(repeater) => repeater.transcribe_into(captures, path, out)?,
            }
        }
        Ok(())
    }
}

impl FromIterator<TranscriberItem> for Transcriber {
    fn from_iter<I: IntoIterator<Item = TranscriberItem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl From<Token> for TranscriberItem {
    fn from(token: Token) -> Self {
        TranscriberItem::Token(token)
    }
}

impl TranscriberRepeater {
    pub fn new(transcriber: Transcriber, separator: Option<Token>) -> Self {
        Self {
            transcriber,
            separator,
        }
    }

    fn transcribe_into(
        &self,
        captures: &Captures,
        path: &mut Vec<usize>,
        out: &mut Vec<Token>,
    ) -> Result<(), TranscriptionError> {
        for index in 0..self.repetitions(captures, path)? {
            if index > 0 {
                if let Some(separator) = &self.separator {
                    out.push(separator.clone());
                }
            }
            path.push(index);
            let result = self.transcriber.transcribe_into(captures, path, out);
            path.pop();
            result?;
        }
        Ok(())
    }

    /// Length of the first of this repeater's own substitutions that is still
    /// a list at this depth. Substitutions inside nested repeaters do not count.
    fn repetitions(
        &self,
        captures: &Captures,
        path: &[usize],
    ) -> Result<usize, TranscriptionError> {
        for item in self.transcriber.items() {
            let TranscriberItem::Substitution(name) = item else {
                continue;
            };
            if let (Capture::Repeated(items), true) = lookup(captures, name, path)? {
                return Ok(items.len());
            }
        }
        Err(TranscriptionError::NothingRepeats)
    }
}

/// Project a capture through `path`.
///
/// The flag is false when a non-list was reached before the path ran out,
/// meaning the variable repeats less deeply than the template.
fn lookup<'a>(
    captures: &'a Captures,
    name: &str,
    path: &[usize],
) -> Result<(&'a Capture, bool), TranscriptionError> {
    let mut capture = captures
        .get(name)
        .ok_or_else(|| TranscriptionError::UnknownVariable {
            name: name.to_owned(),
        })?;

    for &index in path {
        let Capture::Repeated(items) = capture else {
            return Ok((capture, false));
        };
        capture = items
            .get(index)
            .ok_or_else(|| TranscriptionError::RepetitionMismatch {
                name: name.to_owned(),
            })?;
    }

    Ok((capture, true))
}
