//! Question bank loading.
//!
//! Banks are plain text files in the legacy format: blank lines and `#`
//! comments are skipped, a line starting with `Frage` opens a new block, the
//! following line carries the question text, and every line after that is an
//! answer option. The correct option is flagged with a trailing `*`, which is
//! stripped before the option is stored.

use std::{fs, path::Path, sync::Arc};

use thiserror::Error;
use tracing::info;

/// A single trivia question with its answer options.
///
/// Immutable once loaded; sessions share the bank behind an [`Arc`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// The question text shown to players.
    pub text: String,
    /// Ordered answer options, correct one included.
    pub options: Vec<String>,
    /// The option players must echo back verbatim to score.
    pub correct: String,
}

/// Errors raised while loading a question bank.
#[derive(Debug, Error)]
pub enum BankError {
    /// The bank file could not be read at all.
    #[error("failed to read question bank `{path}`")]
    Unreadable {
        /// Path that was attempted.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file was readable but produced no usable questions.
    #[error("question bank `{0}` contains no questions")]
    Empty(String),
}

/// Load and parse the bank at `path`, returning the shared question sequence.
pub fn load(path: &Path) -> Result<Arc<[Question]>, BankError> {
    let contents = fs::read_to_string(path).map_err(|source| BankError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;

    let questions = parse(&contents);
    if questions.is_empty() {
        return Err(BankError::Empty(path.display().to_string()));
    }

    info!(path = %path.display(), count = questions.len(), "loaded question bank");
    Ok(questions.into())
}

/// Parse bank file contents into questions, discarding incomplete blocks.
///
/// A block is kept only when it has question text, at least one option, and a
/// `*`-flagged correct option.
fn parse(contents: &str) -> Vec<Question> {
    let mut questions = Vec::new();
    let mut block: Option<QuestionBlock> = None;
    // The line after a `Frage` marker is the question text, not an option.
    let mut expecting_text = false;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("Frage") {
            if let Some(done) = block.take() {
                questions.extend(done.finish());
            }
            block = Some(QuestionBlock::default());
            expecting_text = true;
            continue;
        }

        let Some(current) = block.as_mut() else {
            continue;
        };

        if expecting_text {
            current.text = Some(line.to_string());
            expecting_text = false;
        } else if let Some(option) = line.strip_suffix('*') {
            let option = option.trim().to_string();
            current.correct = Some(option.clone());
            current.options.push(option);
        } else {
            current.options.push(line.to_string());
        }
    }

    if let Some(done) = block.take() {
        questions.extend(done.finish());
    }

    questions
}

#[derive(Debug, Default)]
/// Accumulator for one question block while scanning the file.
struct QuestionBlock {
    text: Option<String>,
    options: Vec<String>,
    correct: Option<String>,
}

impl QuestionBlock {
    fn finish(self) -> Option<Question> {
        let text = self.text?;
        let correct = self.correct?;
        if self.options.is_empty() {
            return None;
        }
        Some(Question {
            text,
            options: self.options,
            correct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# capital cities, 2021 edition
Frage 1
What is the capital of France?
Berlin
Paris*
Madrid

Frage 2
Which planet is known as the red planet?
Venus
Mars *
Jupiter
";

    #[test]
    fn parses_blocks_and_strips_correct_marker() {
        let questions = parse(SAMPLE);
        assert_eq!(questions.len(), 2);

        assert_eq!(questions[0].text, "What is the capital of France?");
        assert_eq!(questions[0].options, vec!["Berlin", "Paris", "Madrid"]);
        assert_eq!(questions[0].correct, "Paris");

        // The marker is trimmed even with a space before the `*`.
        assert_eq!(questions[1].correct, "Mars");
        assert!(questions[1].options.contains(&"Mars".to_string()));
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let questions = parse("# only a comment\n\n\n");
        assert!(questions.is_empty());
    }

    #[test]
    fn drops_blocks_without_a_correct_option() {
        let questions = parse("Frage\nIncomplete?\nYes\nNo\n");
        assert!(questions.is_empty());
    }

    #[test]
    fn drops_marker_with_no_following_text() {
        let questions = parse("Frage\n");
        assert!(questions.is_empty());
    }

    #[test]
    fn lines_before_first_marker_are_ignored() {
        let questions = parse("stray line\nFrage\nQ?\nA*\nB\n");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Q?");
    }

    #[test]
    fn load_fails_for_missing_file() {
        let err = load(Path::new("does/not/exist.txt")).unwrap_err();
        assert!(matches!(err, BankError::Unreadable { .. }));
    }
}
