//! Line parser and argument tokenizer for the flash script language.
//!
//! The language is line-oriented. Each line is one of:
//!
//! - a blank line or `# comment` (skipped),
//! - a variable assignment `NAME = value`,
//! - a command invocation `NAME(arg1, arg2, ...)`.
//!
//! Parsing is pure and total: every line maps to exactly one [`Instruction`]
//! and never fails. Lines matching neither pattern become
//! [`Instruction::Unrecognized`] and are reported at execution time, not at
//! parse time.
//!
//! Argument text is tokenized separately by [`tokenize_args`], after variable
//! substitution has been applied to the whole parenthesized string. That
//! ordering is deliberate: a substituted value containing a comma splits into
//! extra arguments (see the engine's documentation of this quirk).

/// The parsed, typed representation of one script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Blank line or comment.
    Skip,

    /// Variable assignment `NAME = value`.
    ///
    /// The value is kept verbatim (after line-level trimming); it is neither
    /// substituted nor tokenized at parse time.
    Assign {
        /// Variable name (word characters only).
        name: String,
        /// Everything after the `=`, leading whitespace stripped.
        raw_value: String,
    },

    /// Command invocation `NAME(args)`.
    Invoke {
        /// Command name, upper-cased for case-insensitive dispatch.
        command: String,
        /// The parenthesized text, untouched. Substitution and tokenization
        /// happen at execution time.
        raw_args: String,
    },

    /// A non-empty, non-comment line matching neither pattern.
    Unrecognized {
        /// The trimmed original line, for diagnostics.
        line: String,
    },
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

/// Parses one script line into an [`Instruction`].
///
/// The assignment pattern is tried strictly before the invocation pattern,
/// and both are anchored to the whole (trimmed) line.
pub fn parse_line(line: &str) -> Instruction {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Instruction::Skip;
    }

    // Assignment: IDENT = rest-of-line (value must be non-empty).
    if let Some(eq) = line.find('=') {
        let name = line[..eq].trim_end();
        let value = line[eq + 1..].trim_start();
        if is_identifier(name) && !value.is_empty() {
            return Instruction::Assign {
                name: name.to_string(),
                raw_value: value.to_string(),
            };
        }
    }

    // Invocation: IDENT( ... ) with the closing paren ending the line. The
    // argument text runs to the *last* paren, so nested parens stay inside.
    if line.ends_with(')') {
        if let Some(open) = line.find('(') {
            let name = &line[..open];
            if is_identifier(name) {
                return Instruction::Invoke {
                    command: name.to_uppercase(),
                    raw_args: line[open + 1..line.len() - 1].to_string(),
                };
            }
        }
    }

    Instruction::Unrecognized {
        line: line.to_string(),
    }
}

/// Splits comma-separated, quote-aware argument text into tokens.
///
/// Single and double quotes both delimit; the opening quote character is
/// remembered and only its match closes the quoted region, so the other quote
/// character is literal inside. Commas inside quotes are literal. Tokens are
/// trimmed of surrounding whitespace. Unterminated quotes are tolerated; the
/// trailing content simply becomes part of the last token. Empty input yields
/// an empty sequence.
pub fn tokenize_args(args_text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in args_text.chars() {
        match c {
            '"' | '\'' => match quote {
                None => quote = Some(c),
                Some(q) if q == c => quote = None,
                Some(_) => current.push(c),
            },
            ',' if quote.is_none() => {
                if !current.is_empty() {
                    args.push(current.trim().to_string());
                    current.clear();
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current.trim().to_string());
    }

    args
}
