//! Parser for the supervisor's review reply.
//!
//! The reply is expected to be a single line, `COMPLETE` or
//! `IMPROVE: <instruction>`. Anything else parses to
//! [`ReviewVerdict::Unrecognized`], which never counts as completion.

const COMPLETE_PREFIX: &str = "complete";
const IMPROVE_PREFIX: &str = "improve";

/// Decision extracted from a review reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewVerdict {
    /// The supervisor accepted the execution result.
    Complete,
    /// The supervisor asked for changes.
    Improve { instruction: String },
    /// Neither pattern was found; treated as not complete.
    Unrecognized { reply: String },
}

impl ReviewVerdict {
    pub fn is_complete(&self) -> bool {
        matches!(self, ReviewVerdict::Complete)
    }

    /// Text to persist as task feedback when the task is not complete.
    pub fn feedback(&self) -> Option<String> {
        match self {
            ReviewVerdict::Complete => None,
            ReviewVerdict::Improve { instruction } => Some(instruction.clone()),
            ReviewVerdict::Unrecognized { reply } => Some(reply.clone()),
        }
    }
}

/// Parse a review reply into a verdict.
///
/// Lines are scanned in order; the first line that either starts with
/// `IMPROVE` or starts with `COMPLETE` decides. A negated or embedded
/// `COMPLETE` (`NOT COMPLETE`, `is not complete`) never decides.
pub fn parse_review(reply: &str) -> ReviewVerdict {
    for line in reply.lines() {
        let line = strip_decoration(line);
        if line.is_empty() {
            continue;
        }
        if starts_with_ignore_case(line, IMPROVE_PREFIX) {
            let rest = &line[IMPROVE_PREFIX.len()..];
            let instruction = match rest.split_once(':') {
                Some((_, after)) => after,
                None => rest,
            };
            return ReviewVerdict::Improve {
                instruction: strip_decoration(instruction).to_string(),
            };
        }
        if starts_with_ignore_case(line, COMPLETE_PREFIX) {
            return ReviewVerdict::Complete;
        }
    }

    ReviewVerdict::Unrecognized {
        reply: reply.trim().to_string(),
    }
}

fn strip_decoration(line: &str) -> &str {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '`' | '>'))
}

/// Prefix match that also requires a word boundary after the prefix.
fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    let Some(head) = line.get(..prefix.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(prefix)
        && !line[prefix.len()..]
            .chars()
            .next()
            .is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_complete() {
        assert_eq!(parse_review("COMPLETE"), ReviewVerdict::Complete);
        assert_eq!(parse_review("  complete.\n"), ReviewVerdict::Complete);
        assert_eq!(parse_review("**COMPLETE**"), ReviewVerdict::Complete);
    }

    #[test]
    fn improve_with_instruction() {
        assert_eq!(
            parse_review("IMPROVE: add error handling"),
            ReviewVerdict::Improve {
                instruction: "add error handling".to_string()
            }
        );
    }

    #[test]
    fn improve_mentioning_complete_is_still_improve() {
        let verdict = parse_review("Improve: make the output complete");
        assert!(!verdict.is_complete());
        assert_eq!(verdict.feedback().as_deref(), Some("make the output complete"));
    }

    #[test]
    fn incomplete_is_not_complete() {
        let verdict = parse_review("The result is incomplete");
        assert_eq!(
            verdict,
            ReviewVerdict::Unrecognized {
                reply: "The result is incomplete".to_string()
            }
        );
        assert!(!verdict.is_complete());
    }

    #[test]
    fn improve_prefix_needs_word_boundary() {
        let verdict = parse_review("Improvements look good\nCOMPLETE");
        assert_eq!(verdict, ReviewVerdict::Complete);
    }

    #[test]
    fn negated_complete_is_not_complete() {
        for reply in ["NOT COMPLETE: output is wrong", "The task is not complete yet."] {
            let verdict = parse_review(reply);
            assert!(!verdict.is_complete(), "{reply}");
            assert_eq!(verdict.feedback().as_deref(), Some(reply));
        }
    }

    #[test]
    fn complete_prefix_needs_word_boundary() {
        assert!(!parse_review("Completeness is lacking").is_complete());
        assert_eq!(parse_review("COMPLETE: all checks pass"), ReviewVerdict::Complete);
    }

    #[test]
    fn first_deciding_line_wins() {
        let verdict = parse_review("Looks fine overall.\nCOMPLETE\nIMPROVE: ignored");
        assert_eq!(verdict, ReviewVerdict::Complete);
    }

    #[test]
    fn empty_reply_is_unrecognized() {
        let verdict = parse_review("   \n");
        assert_eq!(
            verdict,
            ReviewVerdict::Unrecognized {
                reply: String::new()
            }
        );
        assert_eq!(verdict.feedback().as_deref(), Some(""));
    }
}
