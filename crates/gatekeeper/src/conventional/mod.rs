//! Title and commit-message grammars.
//!
//! Two grammars are recognised:
//! - conventional commits, `type(scope)!: subject`, used for PR titles and commits
//! - bracketed issue titles, `[SCOPE] subject`
//!
//! A failed parse is an ordinary outcome that feeds user feedback, so both
//! parsers return [`ParseError`](crate::error::ParseError) rather than logging.

mod commit;
mod issue;

pub use commit::{parse_commit_title, ConventionalMessage};
pub use issue::{parse_issue_title, IssueTitle};
