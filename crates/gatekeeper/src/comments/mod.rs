//! Bot feedback comments and the hidden-marker identity protocol.
//!
//! Every bot comment starts with `<!-- key: value -->` marker lines followed
//! by the message. The `botid` marker names the rule the comment reports, and
//! rules that can fire several times per object add a second marker
//! (`bot_label` or `commit_id`). No other state backs comment identity, so
//! the marker format is a wire contract with comments already posted.

mod markers;
mod protocol;
mod rules;

pub use markers::{MarkerKey, MarkerValue, Markers};
pub use protocol::{CommentOutcome, CommentProtocol, CommentRecord};
pub use rules::{CommentIdentity, CommentTemplates, RuleId, Violation};
