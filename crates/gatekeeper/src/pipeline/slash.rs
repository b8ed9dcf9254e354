//! `/label:add <scope>` and `/label:remove <scope>` comment commands.

use std::sync::LazyLock;

use regex::Regex;

static SLASH_COMMAND_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(?P<command>\w+):(?P<verb>\w+)\s+(?P<argument>\S+)").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelVerb {
    Add,
    Remove,
}

impl LabelVerb {
    fn from_wire(verb: &str) -> Option<Self> {
        match verb {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// A recognized label command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub verb: LabelVerb,
    /// Scope as typed; may already carry the `category/` prefix.
    pub scope: String,
}

/// First command in a comment body. Unknown commands and verbs yield `None`.
#[must_use]
pub fn parse_slash_command(body: &str) -> Option<SlashCommand> {
    let caps = SLASH_COMMAND_REGEX.captures(body)?;
    if &caps["command"] != "label" {
        return None;
    }
    Some(SlashCommand {
        verb: LabelVerb::from_wire(&caps["verb"])?,
        scope: caps["argument"].to_string(),
    })
}
