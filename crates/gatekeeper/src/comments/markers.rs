use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

// One marker per line; quoted copies ("> <!-- ... -->") are not markers
static MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^<!--[ \t]+(?P<key>[a-z_]+):[ \t]+(?P<value>\S+)[ \t]+-->[ \t\r]*$").unwrap()
});

/// Marker keys understood by the protocol. Unknown keys are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKey {
    BotId,
    BotLabel,
    CommitId,
}

impl MarkerKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BotId => "botid",
            Self::BotLabel => "bot_label",
            Self::CommitId => "commit_id",
        }
    }

    fn from_wire(key: &str) -> Option<Self> {
        match key {
            "botid" => Some(Self::BotId),
            "bot_label" => Some(Self::BotLabel),
            "commit_id" => Some(Self::CommitId),
            _ => None,
        }
    }
}

/// A marker value, decoded once: integers for rule ids, text otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerValue {
    Int(i64),
    Text(String),
}

impl MarkerValue {
    // Only canonical integers decode as Int, so rendering gives back the raw text
    fn decode(raw: &str) -> Self {
        raw.parse::<i64>()
            .ok()
            .filter(|v| v.to_string() == raw)
            .map_or_else(|| Self::Text(raw.to_string()), Self::Int)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Compare against a disambiguator by wire form, so a numeric-looking
    /// SHA prefix still matches.
    #[must_use]
    pub fn matches(&self, expected: &str) -> bool {
        match self {
            Self::Int(v) => v.to_string() == expected,
            Self::Text(s) => s == expected,
        }
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Markers found in, or destined for, a comment body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers {
    entries: BTreeMap<MarkerKey, MarkerValue>,
}

impl Markers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract markers from a comment body. The first occurrence of a key wins;
    /// malformed lines are skipped.
    #[must_use]
    pub fn parse(body: &str) -> Self {
        let mut entries = BTreeMap::new();
        for caps in MARKER_REGEX.captures_iter(body) {
            let Some(key) = MarkerKey::from_wire(&caps["key"]) else {
                continue;
            };
            entries
                .entry(key)
                .or_insert_with(|| MarkerValue::decode(&caps["value"]));
        }
        Self { entries }
    }

    #[must_use]
    pub fn with(mut self, key: MarkerKey, value: MarkerValue) -> Self {
        self.entries.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: MarkerKey) -> Option<&MarkerValue> {
        self.entries.get(&key)
    }

    #[must_use]
    pub fn bot_id(&self) -> Option<i64> {
        self.get(MarkerKey::BotId).and_then(MarkerValue::as_int)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `<!-- key: value -->` line per marker, `botid` first.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(key, value)| format!("<!-- {}: {value} -->\n", key.as_str()))
            .collect()
    }
}
