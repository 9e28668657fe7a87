//! Extracting actions from LLM output.
//!
//! Structured replies (`CoachReply.actions`) are the canonical source.
//! Inline markers of the form `[ACTION:NAME]{json}[/ACTION]` inside the
//! message text are still honoured and are stripped before the message is
//! shown to the user.

use regex::Regex;

use coach_types::action::Action;

type Params = serde_json::Map<String, serde_json::Value>;

pub struct ActionParser {
    marker: Regex,
    bare_key: Regex,
    quoted: Regex,
}

impl ActionParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            marker: Regex::new(r"(?s)\[ACTION:([A-Z_]+)\](.*?)\[/ACTION\]")?,
            bare_key: Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:")?,
            // A double-quoted string, or a single-quoted token in group 1.
            quoted: Regex::new(r#""(?:[^"\\]|\\.)*"|'([^']*)'"#)?,
        })
    }

    /// Actions declared with inline markers, in order of appearance.
    ///
    /// Markers whose parameters cannot be parsed, even after repair, are
    /// skipped.
    pub fn parse_inline(&self, text: &str) -> Vec<Action> {
        self.marker
            .captures_iter(text)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str();
                let body = caps.get(2).map_or("", |m| m.as_str());
                match self.parse_params(body) {
                    Some(params) => Some(Action {
                        name: name.to_string(),
                        params,
                    }),
                    None => {
                        tracing::warn!(action = name, raw = body, "skipping unparseable inline action");
                        None
                    }
                }
            })
            .collect()
    }

    /// Text with every inline marker removed.
    pub fn strip_actions(&self, text: &str) -> String {
        let stripped = self.marker.replace_all(text, "");
        let mut out = String::with_capacity(stripped.len());
        let mut blank_run = 0;
        for line in stripped.trim().lines() {
            let line = line.trim_end();
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(line);
        }
        out
    }

    /// Parse a marker body as a JSON object, repairing common LLM mistakes
    /// (single-quoted strings, unquoted keys) when strict parsing fails.
    ///
    /// Only whole single-quoted tokens are requoted; apostrophes inside
    /// double-quoted strings are left alone.
    pub fn parse_params(&self, body: &str) -> Option<Params> {
        let body = body.trim();
        if body.is_empty() {
            return Some(Params::new());
        }
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
            return Some(map);
        }

        let repaired = self.quoted.replace_all(body, |caps: &regex::Captures<'_>| {
            match caps.get(1) {
                Some(inner) => serde_json::Value::from(inner.as_str()).to_string(),
                None => caps[0].to_string(),
            }
        });
        let repaired = self.bare_key.replace_all(&repaired, "$1\"$2\":");
        match serde_json::from_str(&repaired) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Combine structured and inline actions. Structured come first; an inline
/// action identical to one already present is dropped.
pub fn merge_actions(structured: Vec<Action>, inline: Vec<Action>) -> Vec<Action> {
    let mut merged = structured;
    for action in inline {
        if !merged.contains(&action) {
            merged.push(action);
        }
    }
    merged
}
