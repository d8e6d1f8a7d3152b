//! Notification email classification
//!
//! Maps a decoded message body to one of the known notification
//! templates and extracts the action link. Matching is a fixed priority
//! list of literal rules; the first matching rule wins.

use regex::Regex;

/// Classification outcome for a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// "Was this you" household-update notification
    UpdateHome,
    /// Temporary access code notification
    TemporaryAccessCode,
    /// Anything else
    Other,
}

/// Result of classifying a body: a label plus the extracted link.
///
/// A link is present exactly when the label is not [`Label::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub label: Label,
    pub link: Option<String>,
}

/// One template rule: a literal phrase that must be followed, anywhere
/// later in the body and across line breaks, by an HTTP(S) URL.
struct Rule {
    label: Label,
    pattern: Regex,
}

impl Rule {
    fn new(phrase: &str, label: Label) -> Self {
        // (?s) lets .*? span newlines: the phrase and the URL need not
        // share a line. The link is the first run of non-whitespace
        // starting with http:// or https:// after the phrase.
        let pattern = format!(r"(?s){}.*?(https?://\S+)", regex::escape(phrase));
        Self {
            label,
            pattern: Regex::new(&pattern).expect("valid rule regex"),
        }
    }
}

/// Ordered-rule classifier for provider notification emails.
///
/// The phrases are tied to one provider's exact wording and must be
/// matched literally; rewording them breaks compatibility with the
/// email templates this service targets. New templates are supported by
/// appending a rule, not by changing control flow.
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule::new("Sí, la envié yo", Label::UpdateHome),
                Rule::new("Obtener código", Label::TemporaryAccessCode),
            ],
        }
    }

    /// Classify a decoded message body.
    ///
    /// Deterministic and pure: rules are evaluated in priority order
    /// and the first one whose phrase-then-URL pattern matches wins.
    pub fn classify(&self, body: &str) -> Classification {
        for rule in &self.rules {
            if let Some(caps) = rule.pattern.captures(body)
                && let Some(link) = caps.get(1)
            {
                return Classification {
                    label: rule.label,
                    link: Some(link.as_str().to_string()),
                };
            }
        }

        Classification {
            label: Label::Other,
            link: None,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
