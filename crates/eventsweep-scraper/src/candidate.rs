//! Unvalidated records produced by strategies.

/// How much a strategy trusts a name field.
///
/// Recorded for diagnostics; resolution walks fields in the order the
/// strategy emitted them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameField {
    pub text: String,
    pub confidence: Confidence,
}

/// One record as a strategy saw it. Every field may be absent; the
/// normalizer decides what survives.
///
/// `time_range` carries text like `"1 - 8pm"` when the source gives start
/// and end together; `start_time`/`end_time` carry them when it does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub names: Vec<NameField>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_range: Option<String>,
    pub location: Option<String>,
    pub image_ref: Option<String>,
}

impl RawCandidate {
    /// Appends a name field, ignoring blank text.
    pub fn push_name(&mut self, text: &str, confidence: Confidence) {
        let text = collapse_whitespace(text);
        if !text.is_empty() {
            self.names.push(NameField { text, confidence });
        }
    }
}

/// Trims and collapses internal whitespace runs; returns `None` for blank
/// input.
pub(crate) fn clean_text(raw: &str) -> Option<String> {
    let text = collapse_whitespace(raw);
    (!text.is_empty()).then_some(text)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_name_skips_blank_and_collapses_whitespace() {
        let mut c = RawCandidate::default();
        c.push_name("   ", Confidence::High);
        c.push_name("  Marination \n Mobile ", Confidence::Low);
        assert_eq!(
            c.names,
            vec![NameField {
                text: "Marination Mobile".to_owned(),
                confidence: Confidence::Low
            }]
        );
    }

    #[test]
    fn clean_text_blank_is_none() {
        assert_eq!(clean_text(" \t"), None);
        assert_eq!(clean_text(" 5 - 8pm ").as_deref(), Some("5 - 8pm"));
    }
}
