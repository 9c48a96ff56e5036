//! Regex extraction over page text.
//!
//! HTML is flattened to lines first. Each line is matched against the
//! source's `pattern`, and every match yields at most one candidate from its
//! named groups: `name`, `date`, `time`, `start`, `end`, `location`, `image`.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::candidate::{clean_text, Confidence, RawCandidate};
use crate::client::{resolve_reference, Document};
use crate::datetime::DateRules;
use crate::error::ScraperError;
use crate::settings::Settings;

use super::NameRules;

const DEFAULT_DATE_FORMATS: &[&str] = &["%m/%d", "%m/%d/%Y", "%B %d", "%b %d"];

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
        .expect("valid regex")
});

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<br\s*/?>|</?(?:p|div|li|ul|ol|h[1-6]|tr|td|table|section|article|header|footer)\b[^>]*>",
    )
    .expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Reduces markup to trimmed, non-empty text lines.
#[must_use]
pub fn html_to_text(html: &str) -> Vec<String> {
    let text = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&rsquo;", "\u{2019}")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    text.lines().filter_map(clean_text).collect()
}

#[derive(Debug, Clone)]
pub struct TextPatternStrategy {
    pattern: Regex,
    anchor: Option<String>,
    stop_at: Option<String>,
    names: NameRules,
    pub(crate) date_rules: DateRules,
}

impl TextPatternStrategy {
    /// # Errors
    ///
    /// - [`ScraperError::MissingSetting`] when `pattern` is absent.
    /// - [`ScraperError::InvalidSetting`] when it does not compile or has
    ///   no `name` or `image` group to read, or for an unknown key.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self, ScraperError> {
        settings.check_keys(&["pattern", "anchor", "stop_at"])?;
        let source = settings.required_str("pattern")?;
        let pattern = Regex::new(source).map_err(|e| ScraperError::InvalidSetting {
            setting: "pattern".to_owned(),
            reason: e.to_string(),
        })?;
        let groups: Vec<&str> = pattern.capture_names().flatten().collect();
        if !groups.contains(&"name") && !groups.contains(&"image") {
            return Err(ScraperError::InvalidSetting {
                setting: "pattern".to_owned(),
                reason: "needs a named group \"name\" or \"image\"".to_owned(),
            });
        }

        Ok(Self {
            pattern,
            anchor: settings.optional_str("anchor")?.map(str::to_owned),
            stop_at: settings.optional_str("stop_at")?.map(str::to_owned),
            names: NameRules::from_settings(settings)?,
            date_rules: DateRules::from_settings(settings, DEFAULT_DATE_FORMATS)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::UnexpectedContentType`] for a JSON response.
    pub fn extract(&self, document: &Document) -> Result<Vec<RawCandidate>, ScraperError> {
        if document.content_type_contains("json") {
            return Err(ScraperError::UnexpectedContentType {
                content_type: document.content_type.clone().unwrap_or_default(),
                url: document.url.clone(),
                expected: "text/html or text/plain",
            });
        }

        let lines = html_to_text(&document.body);
        let Some(section) = self.section(&lines) else {
            tracing::debug!(
                url = %document.url,
                anchor = self.anchor.as_deref().unwrap_or_default(),
                "anchor text not found"
            );
            return Ok(Vec::new());
        };

        Ok(section
            .iter()
            .flat_map(|line| self.pattern.captures_iter(line))
            .map(|caps| self.read_match(&caps, document))
            .collect())
    }

    /// Lines after the anchor (exclusive) and before `stop_at` (exclusive).
    /// `None` when an anchor is configured but absent.
    fn section<'l>(&self, lines: &'l [String]) -> Option<&'l [String]> {
        let contains = |line: &str, needle: &str| {
            line.to_lowercase().contains(&needle.to_lowercase())
        };

        let start = match &self.anchor {
            Some(anchor) => lines.iter().position(|l| contains(l, anchor))? + 1,
            None => 0,
        };
        let rest = &lines[start..];
        let end = self
            .stop_at
            .as_ref()
            .and_then(|stop| rest.iter().position(|l| contains(l, stop)))
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }

    fn read_match(&self, caps: &Captures<'_>, document: &Document) -> RawCandidate {
        let group = |name: &str| caps.name(name).and_then(|m| clean_text(m.as_str()));

        let mut candidate = RawCandidate {
            date: group("date"),
            time_range: group("time"),
            start_time: group("start"),
            end_time: group("end"),
            location: group("location"),
            image_ref: group("image").and_then(|r| resolve_reference(&document.url, &r)),
            ..RawCandidate::default()
        };
        if let Some(name) = group("name").and_then(|raw| self.names.clean(&raw)) {
            candidate.push_name(&name, Confidence::High);
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    const DAY_LINE: &str =
        r"(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday)\s*,\s*(?P<date>\d{1,2}/\d{1,2})\s*:\s*(?P<name>.+)";

    const PAGE: &str = r#"
        <html><head><style>p { color: red; }</style>
        <script>var trucks = "Friday, 1/1: Not A Truck";</script></head>
        <body>
          <h2>Events</h2>
          <p>Thursday, 6/26: Trivia Night</p>
          <h2>UPCOMING FOOD TRUCKS</h2>
          <p>Thursday, 7/3: Tisket Tasket</p>
          <p>Friday, 7/4: Georgia&#39;s &amp; Co</p>
          <p>Saturday, 7/5: TBA</p>
          <p>Sunday 7/6 - no colon, skipped</p>
          <h2>Private Events</h2>
          <p>Monday, 7/7: Wedding</p>
        </body></html>"#;

    fn strategy(value: serde_json::Value) -> TextPatternStrategy {
        let map: BTreeMap<String, serde_json::Value> = serde_json::from_value(value).unwrap();
        TextPatternStrategy::from_settings(&Settings::new(&map)).unwrap()
    }

    fn html(body: &str) -> Document {
        Document::new("https://taproom.example.com/", Some("text/html"), body)
    }

    #[test]
    fn html_to_text_drops_scripts_and_decodes_entities() {
        let lines = html_to_text(PAGE);
        assert!(lines.contains(&"UPCOMING FOOD TRUCKS".to_owned()));
        assert!(lines.contains(&"Friday, 7/4: Georgia's & Co".to_owned()));
        assert!(!lines.iter().any(|l| l.contains("Not A Truck")));
        assert!(!lines.iter().any(|l| l.contains("color")));
    }

    #[test]
    fn anchor_and_stop_bound_the_section() {
        let s = strategy(json!({
            "pattern": DAY_LINE,
            "anchor": "upcoming food trucks",
            "stop_at": "Private Events"
        }));
        let candidates = s.extract(&html(PAGE)).unwrap();
        let dates: Vec<&str> = candidates.iter().filter_map(|c| c.date.as_deref()).collect();
        assert_eq!(dates, vec!["7/3", "7/4", "7/5"]);

        assert_eq!(candidates[0].names[0].text, "Tisket Tasket");
        assert_eq!(candidates[1].names[0].text, "Georgia's & Co");
        assert!(candidates[2].names.is_empty(), "TBA is a placeholder");
    }

    #[test]
    fn missing_anchor_yields_no_candidates() {
        let s = strategy(json!({"pattern": DAY_LINE, "anchor": "FOOD TRUCK SCHEDULE"}));
        assert!(s.extract(&html(PAGE)).unwrap().is_empty());
    }

    #[test]
    fn without_anchor_whole_page_is_searched() {
        let s = strategy(json!({"pattern": DAY_LINE}));
        assert_eq!(s.extract(&html(PAGE)).unwrap().len(), 5);
    }

    #[test]
    fn time_groups_are_captured() {
        let s = strategy(json!({
            "pattern": r"(?P<date>\d{1,2}/\d{1,2})\s+(?P<name>[^|]+?)\s*\|\s*(?P<time>.+)"
        }));
        let candidates = s
            .extract(&Document::new(
                "https://example.com",
                Some("text/plain"),
                "7/4 Off the Rez | 4 - 8pm\n",
            ))
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].time_range.as_deref(), Some("4 - 8pm"));
        assert_eq!(candidates[0].names[0].text, "Off the Rez");
    }

    #[test]
    fn pattern_is_required_and_validated() {
        let empty = BTreeMap::new();
        assert!(matches!(
            TextPatternStrategy::from_settings(&Settings::new(&empty)),
            Err(ScraperError::MissingSetting { .. })
        ));

        let map: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(json!({"pattern": r"(\d+)/(\d+)"})).unwrap();
        assert!(matches!(
            TextPatternStrategy::from_settings(&Settings::new(&map)),
            Err(ScraperError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn unknown_key_is_rejected() {
        let map: BTreeMap<String, serde_json::Value> = serde_json::from_value(json!({
            "pattern": r"(?P<date>\d+/\d+) (?P<name>.+)",
            "stop": "Past events"
        }))
        .unwrap();
        assert!(matches!(
            TextPatternStrategy::from_settings(&Settings::new(&map)),
            Err(ScraperError::InvalidSetting { ref setting, .. }) if setting == "stop"
        ));
    }
}
