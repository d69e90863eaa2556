mod filters;
mod quickfind;

pub use filters::{Filter, FilterSet, HighlightRules};
pub use quickfind::find_match;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

const MAX_SAVED_SEARCHES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

impl SearchDirection {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// The pattern typed in the quick-find bar. One instance is shared by every
/// view of a session so all of them highlight the same thing.
#[derive(Debug, Clone, Default)]
pub struct QuickFindPattern {
    text: String,
    ignore_case: bool,
    regex: Option<Regex>,
}

impl QuickFindPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text that is not a valid regex is searched for literally.
    pub fn change_search_pattern(&mut self, text: &str, ignore_case: bool) {
        self.text = text.to_string();
        self.ignore_case = ignore_case;
        self.regex = if text.is_empty() {
            None
        } else {
            build_regex(text, ignore_case)
                .or_else(|_| build_regex(&regex::escape(text), ignore_case))
                .ok()
        };
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_active(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_line_matching(&self, line: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(line))
    }

    /// Byte ranges of every match in `line`.
    pub fn match_ranges(&self, line: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(r) => r
                .find_iter(line)
                .filter(|m| !m.is_empty())
                .map(|m| (m.start(), m.end()))
                .collect(),
            None => Vec::new(),
        }
    }
}

pub fn build_regex(pattern: &str, ignore_case: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
}

/// Recently used filter searches, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistory {
    searches: Vec<String>,
}

impl SearchHistory {
    pub fn add_recent(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.searches.retain(|s| s != text);
        self.searches.insert(0, text.to_string());
        self.searches.truncate(MAX_SAVED_SEARCHES);
    }

    pub fn recent(&self) -> &[String] {
        &self.searches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_case_handling() {
        let mut pattern = QuickFindPattern::new();
        assert!(!pattern.is_active());
        assert!(!pattern.is_line_matching("anything"));

        pattern.change_search_pattern("error", true);
        assert!(pattern.is_line_matching("An ERROR here"));

        pattern.change_search_pattern("error", false);
        assert!(!pattern.is_line_matching("An ERROR here"));
        assert_eq!(pattern.match_ranges("error, error"), vec![(0, 5), (7, 12)]);
    }

    #[test]
    fn test_invalid_regex_is_literal() {
        let mut pattern = QuickFindPattern::new();
        pattern.change_search_pattern("foo(", false);
        assert!(pattern.is_active());
        assert!(pattern.is_line_matching("call foo(1)"));
        assert!(!pattern.is_line_matching("call foo"));
    }

    #[test]
    fn test_history_dedups_and_caps() {
        let mut history = SearchHistory::default();
        history.add_recent("a");
        history.add_recent("b");
        history.add_recent("a");
        history.add_recent("   ");
        assert_eq!(history.recent(), &["a".to_string(), "b".to_string()]);

        for i in 0..(MAX_SAVED_SEARCHES + 10) {
            history.add_recent(&format!("s{}", i));
        }
        assert_eq!(history.recent().len(), MAX_SAVED_SEARCHES);
        assert_eq!(history.recent()[0], format!("s{}", MAX_SAVED_SEARCHES + 9));
    }

    #[test]
    fn test_direction_reversed() {
        assert_eq!(SearchDirection::Forward.reversed(), SearchDirection::Backward);
        assert_eq!(SearchDirection::Backward.reversed(), SearchDirection::Forward);
    }
}
