use crate::tlog;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::build_regex;

/// One highlight rule. Colours are names understood by the UI theme
/// ("red", "lightblue", ...) or `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub pattern: String,
    #[serde(default)]
    pub ignore_case: bool,
    pub fore_color: String,
    pub back_color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub filters: Vec<Filter>,
}

impl FilterSet {
    /// Compiles the rules, skipping (and logging) invalid patterns.
    pub fn compile(&self) -> HighlightRules {
        let rules = self
            .filters
            .iter()
            .filter_map(|f| match build_regex(&f.pattern, f.ignore_case) {
                Ok(regex) => Some((regex, f.fore_color.clone(), f.back_color.clone())),
                Err(e) => {
                    tlog!(warn, "skipping filter {:?}: {}", f.pattern, e);
                    None
                }
            })
            .collect();
        HighlightRules { rules }
    }
}

#[derive(Debug, Default)]
pub struct HighlightRules {
    rules: Vec<(Regex, String, String)>,
}

impl HighlightRules {
    /// Colours of the first rule matching `line`, in declaration order.
    pub fn colors_for(&self, line: &str) -> Option<(&str, &str)> {
        self.rules
            .iter()
            .find(|(regex, _, _)| regex.is_match(line))
            .map(|(_, fore, back)| (fore.as_str(), back.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(pattern: &str, fore: &str) -> Filter {
        Filter {
            pattern: pattern.to_string(),
            ignore_case: true,
            fore_color: fore.to_string(),
            back_color: "black".to_string(),
        }
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let set = FilterSet {
            filters: vec![filter("error", "red"), filter("err", "yellow")],
        };
        let rules = set.compile();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.colors_for("An Error"), Some(("red", "black")));
        assert_eq!(rules.colors_for("errno"), Some(("yellow", "black")));
        assert_eq!(rules.colors_for("fine"), None);
    }

    #[test]
    fn test_invalid_rules_are_skipped() {
        let set = FilterSet {
            filters: vec![filter("(", "red")],
        };
        assert!(set.compile().is_empty());
    }
}
