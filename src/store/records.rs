use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentFiles {
    files: Vec<String>,
}

impl RecentFiles {
    /// Moves `path` to the front, dropping duplicates and anything past `max`.
    pub fn add_recent(&mut self, path: &str, max: usize) {
        self.files.retain(|f| f != path);
        self.files.insert(0, path.to_string());
        self.files.truncate(max);
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Display options shared by every view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub overview_visible: bool,
    pub main_line_numbers_visible: bool,
    pub filtered_line_numbers_visible: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            overview_visible: true,
            main_line_numbers_visible: false,
            filtered_line_numbers_visible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_files_order_and_cap() {
        let mut recent = RecentFiles::default();
        recent.add_recent("a", 3);
        recent.add_recent("b", 3);
        recent.add_recent("c", 3);
        recent.add_recent("a", 3);
        recent.add_recent("d", 3);
        assert_eq!(recent.files(), &["d", "a", "c"]);
    }

    #[test]
    fn test_settings_missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"main_line_numbers_visible":true}"#).unwrap();
        assert!(settings.main_line_numbers_visible);
        assert!(settings.overview_visible);
        assert!(settings.filtered_line_numbers_visible);
    }
}
