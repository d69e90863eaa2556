use regex::Regex;
use std::sync::Arc;

use super::{LineSource, LogData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchProgress {
    pub percent: u8,
    pub matches: usize,
    pub complete: bool,
}

/// The lines of a `LogData` matching a search regex. The scan is done in
/// bounded steps on the caller's thread, so a view can interleave it with
/// input handling.
pub struct LogFilteredData {
    source: Arc<LogData>,
    pattern: Option<Regex>,
    matches: Vec<u64>,
    next_line: u64,
    caught_up: bool,
}

impl LogFilteredData {
    pub(super) fn new(source: Arc<LogData>) -> Self {
        Self {
            source,
            pattern: None,
            matches: Vec::new(),
            next_line: 0,
            caught_up: false,
        }
    }

    pub fn run_search(&mut self, regex: Regex) {
        self.pattern = Some(regex);
        self.restart_search();
    }

    /// Forgets the results but keeps the pattern; used after a reload.
    pub fn restart_search(&mut self) {
        self.matches.clear();
        self.next_line = 0;
        self.caught_up = false;
    }

    pub fn clear_search(&mut self) {
        self.pattern = None;
        self.restart_search();
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    pub fn is_searching(&self) -> bool {
        self.pattern.is_some() && self.next_line < self.source.line_count()
    }

    /// Scans at most `budget` more lines. Returns `None` when there is no
    /// pattern or nothing new to scan.
    pub fn search_step(&mut self, budget: usize) -> Option<SearchProgress> {
        let regex = self.pattern.as_ref()?;
        let total = self.source.line_count();

        if total < self.next_line {
            self.matches.clear();
            self.next_line = 0;
            self.caught_up = false;
        }
        if self.next_line >= total {
            return None;
        }

        // The last line seen may have been a partial one that grew since.
        if self.caught_up && self.next_line > 0 {
            self.next_line -= 1;
            if self.matches.last() == Some(&self.next_line) {
                self.matches.pop();
            }
        }
        self.caught_up = false;

        let lines = self.source.lines(self.next_line, budget.max(1));
        if lines.is_empty() {
            // Unreadable right now; give up on this pass.
            self.next_line = total;
            self.caught_up = true;
            return Some(self.progress(total));
        }

        for (i, line) in lines.iter().enumerate() {
            if regex.is_match(line) {
                self.matches.push(self.next_line + i as u64);
            }
        }
        self.next_line += lines.len() as u64;
        if self.next_line >= total {
            self.caught_up = true;
        }

        Some(self.progress(total))
    }

    fn progress(&self, total: u64) -> SearchProgress {
        let percent = if total == 0 {
            100
        } else {
            (self.next_line.min(total) * 100 / total) as u8
        };
        SearchProgress {
            percent,
            matches: self.matches.len(),
            complete: self.next_line >= total,
        }
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Line number in the source of the `index`-th match.
    pub fn matching_line(&self, index: u64) -> Option<u64> {
        self.matches.get(index as usize).copied()
    }

    pub fn is_line_matching(&self, line: u64) -> bool {
        self.matches.binary_search(&line).is_ok()
    }

    /// Index of the first match at or after `line`.
    pub fn index_of_line(&self, line: u64) -> u64 {
        self.matches.partition_point(|&m| m < line) as u64
    }

    /// Matching lines with their source line numbers.
    pub fn numbered_lines(&self, first: u64, count: usize) -> Vec<(u64, String)> {
        self.matches
            .iter()
            .skip(first as usize)
            .take(count)
            .filter_map(|&n| self.source.line(n).map(|text| (n, text)))
            .collect()
    }
}

impl LineSource for LogFilteredData {
    fn line_count(&self) -> u64 {
        self.matches.len() as u64
    }

    fn lines(&self, first: u64, count: usize) -> Vec<String> {
        self.numbered_lines(first, count)
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::load_blocking;

    fn search_all(filtered: &mut LogFilteredData) -> SearchProgress {
        let mut last = None;
        while let Some(progress) = filtered.search_step(2) {
            last = Some(progress);
            if progress.complete {
                break;
            }
        }
        last.expect("search made no progress")
    }

    #[test]
    fn test_search_collects_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        std::fs::write(&path, "INFO a\nERROR b\nINFO c\nERROR d\nWARN e\n").unwrap();

        let data = Arc::new(LogData::new());
        load_blocking(&data, &path);

        let mut filtered = data.new_filtered_view();
        assert!(filtered.search_step(10).is_none());

        filtered.run_search(Regex::new("ERROR").unwrap());
        let progress = search_all(&mut filtered);
        assert!(progress.complete);
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.matches, 2);
        assert_eq!(filtered.matching_line(0), Some(1));
        assert_eq!(filtered.matching_line(1), Some(3));
        assert!(filtered.is_line_matching(3));
        assert!(!filtered.is_line_matching(2));
        assert_eq!(filtered.index_of_line(2), 1);
        assert_eq!(
            filtered.numbered_lines(0, 5),
            vec![(1, "ERROR b".to_string()), (3, "ERROR d".to_string())]
        );
        assert_eq!(filtered.pattern(), Some("ERROR"));
    }

    #[test]
    fn test_search_continues_over_grown_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.log");
        std::fs::write(&path, "ERROR one\nINF").unwrap();

        let data = Arc::new(LogData::new());
        load_blocking(&data, &path);

        let mut filtered = data.new_filtered_view();
        filtered.run_search(Regex::new("ERR").unwrap());
        search_all(&mut filtered);
        assert_eq!(filtered.match_count(), 1);

        std::fs::write(&path, "ERROR one\nINFO ERR two\nERR three\n").unwrap();
        data.reload();
        while data.is_loading() {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        search_all(&mut filtered);
        assert_eq!(filtered.match_count(), 3);
        assert_eq!(filtered.matching_line(1), Some(1));
    }

    #[test]
    fn test_clear_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.log");
        std::fs::write(&path, "x\n").unwrap();
        let data = Arc::new(LogData::new());
        load_blocking(&data, &path);

        let mut filtered = data.new_filtered_view();
        filtered.run_search(Regex::new("x").unwrap());
        search_all(&mut filtered);
        assert_eq!(filtered.match_count(), 1);

        filtered.clear_search();
        assert_eq!(filtered.match_count(), 0);
        assert!(filtered.pattern().is_none());
        assert!(!filtered.is_searching());
    }
}
