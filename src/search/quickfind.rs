use crate::data::LineSource;

use super::{QuickFindPattern, SearchDirection};

const BLOCK_LINES: usize = 1_000;

/// Finds the next line matching `pattern`, starting at `from` (inclusive)
/// and moving in `direction`. Does not wrap around.
pub fn find_match(
    source: &dyn LineSource,
    pattern: &QuickFindPattern,
    from: u64,
    direction: SearchDirection,
) -> Option<u64> {
    if !pattern.is_active() {
        return None;
    }
    let total = source.line_count();
    if total == 0 {
        return None;
    }

    match direction {
        SearchDirection::Forward => {
            let mut first = from;
            while first < total {
                let lines = source.lines(first, BLOCK_LINES);
                if lines.is_empty() {
                    return None;
                }
                if let Some(i) = lines.iter().position(|l| pattern.is_line_matching(l)) {
                    return Some(first + i as u64);
                }
                first += lines.len() as u64;
            }
            None
        }
        SearchDirection::Backward => {
            let mut end = from.min(total - 1) + 1;
            while end > 0 {
                let first = end.saturating_sub(BLOCK_LINES as u64);
                let lines = source.lines(first, (end - first) as usize);
                if lines.is_empty() {
                    return None;
                }
                if let Some(i) = lines.iter().rposition(|l| pattern.is_line_matching(l)) {
                    return Some(first + i as u64);
                }
                end = first;
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecSource(Vec<String>);

    impl LineSource for VecSource {
        fn line_count(&self) -> u64 {
            self.0.len() as u64
        }

        fn lines(&self, first: u64, count: usize) -> Vec<String> {
            self.0.iter().skip(first as usize).take(count).cloned().collect()
        }
    }

    fn source(n: usize, hits: &[usize]) -> VecSource {
        VecSource(
            (0..n)
                .map(|i| {
                    if hits.contains(&i) {
                        format!("{} needle", i)
                    } else {
                        format!("{} hay", i)
                    }
                })
                .collect(),
        )
    }

    fn pattern(text: &str) -> QuickFindPattern {
        let mut p = QuickFindPattern::new();
        p.change_search_pattern(text, false);
        p
    }

    #[test]
    fn test_forward_and_backward() {
        let src = source(3_500, &[10, 2_500]);
        let p = pattern("needle");

        assert_eq!(find_match(&src, &p, 0, SearchDirection::Forward), Some(10));
        assert_eq!(find_match(&src, &p, 10, SearchDirection::Forward), Some(10));
        assert_eq!(find_match(&src, &p, 11, SearchDirection::Forward), Some(2_500));
        assert_eq!(find_match(&src, &p, 2_501, SearchDirection::Forward), None);

        assert_eq!(find_match(&src, &p, 3_499, SearchDirection::Backward), Some(2_500));
        assert_eq!(find_match(&src, &p, 2_499, SearchDirection::Backward), Some(10));
        assert_eq!(find_match(&src, &p, 9, SearchDirection::Backward), None);
        assert_eq!(find_match(&src, &p, 99_999, SearchDirection::Backward), Some(2_500));
    }

    #[test]
    fn test_inactive_pattern_finds_nothing() {
        let src = source(5, &[1]);
        assert_eq!(
            find_match(&src, &QuickFindPattern::new(), 0, SearchDirection::Forward),
            None
        );
        assert_eq!(
            find_match(&VecSource(Vec::new()), &pattern("x"), 0, SearchDirection::Backward),
            None
        );
    }
}
