//! Line-change statistics.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Above this many cells the middle section is not aligned line by line.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Lines added and removed by an operation or a whole transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineStats {
    /// Lines present after but not before.
    pub added: u64,
    /// Lines present before but not after.
    pub removed: u64,
}

impl LineStats {
    /// Net line change.
    #[must_use]
    pub fn difference(&self) -> i64 {
        self.added as i64 - self.removed as i64
    }

    /// Computes the change between two versions of a file.
    ///
    /// `None` stands for a missing file.
    #[must_use]
    pub fn between(old: Option<&str>, new: Option<&str>) -> Self {
        let old: Vec<&str> = old.map(|s| s.lines().collect()).unwrap_or_default();
        let new: Vec<&str> = new.map(|s| s.lines().collect()).unwrap_or_default();

        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let old_rest = &old[prefix..];
        let new_rest = &new[prefix..];
        let suffix = old_rest
            .iter()
            .rev()
            .zip(new_rest.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        let old_mid = &old_rest[..old_rest.len() - suffix];
        let new_mid = &new_rest[..new_rest.len() - suffix];

        let common = if old_mid.len().saturating_mul(new_mid.len()) <= MAX_LCS_CELLS {
            lcs_len(old_mid, new_mid)
        } else {
            0
        };

        Self {
            added: (new_mid.len() - common) as u64,
            removed: (old_mid.len() - common) as u64,
        }
    }
}

impl Add for LineStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            added: self.added + rhs.added,
            removed: self.removed + rhs.removed,
        }
    }
}

impl AddAssign for LineStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for LineStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Length of the longest common subsequence, two-row table.
fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for x in a {
        for (j, y) in b.iter().enumerate() {
            curr[j + 1] = if x == y {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_counts_all_lines_added() {
        let stats = LineStats::between(None, Some("a\nb\nc\n"));
        assert_eq!(stats, LineStats { added: 3, removed: 0 });
        assert_eq!(stats.difference(), 3);
    }

    #[test]
    fn deleted_file_counts_all_lines_removed() {
        let stats = LineStats::between(Some("a\nb"), None);
        assert_eq!(stats, LineStats { added: 0, removed: 2 });
    }

    #[test]
    fn single_line_edit() {
        let stats = LineStats::between(Some("a\nb\nc"), Some("a\nB\nc"));
        assert_eq!(stats, LineStats { added: 1, removed: 1 });
    }

    #[test]
    fn insertion_in_middle() {
        let stats = LineStats::between(Some("a\nc"), Some("a\nb1\nb2\nc"));
        assert_eq!(stats, LineStats { added: 2, removed: 0 });
    }

    #[test]
    fn moved_line_uses_alignment() {
        let stats = LineStats::between(Some("x\na\nb\nc\ny"), Some("x\nb\nc\na\ny"));
        assert_eq!(stats, LineStats { added: 1, removed: 1 });
    }

    #[test]
    fn identical_content_has_no_change() {
        assert_eq!(LineStats::between(Some("same"), Some("same")), LineStats::default());
        assert_eq!(LineStats::between(None, None), LineStats::default());
    }

    #[test]
    fn stats_sum() {
        let total: LineStats = vec![
            LineStats { added: 1, removed: 2 },
            LineStats { added: 3, removed: 0 },
        ]
        .into_iter()
        .sum();
        assert_eq!(total, LineStats { added: 4, removed: 2 });
    }
}
