use std::cmp::Ordering;
use std::collections::HashMap;

/// Members with scores, ranked by score.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SortedSet {
    scores: HashMap<String, f64>,
}

impl SortedSet {
    /// Insert or rescore `member`. Returns true if the member is new.
    pub fn insert(&mut self, member: String, score: f64) -> bool {
        self.scores.insert(member, score).is_none()
    }

    pub fn remove(&mut self, member: &str) -> bool {
        self.scores.remove(member).is_some()
    }

    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Members over the inclusive rank range `[start, stop]` in descending score order.
    ///
    /// Equal scores rank by descending byte order of the member. Negative ranks count from
    /// the end; out-of-range bounds are clamped.
    pub fn rev_range(&self, start: i64, stop: i64) -> Vec<String> {
        let len = self.scores.len() as i64;
        let Some((from, to)) = clamp_range(start, stop, len) else {
            return Vec::new();
        };

        let mut ranked: Vec<(&String, f64)> = self.scores.iter().map(|(m, s)| (m, *s)).collect();
        ranked.sort_by(|(a_member, a_score), (b_member, b_score)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_member.cmp(a_member))
        });

        ranked[from..=to]
            .iter()
            .map(|(member, _)| (*member).clone())
            .collect()
    }
}

fn clamp_range(start: i64, stop: i64, len: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let mut start = if start < 0 { start + len } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };
    if start < 0 {
        start = 0;
    }
    if start > stop || start >= len {
        return None;
    }
    if stop >= len {
        stop = len - 1;
    }
    Some((start as usize, stop as usize))
}
