use ballot_sdk::objects::{LiveMessage, OptionLabels, Scores, StatsPayload};

/// Aggregate view over the `votes` table.
///
/// Recomputed from scratch every cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySnapshot {
    pub counts: Scores,
    /// Number of stored rows, which is the number of distinct voters.
    pub total: i64,
    /// Rows whose `cast_at` falls inside the recent window.
    pub recent: i64,
    pub computed_at: time::OffsetDateTime,
}

impl TallySnapshot {
    pub fn new(counts: Scores, recent: i64, computed_at: time::OffsetDateTime) -> Self {
        Self {
            total: counts.total(),
            counts,
            recent,
            computed_at,
        }
    }

    /// Whether the per-choice counts differ from `baseline`.
    ///
    /// Comparing totals alone would miss a voter switching sides.
    pub fn differs_from(&self, baseline: Option<&Scores>) -> bool {
        baseline != Some(&self.counts)
    }

    pub fn to_stats(&self, options: OptionLabels) -> StatsPayload {
        StatsPayload {
            current: self.counts.clone(),
            total: self.total,
            recent: self.recent,
            timestamp: self.computed_at.unix_timestamp(),
            options,
        }
    }

    /// The `scores` and `stats` frames describing this snapshot.
    pub fn live_messages(&self, options: OptionLabels) -> [LiveMessage; 2] {
        [
            LiveMessage::Scores(self.counts.clone()),
            LiveMessage::Stats(self.to_stats(options)),
        ]
    }
}
