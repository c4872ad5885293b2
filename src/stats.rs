use crate::classify::StatDelta;

/// Counters for one download run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub downloaded: u64,
    pub failed: u64,
    pub retried: u64,
}

impl RunStats {
    /// Render the summary shown in the stats line
    pub fn render(&self, speed: Option<&str>) -> String {
        let mut out = format!(
            "Downloaded: {} | Failed: {} | Retry: {}",
            self.downloaded, self.failed, self.retried
        );
        if let Some(speed) = speed {
            out.push_str(" | ");
            out.push_str(speed);
        }
        out
    }
}

/// Accumulates stat deltas emitted by the classifier.
///
/// Owned by the draining loop; each event carries a snapshot so readers
/// never share the mutable state.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: RunStats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all counters
    pub fn reset(&mut self) {
        self.stats = RunStats::default();
    }

    /// Apply a delta and return the updated snapshot
    pub fn apply(&mut self, delta: StatDelta) -> RunStats {
        self.stats.downloaded += delta.downloaded;
        self.stats.failed += delta.failed;
        self.stats.retried += delta.retried;
        self.stats
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_reset_zeroes_all_counters() {
        let mut agg = StatsAggregator::new();
        agg.apply(StatDelta {
            downloaded: 3,
            failed: 1,
            retried: 2,
        });

        agg.reset();
        assert_eq!(agg.stats(), RunStats::default());
    }

    #[test]
    fn stats_counters_are_monotonically_non_decreasing() {
        let mut agg = StatsAggregator::new();
        let deltas = [
            StatDelta {
                downloaded: 1,
                ..StatDelta::default()
            },
            StatDelta::default(),
            StatDelta {
                failed: 1,
                ..StatDelta::default()
            },
            StatDelta {
                retried: 1,
                ..StatDelta::default()
            },
            StatDelta {
                downloaded: 1,
                ..StatDelta::default()
            },
        ];

        let mut prev = agg.stats();
        for delta in deltas {
            let next = agg.apply(delta);
            assert!(next.downloaded >= prev.downloaded);
            assert!(next.failed >= prev.failed);
            assert!(next.retried >= prev.retried);
            prev = next;
        }
        assert_eq!(
            prev,
            RunStats {
                downloaded: 2,
                failed: 1,
                retried: 1
            }
        );
    }

    #[test]
    fn stats_render_format() {
        let stats = RunStats {
            downloaded: 12,
            failed: 3,
            retried: 5,
        };

        assert_eq!(stats.render(None), "Downloaded: 12 | Failed: 3 | Retry: 5");
        assert_eq!(
            stats.render(Some("2.4 MB/s")),
            "Downloaded: 12 | Failed: 3 | Retry: 5 | 2.4 MB/s"
        );
    }
}
