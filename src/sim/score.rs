//! Ranking scores derived from published renewable shares.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::cluster::{AnnotationPublisher, Fields, ResourceDirectory, ResourceId};
use crate::config::ScoringConfig;

use super::clock::{Clock, wait_for_boundary};

/// A resource's bounded ranking score for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub resource_id: ResourceId,
    pub share: f64,
    pub rank_score: u32,
}

/// Normalizes shares into scores in `[0, max_score]`.
///
/// `highest = max(1.0, max share)` and `score = floor(share * max_score / highest)`.
/// Negative shares count as 0.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use renewable_annotator::sim::score::calculate_scores;
///
/// let shares: BTreeMap<String, f64> =
///     [("a".into(), 0.0), ("b".into(), 0.5), ("c".into(), 1.0)].into_iter().collect();
/// let scores: Vec<u32> = calculate_scores(&shares, 10).iter().map(|s| s.rank_score).collect();
/// assert_eq!(scores, vec![0, 5, 10]);
/// ```
pub fn calculate_scores(shares: &BTreeMap<ResourceId, f64>, max_score: u32) -> Vec<Score> {
    let highest = shares.values().copied().fold(1.0_f64, f64::max);
    shares
        .iter()
        .map(|(id, share)| {
            let share = share.max(0.0);
            let rank = (share * f64::from(max_score) / highest).floor();
            Score {
                resource_id: id.clone(),
                share,
                rank_score: (rank as u32).min(max_score),
            }
        })
        .collect()
}

/// What the monitor records for one resource in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub score: Score,
    /// Workloads placed on the resource, when the directory could count them.
    pub workloads: Option<usize>,
    /// Last published `consumption` annotation, in watts.
    pub consumption: Option<i64>,
}

impl ScoreReport {
    /// `resource;share;score;workloads;consumption`. Unknown values are left empty.
    pub fn log_line(&self) -> String {
        let opt = |v: Option<String>| v.unwrap_or_default();
        format!(
            "{};{};{};{};{}",
            self.score.resource_id,
            self.score.share,
            self.score.rank_score,
            opt(self.workloads.map(|w| w.to_string())),
            opt(self.consumption.map(|c| c.to_string())),
        )
    }
}

/// Share carried by a resource's `renewable` annotation; 0.0 if absent or unparseable.
pub fn share_from_annotations(annotations: &Fields) -> f64 {
    annotations
        .get("renewable")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Reads every resource's share each scoring interval, logs the scores, and
/// optionally publishes them back as a `score` annotation.
pub struct ScoreMonitor<D: ResourceDirectory, P: AnnotationPublisher, K: Clock> {
    directory: D,
    publisher: Option<P>,
    clock: K,
    filter: Option<String>,
    max_score: u32,
    interval: Duration,
}

impl<D: ResourceDirectory, P: AnnotationPublisher, K: Clock> ScoreMonitor<D, P, K> {
    /// `publisher` is only used when scores are published back.
    pub fn new(
        config: &ScoringConfig,
        directory: D,
        publisher: Option<P>,
        clock: K,
        filter: Option<String>,
    ) -> Self {
        Self {
            directory,
            publisher: if config.publish { publisher } else { None },
            clock,
            filter,
            max_score: config.max_score,
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    /// One scoring pass. A directory failure skips the cycle.
    pub fn cycle(&mut self) -> Vec<ScoreReport> {
        let annotations = match self.directory.resource_annotations(self.filter.as_deref()) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "score cycle skipped");
                return Vec::new();
            }
        };
        let shares: BTreeMap<ResourceId, f64> = annotations
            .iter()
            .map(|(id, fields)| (id.clone(), share_from_annotations(fields)))
            .collect();
        let consumption: BTreeMap<&str, i64> = annotations
            .iter()
            .filter_map(|(id, fields)| {
                let watts = fields.get("consumption")?.trim().parse().ok()?;
                Some((id.as_str(), watts))
            })
            .collect();

        let mut reports = Vec::with_capacity(shares.len());
        for score in calculate_scores(&shares, self.max_score) {
            let workloads = match self.directory.workload_count(&score.resource_id) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(resource = %score.resource_id, error = %e, "workload count unavailable");
                    None
                }
            };
            let report = ScoreReport {
                consumption: consumption.get(score.resource_id.as_str()).copied(),
                workloads,
                score,
            };
            info!("{}", report.log_line());

            if let Some(publisher) = self.publisher.as_mut() {
                let score = &report.score;
                let fields: Fields = [("score".to_string(), score.rank_score.to_string())]
                    .into_iter()
                    .collect();
                if let Err(e) = publisher.patch_resource_metadata(&score.resource_id, &fields) {
                    warn!(resource = %score.resource_id, error = %e, "score publish failed");
                }
            }
            reports.push(report);
        }
        reports
    }

    /// Scores on every interval boundary until `stop` turns true.
    ///
    /// Returns the number of completed cycles.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> usize {
        info!(interval_secs = self.interval.as_secs(), "score monitor started");
        let mut cycles = 0;
        while !wait_for_boundary(&self.clock, self.interval, &mut stop).await {
            self.cycle();
            cycles += 1;
        }
        info!(cycles, "score monitor stopped");
        cycles
    }
}
