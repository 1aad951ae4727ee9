//! Interval-aligned replay of the prepared series onto cluster resources.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cluster::{AnnotationPublisher, Fields, ResourceId};
use crate::config::AnnotatorConfig;
use crate::devices::SourceKind;
use crate::devices::types::round_to;
use crate::io::station::TIMESTAMP_FORMAT;

use super::clock::{Clock, wait_for_boundary};
use super::consumption::{ConsumptionSource, consumption_watts};
use super::equipment::EquipmentMap;
use super::series::CompositeRow;

/// How the prepared series is walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Each row once, then the run ends.
    Finite,
    /// Cycles through the rows until stopped.
    Live,
}

/// Source of rows for the replay loop.
pub trait RowFeed {
    fn next_row(&mut self) -> Option<CompositeRow>;
}

/// Yields every row once.
#[derive(Debug, Clone)]
pub struct FiniteFeed {
    rows: std::vec::IntoIter<CompositeRow>,
}

impl FiniteFeed {
    pub fn new(rows: Vec<CompositeRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowFeed for FiniteFeed {
    fn next_row(&mut self) -> Option<CompositeRow> {
        self.rows.next()
    }
}

/// Cycles through the rows indefinitely. An empty series yields nothing.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    rows: Vec<CompositeRow>,
    pos: usize,
}

impl LiveFeed {
    pub fn new(rows: Vec<CompositeRow>) -> Self {
        Self { rows, pos: 0 }
    }
}

impl RowFeed for LiveFeed {
    fn next_row(&mut self) -> Option<CompositeRow> {
        if self.rows.is_empty() {
            return None;
        }
        let row = self.rows[self.pos].clone();
        self.pos = (self.pos + 1) % self.rows.len();
        Some(row)
    }
}

pub fn feed_for(mode: FeedMode, rows: Vec<CompositeRow>) -> Box<dyn RowFeed> {
    match mode {
        FeedMode::Finite => Box::new(FiniteFeed::new(rows)),
        FeedMode::Live => Box::new(LiveFeed::new(rows)),
    }
}

/// Per-run constants of the replay loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySettings {
    pub interval: Duration,
    /// Forecast horizons in publish order; the first is the primary `forecast`.
    pub horizons: Vec<usize>,
    pub precision: u32,
    /// Extra scaling applied to mixed resources at publish time.
    pub mixed_publish_factor: f64,
    pub nominal_power_w: f64,
}

impl ReplaySettings {
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.replay.interval_secs),
            horizons: config.pipeline.horizons.clone(),
            precision: config.pipeline.rounding_precision,
            mixed_publish_factor: config.mixed.publish_factor,
            nominal_power_w: config.replay.nominal_power_w,
        }
    }
}

/// One resource's annotation for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub resource_id: ResourceId,
    pub timestamp: NaiveDateTime,
    pub kind: SourceKind,
    pub renewable: f64,
    /// Primary forecast (first configured horizon).
    pub forecast: f64,
    pub forecasts: BTreeMap<usize, f64>,
    /// Integer watts, when the consumption source reported this resource.
    pub consumption: Option<i64>,
}

impl AnnotationRecord {
    /// Metadata fields as published. Every value is a string.
    pub fn to_fields(&self, precision: u32) -> Fields {
        let fixed = |v: f64| format!("{:.prec$}", round_to(v, precision), prec = precision as usize);
        let mut fields = Fields::new();
        fields.insert(
            "timestamp".into(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        );
        fields.insert("equipment".into(), self.kind.to_string());
        fields.insert("renewable".into(), fixed(self.renewable));
        fields.insert("forecast".into(), fixed(self.forecast));
        for (horizon, value) in &self.forecasts {
            fields.insert(format!("forecast_{horizon}"), fixed(*value));
        }
        if let Some(watts) = self.consumption {
            fields.insert("consumption".into(), watts.to_string());
        }
        fields
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub failures: usize,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ticks: usize,
    /// Publishes attempted, including failed ones.
    pub published: usize,
    pub failures: usize,
    /// Whether the run ended on the stop signal rather than feed exhaustion.
    pub stopped: bool,
}

/// Walks composite rows and publishes one annotation per resource per row.
///
/// The first row is published immediately; every later row waits for the
/// next interval boundary of the wall clock. Publish failures are logged and
/// never block the remaining resources or ticks.
pub struct Replay<P: AnnotationPublisher, K: Clock> {
    settings: ReplaySettings,
    equipment: EquipmentMap,
    publisher: P,
    clock: K,
    consumption: Option<Box<dyn ConsumptionSource>>,
}

impl<P: AnnotationPublisher, K: Clock> Replay<P, K> {
    pub fn new(settings: ReplaySettings, equipment: EquipmentMap, publisher: P, clock: K) -> Self {
        Self {
            settings,
            equipment,
            publisher,
            clock,
            consumption: None,
        }
    }

    /// Queries `source` once per tick for consumption figures.
    pub fn with_consumption(mut self, source: Box<dyn ConsumptionSource>) -> Self {
        self.consumption = Some(source);
        self
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// Builds the record for one resource from `row`.
    ///
    /// Returns `None` when the row has no values for `kind`.
    pub fn resolve(
        &self,
        resource_id: &str,
        kind: SourceKind,
        row: &CompositeRow,
        consumption: Option<i64>,
    ) -> Option<AnnotationRecord> {
        let values = row.get(kind)?;
        let factor = match kind {
            SourceKind::Mixed => self.settings.mixed_publish_factor,
            SourceKind::Solar | SourceKind::Wind => 1.0,
        };
        let precision = self.settings.precision;
        let scale = |v: f64| round_to(v * factor, precision);

        let forecasts: BTreeMap<usize, f64> = self
            .settings
            .horizons
            .iter()
            .map(|h| (*h, scale(values.forecasts.get(h).copied().unwrap_or(0.0))))
            .collect();
        let forecast = self
            .settings
            .horizons
            .first()
            .and_then(|h| forecasts.get(h))
            .copied()
            .unwrap_or(0.0);

        Some(AnnotationRecord {
            resource_id: resource_id.to_string(),
            timestamp: row.timestamp,
            kind,
            renewable: scale(values.watts),
            forecast,
            forecasts,
            consumption,
        })
    }

    fn query_consumption(&mut self) -> HashMap<ResourceId, i64> {
        let Some(source) = self.consumption.as_mut() else {
            return HashMap::new();
        };
        match source.query_current_usage() {
            Ok(usage) => usage
                .into_iter()
                .map(|(id, fraction)| (id, consumption_watts(fraction, self.settings.nominal_power_w)))
                .collect(),
            Err(e) => {
                warn!(error = %e, "consumption unavailable for this tick");
                HashMap::new()
            }
        }
    }

    /// Publishes `row` to every equipped resource.
    pub fn tick(&mut self, row: &CompositeRow) -> TickReport {
        let consumption = self.query_consumption();
        let mut report = TickReport::default();

        let records: Vec<AnnotationRecord> = self
            .equipment
            .iter()
            .filter_map(|e| {
                let record = self.resolve(
                    &e.resource_id,
                    e.kind,
                    row,
                    consumption.get(&e.resource_id).copied(),
                );
                if record.is_none() {
                    warn!(resource = %e.resource_id, equipment = %e.kind, "row has no values for source");
                }
                record
            })
            .collect();

        for record in records {
            let fields = record.to_fields(self.settings.precision);
            report.published += 1;
            match self.publisher.patch_resource_metadata(&record.resource_id, &fields) {
                Ok(()) => debug!(
                    resource = %record.resource_id,
                    equipment = %record.kind,
                    renewable = record.renewable,
                    forecast = record.forecast,
                    "annotated"
                ),
                Err(e) => {
                    report.failures += 1;
                    warn!(resource = %record.resource_id, error = %e, "publish failed");
                }
            }
        }
        report
    }

    /// Runs until the feed is exhausted or `stop` turns true.
    ///
    /// The stop signal is checked before the first tick and at every
    /// boundary, and interrupts the wait between ticks.
    pub async fn run(&mut self, feed: &mut dyn RowFeed, mut stop: watch::Receiver<bool>) -> ReplaySummary {
        info!(
            resources = self.equipment.len(),
            interval_secs = self.settings.interval.as_secs(),
            "replay started"
        );
        let mut summary = ReplaySummary::default();
        let mut next = if *stop.borrow() { None } else { feed.next_row() };
        summary.stopped = *stop.borrow();

        while let Some(row) = next {
            let report = self.tick(&row);
            summary.ticks += 1;
            summary.published += report.published;
            summary.failures += report.failures;
            debug!(
                tick = summary.ticks,
                row = %row.timestamp.format(TIMESTAMP_FORMAT),
                published = report.published,
                failures = report.failures,
                "tick complete"
            );

            next = feed.next_row();
            if next.is_none() {
                break;
            }
            if wait_for_boundary(&self.clock, self.settings.interval, &mut stop).await {
                summary.stopped = true;
                break;
            }
        }

        info!(
            ticks = summary.ticks,
            published = summary.published,
            failures = summary.failures,
            stopped = summary.stopped,
            "replay finished"
        );
        summary
    }
}
