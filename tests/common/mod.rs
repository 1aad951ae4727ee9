//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tempfile::NamedTempFile;

use renewable_annotator::cluster::{AnnotationPublisher, Fields, ResourceId};
use renewable_annotator::devices::SourceKind;
use renewable_annotator::error::PublishError;
use renewable_annotator::io::station::TIMESTAMP_FORMAT;
use renewable_annotator::sim::clock::{Clock, ManualClock};
use renewable_annotator::sim::replay::ReplaySettings;
use renewable_annotator::sim::series::CompositeRow;

/// Wall-clock instant on 2021-07-01.
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 7, 1, h, m, s).single().unwrap()
}

/// Station timestamp from `YYYYMMDDHHMM`.
pub fn station_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).expect("station timestamp")
}

/// `node-0`, `node-1`, ...
pub fn node_ids(n: usize) -> Vec<ResourceId> {
    (0..n).map(|i| format!("node-{i}")).collect()
}

/// Composite row with solar=10, wind=5 and their 0.6/0.6 blend (9.0).
pub fn reference_row(ts: &str) -> CompositeRow {
    CompositeRow::new(station_ts(ts))
        .with(SourceKind::Solar, 10.0, &[(6, 10.0)])
        .with(SourceKind::Wind, 5.0, &[(6, 5.0)])
        .with(SourceKind::Mixed, 9.0, &[(6, 9.0)])
}

/// `n` consecutive reference rows, ten minutes apart.
pub fn reference_rows(n: usize) -> Vec<CompositeRow> {
    (0..n)
        .map(|i| reference_row(&format!("2021070112{:02}", i * 10 % 60)))
        .collect()
}

/// One-minute interval, single horizon of 6, one decimal place.
pub fn minute_settings() -> ReplaySettings {
    ReplaySettings {
        interval: Duration::from_secs(60),
        horizons: vec![6],
        precision: 1,
        mixed_publish_factor: 1.0,
        nominal_power_w: 10_000.0,
    }
}

/// Writes `content` to a temporary station file.
pub fn station_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

/// One captured patch.
#[derive(Debug, Clone)]
pub struct Patch {
    pub resource: ResourceId,
    pub fields: Fields,
    pub at: DateTime<Utc>,
}

/// Records every patch with the clock time it arrived, and simulates
/// per-patch processing time by advancing the clock.
pub struct RecordingPublisher {
    pub clock: Rc<ManualClock>,
    pub processing: Duration,
    pub patches: Vec<Patch>,
    /// Resources whose patches are rejected.
    pub failing: Vec<ResourceId>,
}

impl RecordingPublisher {
    pub fn new(clock: Rc<ManualClock>) -> Self {
        Self {
            clock,
            processing: Duration::ZERO,
            patches: Vec::new(),
            failing: Vec::new(),
        }
    }

    /// Distinct tick start times, in order.
    pub fn tick_times(&self, per_tick: usize) -> Vec<DateTime<Utc>> {
        self.patches.chunks(per_tick).map(|c| c[0].at).collect()
    }
}

impl AnnotationPublisher for RecordingPublisher {
    fn patch_resource_metadata(&mut self, id: &str, fields: &Fields) -> Result<(), PublishError> {
        let now = self.clock.now();
        self.clock.advance(self.processing);
        self.patches.push(Patch {
            resource: id.to_string(),
            fields: fields.clone(),
            at: now,
        });
        if self.failing.iter().any(|f| f == id) {
            return Err(PublishError::Rejected {
                resource: id.to_string(),
                reason: "admission webhook denied".into(),
            });
        }
        Ok(())
    }
}
