//! Integration tests for the replay scheduler: values, timing, and failure handling.

mod common;

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use tokio::sync::watch;

use common::{RecordingPublisher, at, minute_settings, node_ids, reference_row, reference_rows};
use renewable_annotator::cluster::{InMemoryCluster, ResourceId};
use renewable_annotator::error::ExogenousQueryError;
use renewable_annotator::sim::clock::{Clock, ManualClock, SystemClock};
use renewable_annotator::sim::consumption::ConsumptionSource;
use renewable_annotator::sim::equipment::{EquipmentPolicy, SentinelFirst};
use renewable_annotator::sim::replay::{FiniteFeed, LiveFeed, Replay};

struct Offline;

impl ConsumptionSource for Offline {
    fn query_current_usage(&mut self) -> Result<HashMap<ResourceId, f64>, ExogenousQueryError> {
        Err(ExogenousQueryError("connection refused".into()))
    }
}

#[test]
fn reference_row_publishes_expected_values() {
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(4)),
        InMemoryCluster::with_nodes(4),
        SystemClock,
    );
    let report = replay.tick(&reference_row("202107011200"));
    assert_eq!(report.failures, 0);

    let cluster = replay.publisher();
    let got: Vec<(Option<&str>, Option<&str>)> = node_ids(4)
        .iter()
        .map(|id| (cluster.annotation(id, "equipment"), cluster.annotation(id, "renewable")))
        .collect();
    assert_eq!(
        got,
        vec![
            (Some("mixed"), Some("9.0")),
            (Some("solar"), Some("10.0")),
            (Some("wind"), Some("5.0")),
            (Some("solar"), Some("10.0")),
        ]
    );
    assert_eq!(cluster.annotation("node-0", "timestamp"), Some("202107011200"));
    assert_eq!(cluster.annotation("node-0", "forecast"), Some("9.0"));
    assert_eq!(cluster.annotation("node-0", "forecast_6"), Some("9.0"));
}

#[tokio::test(start_paused = true)]
async fn ticks_land_on_interval_boundaries() {
    let clock = Rc::new(ManualClock::starting_at(at(12, 0, 7)));
    let mut publisher = RecordingPublisher::new(Rc::clone(&clock));
    publisher.processing = Duration::from_secs(2);
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(4)),
        publisher,
        Rc::clone(&clock),
    );
    let mut feed = FiniteFeed::new(reference_rows(4));
    let (_tx, rx) = watch::channel(false);

    let summary = replay.run(&mut feed, rx).await;

    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.published, 16);
    assert!(!summary.stopped);
    // First tick is immediate; later ticks ignore the 8s of processing.
    assert_eq!(
        replay.publisher().tick_times(4),
        vec![at(12, 0, 7), at(12, 1, 0), at(12, 2, 0), at(12, 3, 0)]
    );
}

#[tokio::test(start_paused = true)]
async fn overrun_tick_skips_to_following_boundary() {
    let clock = Rc::new(ManualClock::starting_at(at(12, 0, 50)));
    let mut publisher = RecordingPublisher::new(Rc::clone(&clock));
    publisher.processing = Duration::from_secs(5);
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(4)),
        publisher,
        Rc::clone(&clock),
    );
    let mut feed = FiniteFeed::new(reference_rows(2));
    let (_tx, rx) = watch::channel(false);

    replay.run(&mut feed, rx).await;

    // 20s of publishing from 12:00:50 misses the 12:01 boundary.
    assert_eq!(
        replay.publisher().tick_times(4),
        vec![at(12, 0, 50), at(12, 2, 0)]
    );
}

#[tokio::test(start_paused = true)]
async fn stop_signal_ends_live_feed() {
    let clock = Rc::new(ManualClock::starting_at(at(12, 0, 7)));
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(2)),
        RecordingPublisher::new(Rc::clone(&clock)),
        Rc::clone(&clock),
    );
    let mut feed = LiveFeed::new(reference_rows(2));
    let (tx, rx) = watch::channel(false);

    let run = replay.run(&mut feed, rx);
    let stopper = async {
        tokio::time::sleep(Duration::from_secs(150)).await;
        let _ = tx.send(true);
    };
    let (summary, ()) = tokio::join!(run, stopper);

    assert!(summary.stopped);
    assert_eq!(summary.ticks, 3);
    assert_eq!(clock.now(), at(12, 2, 37));
}

#[tokio::test(start_paused = true)]
async fn failing_publisher_does_not_block_later_resources() {
    let clock = Rc::new(ManualClock::starting_at(at(12, 0, 0)));
    let mut publisher = RecordingPublisher::new(Rc::clone(&clock));
    publisher.failing = vec!["node-1".into()];
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(4)),
        publisher,
        Rc::clone(&clock),
    );
    let mut feed = FiniteFeed::new(reference_rows(2));
    let (_tx, rx) = watch::channel(false);

    let summary = replay.run(&mut feed, rx).await;

    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.published, 8);
    assert_eq!(summary.failures, 2);
    let order: Vec<&str> = replay
        .publisher()
        .patches
        .iter()
        .map(|p| p.resource.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["node-0", "node-1", "node-2", "node-3", "node-0", "node-1", "node-2", "node-3"]
    );
}

#[test]
fn failing_consumption_source_yields_records_without_consumption() {
    let mut replay = Replay::new(
        minute_settings(),
        SentinelFirst.assign(&node_ids(3)),
        InMemoryCluster::with_nodes(3),
        SystemClock,
    )
    .with_consumption(Box::new(Offline));

    let report = replay.tick(&reference_row("202107011200"));

    assert_eq!(report.published, 3);
    assert_eq!(report.failures, 0);
    for id in node_ids(3) {
        assert!(replay.publisher().annotation(&id, "renewable").is_some());
        assert_eq!(replay.publisher().annotation(&id, "consumption"), None);
    }
}
