//! Integration tests from station files through replay to scores.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::watch;

use common::{station_file, station_ts};
use renewable_annotator::cluster::{InMemoryCluster, ResourceDirectory};
use renewable_annotator::config::{AnnotatorConfig, ScoringConfig};
use renewable_annotator::devices::SourceKind;
use renewable_annotator::error::Error;
use renewable_annotator::sim::clock::SystemClock;
use renewable_annotator::sim::equipment::AssignmentRule;
use renewable_annotator::sim::replay::{FeedMode, Replay, ReplaySettings, feed_for};
use renewable_annotator::sim::score::ScoreMonitor;
use renewable_annotator::sim::series::{CompositeRow, prepare_series};

const SOLAR: &str = "\
STATIONS_ID;MESS_DATUM;  QN;DS_10;GS_10;SD_10;LS_10;eor
       3987;202107011150;    3;   10.5;   99.0;   0.160;-999;eor
       3987;202107011200;    3;   10.5;   60.0;   0.160;-999;eor
       3987;202107011210;    3;   11.0;   120.0;   0.167;-999;eor
       3987;202107011220;    3;   12.0;   garbage;   0.167;-999;eor
       3987;202107011230;    3;   12.0;   180.0;   0.167;-999;eor
       3987;202107011240;    3;   12.0;   240.0;   0.167;-999;eor
";

const WIND: &str = "\
STATIONS_ID;MESS_DATUM;  QN;FF_10;DD_10;eor
       3987;202107011200;    3;   2.0;  220;eor
       3987;202107011210;    3;   5.0;  230;eor
       3987;202107011220;    3;   5.0;  230;eor
       3987;202107011230;    3;   -999;  230;eor
       3987;202107011240;    3;   40.0;  240;eor
";

fn watts_of(row: &CompositeRow, kind: SourceKind) -> f64 {
    row.get(kind).expect("every row carries every source").watts
}

/// Config over 12:00..12:50 on the two fixtures. Files must outlive the config use.
fn config_for(solar: &tempfile::NamedTempFile, wind: &tempfile::NamedTempFile) -> AnnotatorConfig {
    let mut cfg = AnnotatorConfig::baseline();
    cfg.window.start = "202107011200".into();
    cfg.window.end = "202107011250".into();
    cfg.data.solar_path = solar.path().to_path_buf();
    cfg.data.wind_path = wind.path().to_path_buf();
    cfg.pipeline.horizons = vec![1, 2];
    cfg.replay.consumption = false;
    cfg
}

#[test]
fn series_keeps_only_valid_shared_timestamps() {
    let (solar, wind) = (station_file(SOLAR), station_file(WIND));
    let cfg = config_for(&solar, &wind);
    assert!(cfg.validate().is_empty());

    let rows = prepare_series(&cfg).expect("fixtures overlap the window");
    let stamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
    // 11:50 is outside the window, 12:20 has a bad solar value, 12:30 a missing wind value.
    assert_eq!(
        stamps,
        vec![
            station_ts("202107011200"),
            station_ts("202107011210"),
            station_ts("202107011240"),
        ]
    );
}

#[test]
fn series_values_follow_generation_models() {
    let (solar, wind) = (station_file(SOLAR), station_file(WIND));
    let rows = prepare_series(&config_for(&solar, &wind)).expect("fixtures overlap the window");
    assert_eq!(rows.len(), 3);

    let watts = |i: usize, kind: SourceKind| watts_of(&rows[i], kind);
    // 60 W/m² over the default panel gives 10 W; 2 m/s is below cut-in.
    assert_eq!(watts(0, SourceKind::Solar), 10.0);
    assert_eq!(watts(0, SourceKind::Wind), 0.0);
    assert_eq!(watts(0, SourceKind::Mixed), 6.0);
    // 40 m/s is clamped to the rating.
    assert_eq!(watts(2, SourceKind::Wind), 3000.0);

    for row in &rows {
        let (solar_w, wind_w, mixed_w) = (
            watts_of(row, SourceKind::Solar),
            watts_of(row, SourceKind::Wind),
            watts_of(row, SourceKind::Mixed),
        );
        assert!((mixed_w - (0.6 * solar_w + 0.6 * wind_w)).abs() < 0.051);
    }

    let last = &rows[2].get(SourceKind::Solar).unwrap().forecasts;
    assert_eq!(last[&2], 0.0);
    assert!(last[&1] > 0.0);
}

#[test]
fn empty_window_is_fatal() {
    let (solar, wind) = (station_file(SOLAR), station_file(WIND));
    let mut cfg = config_for(&solar, &wind);
    cfg.window.start = "202108010000".into();
    cfg.window.end = "202108012350".into();
    assert!(matches!(prepare_series(&cfg), Err(Error::EmptySeries { .. })));
}

#[tokio::test(start_paused = true)]
async fn replayed_annotations_feed_the_scores() {
    let (solar, wind) = (station_file(SOLAR), station_file(WIND));
    let mut cfg = config_for(&solar, &wind);
    cfg.replay.equipment = AssignmentRule::Alternating;
    let rows = prepare_series(&cfg).expect("fixtures overlap the window");
    let last = rows.last().cloned().unwrap();

    let cluster = Rc::new(RefCell::new(InMemoryCluster::with_nodes(2)));
    let ids = cluster.list_resources(None).unwrap();
    let mut replay = Replay::new(
        ReplaySettings::from_config(&cfg),
        cfg.replay.equipment.strategy().assign(&ids),
        Rc::clone(&cluster),
        SystemClock,
    );
    let mut feed = feed_for(FeedMode::Finite, rows);
    let (_tx, rx) = watch::channel(false);
    let summary = replay.run(feed.as_mut(), rx).await;
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.failures, 0);

    // Annotations reflect the last row: solar 40 W on node-0, rated wind on node-1.
    let solar_w = format!("{:.1}", watts_of(&last, SourceKind::Solar));
    assert_eq!(cluster.borrow().annotation("node-0", "renewable"), Some(solar_w.as_str()));
    assert_eq!(cluster.borrow().annotation("node-1", "renewable"), Some("3000.0"));
    assert_eq!(cluster.borrow().annotation("node-1", "timestamp"), Some("202107011240"));

    let scoring = ScoringConfig {
        publish: true,
        ..ScoringConfig::default()
    };
    let mut monitor = ScoreMonitor::new(
        &scoring,
        Rc::clone(&cluster),
        Some(Rc::clone(&cluster)),
        SystemClock,
        None,
    );
    let scores: Vec<u32> = monitor.cycle().iter().map(|r| r.score.rank_score).collect();
    assert_eq!(scores, vec![0, 10]);
    assert_eq!(cluster.borrow().annotation("node-1", "score"), Some("10"));
}
