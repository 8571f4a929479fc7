use std::time::Duration;

use beatshot_core::{
    AccuracyData, Command, DamageEvent, DamageKind, Event, Extrema, GridConfig, TargetGuid, Vertex,
};
use beatshot_grid::{self as grid, SpatialIndex};
use beatshot_system_analytics::{location_accuracy, Analytics};

const CELL: u32 = 100;

fn spatial_index() -> SpatialIndex {
    let min = Vertex::new(3700, -500, 100);
    let max = min.offset(10 * CELL as i32, 10 * CELL as i32);
    let config = GridConfig::new(Extrema::new(min, max), CELL, CELL, 0.0).expect("valid grid");
    SpatialIndex::initialize(config)
}

fn guid(seed: u8) -> TargetGuid {
    TargetGuid::from_random_bytes([seed; 16])
}

fn damage(guid: TargetGuid, kind: DamageKind, location: Vertex, hit: bool) -> DamageEvent {
    DamageEvent {
        guid,
        kind,
        location,
        damage_delta: if hit { 1.0 } else { 0.0 },
        dealt_by_player: hit,
        hit_vulnerable: true,
        will_deactivate: false,
        will_destroy: true,
    }
}

fn hit_script() -> Vec<Command> {
    let location = Vertex::new(3700, -500, 100);
    vec![
        Command::FlagManaged {
            index: 0,
            guid: guid(1),
        },
        Command::FlagActivated {
            guid: guid(1),
            scale: 1.0,
        },
        Command::RecordDamage {
            event: damage(guid(1), DamageKind::Hit, location, true),
        },
        Command::FlagManaged {
            index: 99,
            guid: guid(2),
        },
        Command::FlagActivated {
            guid: guid(2),
            scale: 1.0,
        },
        Command::RecordDamage {
            event: damage(guid(2), DamageKind::SelfDamage, location, false),
        },
        Command::Tick {
            dt: Duration::from_millis(16),
        },
    ]
}

fn replay(commands: Vec<Command>, kind: DamageKind) -> Vec<AccuracyData> {
    let mut index = spatial_index();
    let mut analytics = Analytics::new(kind);
    let mut reports = Vec::new();

    for command in commands {
        let mut generated = Vec::new();
        grid::apply(&mut index, command, &mut generated);

        let mut analytics_events = Vec::new();
        analytics.handle(&generated, &index, &mut analytics_events);

        for event in analytics_events {
            if let Event::AccuracyUpdated { report } = event {
                reports.push(report);
            }
        }
    }
    reports
}

#[test]
fn hit_accuracy_is_published_once_per_tick() {
    let reports = replay(hit_script(), DamageKind::Hit);
    assert_eq!(reports.len(), 1, "expected one report after the tick");

    let report = &reports[0];
    assert_eq!(report.rows[0].total_spawns[0], 1);
    assert_eq!(report.rows[0].total_hits[0], 1);
    assert_eq!(report.accuracy_at(0, 0), Some(1.0));
    assert_eq!(report.rows[4].total_spawns[4], 1);
    assert_eq!(report.accuracy_at(4, 4), Some(0.0));
    assert_eq!(report.accuracy_at(2, 2), Some(-1.0));
}

#[test]
fn replay_is_deterministic() {
    assert_eq!(
        replay(hit_script(), DamageKind::Hit),
        replay(hit_script(), DamageKind::Hit)
    );
}

#[test]
fn no_report_without_completed_target() {
    let commands = vec![
        Command::FlagManaged {
            index: 4,
            guid: guid(7),
        },
        Command::FlagActivated {
            guid: guid(7),
            scale: 1.0,
        },
        Command::Tick {
            dt: Duration::from_millis(16),
        },
    ];
    assert!(replay(commands, DamageKind::Hit).is_empty());
}

#[test]
fn tracking_accuracy_compares_possible_and_dealt_damage() {
    let mut index = spatial_index();
    let location = Vertex::new(3700, -450, 150);
    let target = guid(3);

    index.flag_as_managed(0, target).expect("managed");
    index.flag_as_activated(target, 1.0).expect("activated");
    index.record_tracking_damage_possible(location);
    index.record_tracking_damage_possible(location);

    let mut event = damage(target, DamageKind::Tracking, location, true);
    event.will_destroy = false;
    index.record_damage(event).expect("recorded");

    let report = location_accuracy(&index, DamageKind::Tracking);
    assert_eq!(report.rows[0].total_spawns[0], 2);
    assert_eq!(report.rows[0].total_hits[0], 1);
    assert_eq!(report.accuracy_at(0, 0), Some(0.5));
    assert_eq!(report.accuracy_at(3, 1), Some(-1.0));

    let unsupported = location_accuracy(&index, DamageKind::Combined);
    assert_eq!(unsupported, AccuracyData::empty());
}
