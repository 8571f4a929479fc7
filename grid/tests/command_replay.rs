use std::time::Duration;

use beatshot_core::{
    Command, DamageEvent, DamageKind, Event, Extrema, GridConfig, RecentMemoryPolicy, TargetGuid,
    Vertex,
};
use beatshot_grid::{apply, query, SpatialIndex};

const CELL: u32 = 100;

fn spatial_index(policy: RecentMemoryPolicy) -> SpatialIndex {
    let min = Vertex::new(3700, -200, 100);
    let max = min.offset(4 * CELL as i32, 4 * CELL as i32);
    let config = GridConfig::new(Extrema::new(min, max), CELL, CELL, 0.0)
        .expect("valid grid")
        .with_recent_memory_policy(policy);
    SpatialIndex::initialize(config)
}

fn guid(seed: u8) -> TargetGuid {
    TargetGuid::from_random_bytes([seed; 16])
}

fn destroyed_by_player(index: &SpatialIndex, guid: TargetGuid) -> Command {
    let location = index.cell_by_guid(guid).expect("bound").bottom_left();
    Command::RecordDamage {
        event: DamageEvent {
            guid,
            kind: DamageKind::Hit,
            location,
            damage_delta: 1.0,
            dealt_by_player: true,
            hit_vulnerable: true,
            will_deactivate: false,
            will_destroy: true,
        },
    }
}

fn run(index: &mut SpatialIndex, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        apply(index, command, &mut events);
    }
    events
}

#[test]
fn target_lifecycle_publishes_flag_changes() {
    let mut index = spatial_index(RecentMemoryPolicy::TimeBased {
        duration: Duration::from_secs(1),
    });
    let target = guid(1);

    let events = run(
        &mut index,
        vec![
            Command::FlagManaged {
                index: 5,
                guid: target,
            },
            Command::FlagActivated {
                guid: target,
                scale: 1.0,
            },
        ],
    );
    assert_eq!(
        events,
        vec![
            Event::CellManaged {
                index: 5,
                guid: target
            },
            Event::CellActivated { index: 5 },
        ]
    );

    let damage = destroyed_by_player(&index, target);
    let events = run(&mut index, vec![damage]);
    assert_eq!(
        events,
        vec![Event::CellMadeRecent { index: 5 }, Event::CellReleased { index: 5 }]
    );
    assert_eq!(query::total_spawns_matrix(&index)[5], 1);
    assert_eq!(query::total_hits_matrix(&index)[5], 1);

    let half = Duration::from_millis(500);
    let events = run(&mut index, vec![Command::Tick { dt: half }]);
    assert_eq!(events, vec![Event::TimeAdvanced { dt: half }]);

    let events = run(&mut index, vec![Command::Tick { dt: half }]);
    assert_eq!(
        events,
        vec![
            Event::TimeAdvanced { dt: half },
            Event::RecentCleared { index: 5 }
        ]
    );
    assert_eq!(query::unflagged_indices(&index).len(), 16);
}

#[test]
fn unknown_targets_are_reported() {
    let mut index = spatial_index(RecentMemoryPolicy::default());
    let stranger = guid(9);
    let events = run(&mut index, vec![Command::FlagRecent { guid: stranger }]);
    assert_eq!(events, vec![Event::UnknownTarget { guid: stranger }]);
}

#[test]
fn restart_releases_every_cell() {
    let mut index = spatial_index(RecentMemoryPolicy::default());
    let _ = run(
        &mut index,
        vec![
            Command::FlagManaged {
                index: 0,
                guid: guid(1),
            },
            Command::FlagManaged {
                index: 15,
                guid: guid(2),
            },
        ],
    );
    assert_eq!(index.managed_cells().count(), 2);

    let events = run(&mut index, vec![Command::Restart]);
    assert_eq!(events, vec![Event::GridRestarted]);
    assert_eq!(index.managed_cells().count(), 0);
    assert_eq!(query::unflagged_indices(&index).len(), 16);
}

fn script() -> Vec<Command> {
    let mut commands = Vec::new();
    for (seed, cell) in [(1_u8, 3_usize), (2, 6), (3, 12)] {
        commands.push(Command::FlagManaged {
            index: cell,
            guid: guid(seed),
        });
        commands.push(Command::FlagActivated {
            guid: guid(seed),
            scale: 1.0,
        });
        commands.push(Command::Tick {
            dt: Duration::from_millis(250),
        });
    }
    commands
}

#[test]
fn command_replay_is_deterministic() {
    let mut first = spatial_index(RecentMemoryPolicy::CountBased { max_recent: 1 });
    let mut second = spatial_index(RecentMemoryPolicy::CountBased { max_recent: 1 });
    let first_events = run(&mut first, script());
    let second_events = run(&mut second, script());
    assert_eq!(first_events, second_events);

    let mut first_candidates = first.candidate_spawn_points(1.0);
    let second_candidates = second.candidate_spawn_points(1.0);
    assert_eq!(first_candidates, second_candidates);
    first.remove_overlapping_points_from_candidates(&mut first_candidates, 1.0);
    assert_eq!(first_candidates, second_candidates);
}
