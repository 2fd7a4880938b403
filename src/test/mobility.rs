use crate::mobility::{
    GridConfig, GridLayout, GridPositionAllocator, GridWidth, MobilityAssignment,
    MobilityModelSpec, MobilityRegistry, RandomWalkConfig, Rectangle, Vector2, WalkMode,
};
use crate::net::NodeId;
use crate::sim::SimTime;

fn walker(node: usize, initial: Vector2, cfg: RandomWalkConfig) -> MobilityAssignment {
    MobilityAssignment {
        node: NodeId(node),
        initial,
        model: MobilityModelSpec::RandomWalk2d(cfg),
    }
}

#[test]
fn grid_fills_rows_first() {
    let cfg = GridConfig {
        width: GridWidth::Fixed(3),
        ..GridConfig::default()
    };
    let mut grid = GridPositionAllocator::new(cfg, 5);
    let got: Vec<Vector2> = (0..5).map(|_| grid.next_position()).collect();
    assert_eq!(
        got,
        vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(5.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(0.0, 10.0),
            Vector2::new(5.0, 10.0),
        ]
    );
}

#[test]
fn grid_fills_columns_first() {
    let cfg = GridConfig {
        min_x: 1.0,
        min_y: 2.0,
        width: GridWidth::Fixed(2),
        layout: GridLayout::ColumnFirst,
        ..GridConfig::default()
    };
    let mut grid = GridPositionAllocator::new(cfg, 3);
    let got: Vec<Vector2> = (0..3).map(|_| grid.next_position()).collect();
    assert_eq!(
        got,
        vec![
            Vector2::new(1.0, 2.0),
            Vector2::new(1.0, 12.0),
            Vector2::new(6.0, 2.0),
        ]
    );
}

#[test]
fn grid_width_tracks_station_count() {
    assert_eq!(GridWidth::StationsPlus(10).resolve(5), 15);
    assert_eq!(GridWidth::Fixed(0).resolve(5), 1);
}

#[test]
fn constant_position_never_moves() {
    let mut reg = MobilityRegistry::new(
        &[MobilityAssignment {
            node: NodeId(7),
            initial: Vector2::new(25.0, 0.0),
            model: MobilityModelSpec::ConstantPosition,
        }],
        1,
    );
    for s in [0, 10, 360] {
        assert_eq!(
            reg.position(NodeId(7), SimTime::from_secs(s)),
            Some(Vector2::new(25.0, 0.0))
        );
    }
    assert_eq!(reg.course_changes(NodeId(7)), 0);
    assert_eq!(reg.position(NodeId(8), SimTime::ZERO), None);
}

#[test]
fn random_walk_stays_inside_bounds() {
    let bounds = Rectangle::new(-10.0, 10.0, -10.0, 10.0);
    let cfg = RandomWalkConfig {
        bounds,
        min_speed: 3.0,
        max_speed: 4.0,
        mode: WalkMode::Distance(5.0),
    };
    let mut reg = MobilityRegistry::new(&[walker(0, Vector2::new(9.0, -9.0), cfg)], 42);
    for ms in (0..120_000).step_by(250) {
        let p = reg
            .position(NodeId(0), SimTime::from_millis(ms))
            .expect("position");
        assert!(bounds.contains(&p), "{p:?} 越界");
    }
    assert!(reg.course_changes(NodeId(0)) > 0);
}

#[test]
fn random_walk_speed_is_bounded() {
    let cfg = RandomWalkConfig::default();
    let mut reg = MobilityRegistry::new(&[walker(8, Vector2::new(0.0, 0.0), cfg)], 7);
    let step = SimTime::from_millis(100);
    let mut t = SimTime::ZERO;
    let mut prev = reg.position(NodeId(8), t).expect("position");
    for _ in 0..200 {
        t = t.saturating_add(step);
        let p = reg.position(NodeId(8), t).expect("position");
        assert!(p.distance(&prev) <= cfg.max_speed * step.as_secs_f64() + 1e-9);
        prev = p;
    }
}

#[test]
fn one_metre_legs_change_course_often() {
    // 速度 2..4 m/s、每米换向：10 秒至少 20 次
    let mut reg = MobilityRegistry::new(
        &[walker(8, Vector2::new(0.0, 0.0), RandomWalkConfig::default())],
        1,
    );
    reg.position(NodeId(8), SimTime::from_secs(10));
    let changes = reg.course_changes(NodeId(8));
    assert!((20..=40).contains(&changes), "换向 {changes} 次");
}

#[test]
fn same_seed_gives_same_trajectory() {
    let assignments = [
        walker(8, Vector2::new(0.0, 0.0), RandomWalkConfig::default()),
        walker(9, Vector2::new(5.0, 0.0), RandomWalkConfig::default()),
    ];
    let mut a = MobilityRegistry::new(&assignments, 3);
    let mut b = MobilityRegistry::new(&assignments, 3);
    let mut c = MobilityRegistry::new(&assignments, 4);
    let t = SimTime::from_secs(30);

    let pa = a.position(NodeId(8), t);
    assert_eq!(pa, b.position(NodeId(8), t));
    assert_ne!(pa, c.position(NodeId(8), t));
    // 同一 seed 下不同节点的轨迹也不同
    assert_ne!(a.position(NodeId(9), t), b.position(NodeId(8), t));
    assert_eq!(a.distance(NodeId(8), NodeId(9), t), b.distance(NodeId(8), NodeId(9), t));
}

#[test]
fn timed_legs_change_course_on_a_fixed_period() {
    let cfg = RandomWalkConfig {
        mode: WalkMode::Time(SimTime::from_millis(500)),
        ..RandomWalkConfig::default()
    };
    let mut reg = MobilityRegistry::new(&[walker(8, Vector2::new(0.0, 0.0), cfg)], 5);

    // 每段 0.5 秒，速度 2..4 m/s：每段走 1..2 米
    let step = SimTime::from_millis(500);
    let mut t = SimTime::ZERO;
    let mut prev = reg.position(NodeId(8), t).expect("position");
    for _ in 0..20 {
        t = t.saturating_add(step);
        let p = reg.position(NodeId(8), t).expect("position");
        let d = p.distance(&prev);
        assert!((1.0 - 1e-9..=2.0 + 1e-9).contains(&d), "一段走了 {d} 米");
        prev = p;
    }
    assert_eq!(t, SimTime::from_secs(10));
    assert_eq!(reg.course_changes(NodeId(8)), 20);
}
