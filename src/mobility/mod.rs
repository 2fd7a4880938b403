//! 移动性模型
//!
//! - `GridPositionAllocator`：按网格依次分配初始位置；
//! - `MobilityModelSpec::ConstantPosition`：静止；
//! - `MobilityModelSpec::RandomWalk2d`：在矩形区域内随机游走。每一段随机选择速度与方向，
//!   走完固定距离（或固定时间）后换向，碰到边界时反射。
//!
//! 位置按需推进：查询 `position(node, t)` 时把该节点的游走段推进到 `t`，
//! 不需要在事件队列里调度换向事件。每个节点的随机数由 `seed ^ node` 播种，
//! 因此相同的 seed 总能得到相同的轨迹。

use std::collections::BTreeMap;

use tracing::trace;

use crate::net::NodeId;
use crate::sim::SimTime;

/// 二维坐标（米）
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Vector2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 轴对齐矩形 [x_min, x_max] × [y_min, y_max]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rectangle {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn contains(&self, p: &Vector2) -> bool {
        p.x >= self.x_min && p.x <= self.x_max && p.y >= self.y_min && p.y <= self.y_max
    }

    fn clamp(&self, p: Vector2) -> Vector2 {
        Vector2 {
            x: p.x.clamp(self.x_min, self.x_max),
            y: p.y.clamp(self.y_min, self.y_max),
        }
    }
}

/// 网格宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridWidth {
    Fixed(usize),
    /// 站点数加上一个余量
    StationsPlus(usize),
}

impl GridWidth {
    pub fn resolve(self, stations: usize) -> usize {
        match self {
            GridWidth::Fixed(w) => w.max(1),
            GridWidth::StationsPlus(extra) => stations.saturating_add(extra).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridLayout {
    RowFirst,
    ColumnFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub min_x: f64,
    pub min_y: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub width: GridWidth,
    pub layout: GridLayout,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            delta_x: 5.0,
            delta_y: 10.0,
            width: GridWidth::StationsPlus(10),
            layout: GridLayout::RowFirst,
        }
    }
}

/// 网格位置分配器：每次调用 `next_position` 返回下一个格点
#[derive(Debug, Clone)]
pub struct GridPositionAllocator {
    cfg: GridConfig,
    width: usize,
    current: usize,
}

impl GridPositionAllocator {
    pub fn new(cfg: GridConfig, stations: usize) -> Self {
        Self {
            width: cfg.width.resolve(stations),
            cfg,
            current: 0,
        }
    }

    pub fn next_position(&mut self) -> Vector2 {
        let (col, row) = match self.cfg.layout {
            GridLayout::RowFirst => (self.current % self.width, self.current / self.width),
            GridLayout::ColumnFirst => (self.current / self.width, self.current % self.width),
        };
        self.current += 1;
        Vector2 {
            x: self.cfg.min_x + col as f64 * self.cfg.delta_x,
            y: self.cfg.min_y + row as f64 * self.cfg.delta_y,
        }
    }
}

/// 随机游走的换向条件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkMode {
    /// 每走这么多米换一次方向
    Distance(f64),
    /// 每过这么长时间换一次方向
    Time(SimTime),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomWalkConfig {
    pub bounds: Rectangle,
    pub min_speed: f64,
    pub max_speed: f64,
    pub mode: WalkMode,
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            bounds: Rectangle::new(-5000.0, 5000.0, -5000.0, 5000.0),
            min_speed: 2.0,
            max_speed: 4.0,
            mode: WalkMode::Distance(1.0),
        }
    }
}

/// 移动模型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MobilityModelSpec {
    ConstantPosition,
    RandomWalk2d(RandomWalkConfig),
}

/// 某个节点的移动性配置
#[derive(Debug, Clone, PartialEq)]
pub struct MobilityAssignment {
    pub node: NodeId,
    pub initial: Vector2,
    pub model: MobilityModelSpec,
}

/// 无线小区的移动性配置
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MobilityConfig {
    pub grid: GridConfig,
    pub walk: RandomWalkConfig,
}

/// 随机游走的一段
#[derive(Debug, Clone, Copy)]
struct Leg {
    start: SimTime,
    end: SimTime,
    from: Vector2,
    velocity: Vector2,
}

impl Leg {
    fn at(&self, t: SimTime) -> Vector2 {
        let dt = t.saturating_sub(self.start).as_secs_f64();
        Vector2 {
            x: self.from.x + self.velocity.x * dt,
            y: self.from.y + self.velocity.y * dt,
        }
    }
}

#[derive(Debug)]
struct RandomWalker {
    cfg: RandomWalkConfig,
    rng: fastrand::Rng,
    leg: Leg,
    course_changes: u64,
}

impl RandomWalker {
    fn new(cfg: RandomWalkConfig, initial: Vector2, seed: u64) -> Self {
        let mut w = Self {
            cfg,
            rng: fastrand::Rng::with_seed(seed),
            leg: Leg {
                start: SimTime::ZERO,
                end: SimTime::ZERO,
                from: cfg.bounds.clamp(initial),
                velocity: Vector2::default(),
            },
            course_changes: 0,
        };
        w.leg = w.next_leg(SimTime::ZERO, w.leg.from);
        w
    }

    fn next_leg(&mut self, start: SimTime, from: Vector2) -> Leg {
        let speed = self.cfg.min_speed + self.rng.f64() * (self.cfg.max_speed - self.cfg.min_speed);
        let dir = self.rng.f64() * std::f64::consts::TAU;
        let mut velocity = Vector2 {
            x: speed * dir.cos(),
            y: speed * dir.sin(),
        };
        // 贴边时反射朝外的速度分量
        let b = self.cfg.bounds;
        if from.x <= b.x_min && velocity.x < 0.0 || from.x >= b.x_max && velocity.x > 0.0 {
            velocity.x = -velocity.x;
        }
        if from.y <= b.y_min && velocity.y < 0.0 || from.y >= b.y_max && velocity.y > 0.0 {
            velocity.y = -velocity.y;
        }
        let mut secs = match self.cfg.mode {
            WalkMode::Distance(d) if speed > 0.0 => d / speed,
            WalkMode::Distance(_) => 1.0,
            WalkMode::Time(t) => t.as_secs_f64(),
        };
        // 在边界处提前结束这一段
        secs = secs.min(time_to_boundary(&self.cfg.bounds, from, velocity));
        let dur = SimTime::from_secs_f64(secs).max(SimTime::from_nanos(1));
        Leg {
            start,
            end: start.saturating_add(dur),
            from,
            velocity,
        }
    }

    fn advance_to(&mut self, t: SimTime) {
        while self.leg.end <= t {
            let end = self.leg.end;
            let pos = self.cfg.bounds.clamp(self.leg.at(end));
            self.leg = self.next_leg(end, pos);
            self.course_changes += 1;
            trace!(t = %end, x = pos.x, y = pos.y, "随机游走换向");
        }
    }

    fn position(&mut self, t: SimTime) -> Vector2 {
        self.advance_to(t);
        self.cfg.bounds.clamp(self.leg.at(t))
    }
}

fn time_to_boundary(b: &Rectangle, p: Vector2, v: Vector2) -> f64 {
    let axis = |pos: f64, vel: f64, lo: f64, hi: f64| {
        if vel > 0.0 {
            (hi - pos) / vel
        } else if vel < 0.0 {
            (lo - pos) / vel
        } else {
            f64::INFINITY
        }
    };
    axis(p.x, v.x, b.x_min, b.x_max)
        .min(axis(p.y, v.y, b.y_min, b.y_max))
        .max(0.0)
}

#[derive(Debug)]
enum NodeMobility {
    Constant(Vector2),
    Walk(RandomWalker),
}

/// 所有节点的移动性状态
#[derive(Debug, Default)]
pub struct MobilityRegistry {
    nodes: BTreeMap<NodeId, NodeMobility>,
}

impl MobilityRegistry {
    pub fn new(assignments: &[MobilityAssignment], seed: u64) -> Self {
        let nodes = assignments
            .iter()
            .map(|a| {
                let m = match a.model {
                    MobilityModelSpec::ConstantPosition => NodeMobility::Constant(a.initial),
                    MobilityModelSpec::RandomWalk2d(cfg) => NodeMobility::Walk(RandomWalker::new(
                        cfg,
                        a.initial,
                        seed ^ (a.node.0 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
                    )),
                };
                (a.node, m)
            })
            .collect();
        Self { nodes }
    }

    /// 节点在时刻 `t` 的位置；没有移动性配置的节点返回 None
    pub fn position(&mut self, node: NodeId, t: SimTime) -> Option<Vector2> {
        match self.nodes.get_mut(&node)? {
            NodeMobility::Constant(p) => Some(*p),
            NodeMobility::Walk(w) => Some(w.position(t)),
        }
    }

    /// 两个节点在时刻 `t` 的距离；任意一方没有位置时视为 0
    pub fn distance(&mut self, a: NodeId, b: NodeId, t: SimTime) -> f64 {
        match (self.position(a, t), self.position(b, t)) {
            (Some(pa), Some(pb)) => pa.distance(&pb),
            _ => 0.0,
        }
    }

    /// 截至目前该节点换向的次数
    pub fn course_changes(&self, node: NodeId) -> u64 {
        match self.nodes.get(&node) {
            Some(NodeMobility::Walk(w)) => w.course_changes,
            _ => 0,
        }
    }
}
