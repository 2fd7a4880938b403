use crate::sim::{Event, SimTime, Simulator, StopReason, World};
use std::any::Any;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct DummyWorld {
    ticks: usize,
    finished_at: Option<SimTime>,
}

impl World for DummyWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_tick(&mut self, _sim: &mut Simulator) {
        self.ticks = self.ticks.saturating_add(1);
    }

    fn on_finish(&mut self, sim: &Simulator) {
        self.finished_at = Some(sim.now());
    }
}

struct Push {
    id: u32,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for Push {
    fn execute(self: Box<Self>, _sim: &mut Simulator, _world: &mut dyn World) {
        let Push { id, log } = *self;
        log.lock().expect("log lock").push(id);
    }
}

/// 每次执行后在 `period` 之后重新调度自己，模拟周期性的 beacon
struct Periodic {
    period: SimTime,
    log: Arc<Mutex<Vec<u32>>>,
}

impl Event for Periodic {
    fn execute(self: Box<Self>, sim: &mut Simulator, _world: &mut dyn World) {
        let Periodic { period, log } = *self;
        log.lock().expect("log lock").push(0);
        sim.schedule_in(period, Periodic { period, log });
    }
}

fn push(id: u32, log: &Arc<Mutex<Vec<u32>>>) -> Push {
    Push {
        id,
        log: Arc::clone(log),
    }
}

#[test]
fn scheduled_events_order_by_time_then_seq() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(SimTime(10), push(1, &log));
    sim.schedule(SimTime(5), push(2, &log));
    sim.schedule(SimTime(10), push(3, &log));

    let mut world = DummyWorld::default();
    let outcome = sim.run(&mut world);

    assert_eq!(&*log.lock().expect("log lock"), &[2, 1, 3]);
    assert_eq!(world.ticks, 3);
    assert_eq!(outcome.reason, StopReason::QueueEmpty);
    assert_eq!(outcome.events, 3);
    assert_eq!(sim.now(), SimTime(10));
}

#[test]
fn schedule_in_the_past_is_clamped_to_now() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    let mut world = DummyWorld::default();
    sim.run_until(SimTime(20), &mut world);
    sim.schedule(SimTime(3), push(1, &log));
    sim.run(&mut world);

    assert_eq!(&*log.lock().expect("log lock"), &[1]);
    assert_eq!(sim.now(), SimTime(20));
}

#[test]
fn run_until_stops_a_self_rescheduling_event_at_the_horizon() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(
        SimTime::ZERO,
        Periodic {
            period: SimTime(10),
            log: Arc::clone(&log),
        },
    );

    let mut world = DummyWorld::default();
    let outcome = sim.run_until(SimTime(30), &mut world);

    // 0, 10, 20, 30 都执行；40 留在队列里
    assert_eq!(log.lock().expect("log lock").len(), 4);
    assert_eq!(outcome.reason, StopReason::Horizon);
    assert_eq!(outcome.final_time, SimTime(30));
    assert_eq!(sim.pending(), 1);
    assert_eq!(world.finished_at, Some(SimTime(30)));
}

#[test]
fn run_until_skips_events_after_until_and_advances_time() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(SimTime::ZERO, push(1, &log));
    sim.schedule(SimTime(10), push(2, &log));

    let mut world = DummyWorld::default();
    sim.run_until(SimTime(5), &mut world);

    assert_eq!(&*log.lock().expect("log lock"), &[1]);
    assert_eq!(world.ticks, 1);
    assert_eq!(sim.now(), SimTime(5));

    sim.run(&mut world);
    assert_eq!(&*log.lock().expect("log lock"), &[1, 2]);
    assert_eq!(world.ticks, 2);
    assert_eq!(sim.now(), SimTime(10));
}

#[test]
fn run_until_executes_events_scheduled_exactly_at_until() {
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut sim = Simulator::default();
    sim.schedule(SimTime(5), push(1, &log));

    let mut world = DummyWorld::default();
    let outcome = sim.run_until(SimTime(5), &mut world);

    assert_eq!(&*log.lock().expect("log lock"), &[1]);
    assert_eq!(outcome.reason, StopReason::QueueEmpty);
    assert_eq!(sim.now(), SimTime(5));
}

#[test]
fn run_until_advances_time_even_if_there_are_no_events() {
    let mut sim = Simulator::default();
    let mut world = DummyWorld::default();

    let outcome = sim.run_until(SimTime(7), &mut world);
    assert_eq!(sim.now(), SimTime(7));
    assert_eq!(world.ticks, 0);
    assert_eq!(outcome.events, 0);
    assert_eq!(world.finished_at, Some(SimTime(7)));
}
