use quickcheck_macros::quickcheck;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rstest::{fixture, rstest};

use simcore::{
    process, Collector, Error, EventQueue, Measure, ProcessId, ProcessState, ResourceId, Script,
    Simulation, Step, Stop, Wake,
};

#[fixture]
fn sim() -> Simulation<Collector> {
    Simulation::new(Collector::default())
}

/// Holds `resource` for `hold` after an initial `delay`.
fn job(delay: f64, resource: ResourceId, hold: f64) -> Script {
    Script::builder()
        .timeout(delay)
        .acquire(resource)
        .emit_waited("wait")
        .timeout(hold)
        .release(resource)
        .build()
}

#[test]
fn shuffled_insertions_pop_in_fixed_order() {
    let times = [3.0, 1.0, 2.0, 1.0, 3.0, 0.0, 2.0, 1.0];
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    for _ in 0..20 {
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.shuffle(&mut rng);
        let mut queue = EventQueue::default();
        for &idx in &order {
            queue.schedule(times[idx], ProcessId::from(idx), idx);
        }
        // Stable sort: ties stay in scheduling order.
        let mut expected = order.clone();
        expected.sort_by(|&a, &b| times[a].partial_cmp(&times[b]).unwrap());
        let popped: Vec<usize> = std::iter::from_fn(|| queue.pop_earliest())
            .map(simcore::Event::into_payload)
            .collect();
        assert_eq!(popped, expected);
    }
}

#[rstest]
fn waiters_are_granted_in_request_order(mut sim: Simulation<Collector>) {
    let desk = sim.add_resource(1).unwrap();
    sim.spawn(
        "holder",
        Script::builder()
            .acquire(desk)
            .timeout(5.0)
            .release(desk)
            .build(),
    );
    for &(name, arrival, tag) in &[("a", 1.0, 1.0), ("b", 2.0, 2.0), ("c", 2.0, 3.0)] {
        sim.spawn(
            name,
            Script::builder()
                .timeout(arrival)
                .acquire(desk)
                .emit("granted", Measure::Value(tag))
                .emit("at", Measure::Now)
                .timeout(1.0)
                .release(desk)
                .build(),
        );
    }
    assert_eq!(sim.run().unwrap(), Stop::Exhausted);
    assert_eq!(sim.state().samples("granted"), &[1.0, 2.0, 3.0]);
    assert_eq!(sim.state().samples("at"), &[5.0, 6.0, 7.0]);
}

#[test]
fn second_process_waits_exactly_the_first_hold() {
    for &hold in &[0.0, 2.5, 7.25] {
        let mut sim = Simulation::new(Collector::default());
        let resource = sim.add_resource(1).unwrap();
        sim.spawn("first", job(0.0, resource, hold));
        sim.spawn("second", job(0.0, resource, hold));
        sim.run().unwrap();
        assert_eq!(sim.state().samples("wait"), &[0.0, hold]);
    }
}

#[quickcheck]
fn held_count_never_exceeds_capacity(capacity: u8, jobs: Vec<(u8, u8)>) -> bool {
    let capacity = usize::from(capacity % 3) + 1;
    let mut sim = Simulation::new(Vec::<usize>::new());
    let resource = sim.add_resource(capacity).unwrap();
    for (idx, &(start, hold)) in jobs.iter().enumerate() {
        let mut stage = 0;
        sim.spawn(
            format!("job {}", idx),
            process::from_fn::<Vec<usize>, _>(move |ctx| {
                stage += 1;
                let held = ctx.resource(resource)?.held_count();
                ctx.state_mut().push(held);
                match stage {
                    1 => Ok(Step::Timeout(f64::from(start % 5))),
                    2 => Ok(Step::Acquire(resource)),
                    3 => Ok(Step::Timeout(f64::from(hold % 4))),
                    _ => {
                        ctx.release(resource)?;
                        Ok(Step::Finish)
                    }
                }
            }),
        );
    }
    sim.run().is_ok()
        && sim.state().iter().all(|&held| held <= capacity)
        && sim.resource(resource).unwrap().held_count() == 0
}

#[rstest]
fn simultaneous_timeouts_resume_in_scheduling_order(mut sim: Simulation<Collector>) {
    for tag in 0..4 {
        sim.spawn(
            format!("p{}", tag),
            Script::builder()
                .timeout(1.0)
                .emit("order", Measure::Value(f64::from(tag)))
                .build(),
        );
    }
    sim.run().unwrap();
    assert_eq!(sim.state().samples("order"), &[0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn spawned_process_starts_after_spawner_yields() {
    let mut sim = Simulation::new(Vec::<String>::new());
    sim.spawn(
        "parent",
        process::from_fn::<Vec<String>, _>(|ctx| {
            let line = format!("{} {:?} at {}", ctx.name(), ctx.wake(), ctx.now());
            ctx.state_mut().push(line);
            if ctx.wake() == Wake::Start {
                ctx.spawn(
                    "child",
                    process::from_fn::<Vec<String>, _>(|ctx| {
                        let line = format!("{} {:?} at {}", ctx.name(), ctx.wake(), ctx.now());
                        ctx.state_mut().push(line);
                        Ok(Step::Finish)
                    }),
                );
                ctx.state_mut().push(String::from("parent continues"));
                Ok(Step::Timeout(1.0))
            } else {
                Ok(Step::Finish)
            }
        }),
    );
    sim.run().unwrap();
    assert_eq!(
        sim.state(),
        &vec![
            String::from("parent Start at 0"),
            String::from("parent continues"),
            String::from("child Start at 0"),
            String::from("parent Timeout at 1"),
        ]
    );
}

#[rstest]
fn failing_process_halts_with_identity_and_time(mut sim: Simulation<Collector>) {
    sim.spawn(
        "steady",
        Script::builder()
            .emit("tick", Measure::Now)
            .timeout(1.0)
            .emit("tick", Measure::Now)
            .timeout(5.0)
            .emit("tick", Measure::Now)
            .build(),
    );
    let faulty = sim.spawn(
        "faulty",
        process::from_fn::<Collector, _>(|ctx| {
            if ctx.wake() == Wake::Start {
                Ok(Step::Timeout(2.0))
            } else {
                Err("boom".into())
            }
        }),
    );
    match sim.run_until(10.0).unwrap_err() {
        Error::ProcessLogic {
            process,
            name,
            time,
            source,
        } => {
            assert_eq!(process, faulty);
            assert_eq!(name, "faulty");
            assert_eq!(time, 2.0);
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(sim.is_halted());
    // Samples recorded before the failure are kept.
    assert_eq!(sim.state().samples("tick"), &[0.0, 1.0]);
    assert!(matches!(sim.run_until(20.0), Err(Error::Halted)));
    assert!(matches!(sim.step(), Err(Error::Halted)));
}

#[rstest]
fn finishing_process_releases_what_it_holds(mut sim: Simulation<Collector>) {
    let resource = sim.add_resource(1).unwrap();
    sim.spawn(
        "forgetful",
        Script::builder().acquire(resource).timeout(3.0).build(),
    );
    sim.spawn(
        "patient",
        Script::builder()
            .acquire(resource)
            .emit_waited("wait")
            .release(resource)
            .build(),
    );
    sim.run().unwrap();
    assert_eq!(sim.state().samples("wait"), &[3.0]);
    assert_eq!(sim.resource(resource).unwrap().held_count(), 0);
}

#[rstest]
fn canceling_a_waiter_removes_it_from_the_queue(mut sim: Simulation<Collector>) {
    let resource = sim.add_resource(1).unwrap();
    sim.spawn(
        "holder",
        Script::builder()
            .acquire(resource)
            .timeout(4.0)
            .release(resource)
            .build(),
    );
    let mut waiters = Vec::new();
    for tag in 1..=2 {
        waiters.push(sim.spawn(
            format!("waiter {}", tag),
            Script::builder()
                .acquire(resource)
                .emit("granted", Measure::Value(f64::from(tag)))
                .release(resource)
                .build(),
        ));
    }
    assert_eq!(sim.run_until(1.0).unwrap(), Stop::Horizon);
    assert_eq!(sim.resource(resource).unwrap().queue_length(), 2);

    assert!(sim.cancel(waiters[0]).unwrap());
    assert_eq!(sim.process_state(waiters[0]), Some(ProcessState::Terminated));
    assert_eq!(sim.resource(resource).unwrap().queue_length(), 1);
    assert!(!sim.cancel(waiters[0]).unwrap());

    sim.run().unwrap();
    assert_eq!(sim.state().samples("granted"), &[2.0]);
}

#[rstest]
fn canceling_a_holder_hands_its_slot_over(mut sim: Simulation<Collector>) {
    let resource = sim.add_resource(1).unwrap();
    let holder = sim.spawn(
        "holder",
        Script::builder()
            .acquire(resource)
            .timeout(10.0)
            .release(resource)
            .build(),
    );
    sim.spawn(
        "waiter",
        Script::builder()
            .acquire(resource)
            .emit("at", Measure::Now)
            .release(resource)
            .build(),
    );
    sim.spawn("ticker", Script::builder().timeout(3.0).build());

    assert_eq!(sim.run_until(3.5).unwrap(), Stop::Horizon);
    assert_eq!(sim.now(), 3.0);
    assert!(sim.cancel(holder).unwrap());

    assert_eq!(sim.run().unwrap(), Stop::Exhausted);
    assert_eq!(sim.state().samples("at"), &[3.0]);
    // The holder's timeout was removed with it.
    assert_eq!(sim.now(), 3.0);
}

#[test]
fn process_cannot_cancel_itself() {
    let mut sim = Simulation::new(());
    sim.spawn(
        "selfish",
        process::from_fn::<(), _>(|ctx| {
            let id = ctx.id();
            ctx.cancel(id)?;
            Ok(Step::Finish)
        }),
    );
    match sim.run() {
        Err(Error::ProcessLogic { source, .. }) => assert!(matches!(
            source.downcast_ref::<Error>(),
            Some(Error::CancelRunning(_))
        )),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[rstest]
fn horizon_is_exclusive(mut sim: Simulation<Collector>) {
    sim.spawn(
        "late",
        Script::builder()
            .timeout(5.0)
            .emit("fired", Measure::Now)
            .build(),
    );
    assert_eq!(sim.run_until(5.0).unwrap(), Stop::Horizon);
    assert_eq!(sim.state().count("fired"), 0);
    assert_eq!(sim.pending_events(), 1);

    assert_eq!(sim.run_until(6.0).unwrap(), Stop::Exhausted);
    assert_eq!(sim.state().samples("fired"), &[5.0]);
}

#[rstest]
fn zero_horizon_runs_nothing(mut sim: Simulation<Collector>) {
    sim.spawn("p", Script::builder().emit("x", Measure::Now).build());
    assert_eq!(sim.run_until(0.0).unwrap(), Stop::Horizon);
    assert!(sim.state().is_empty());
    assert_eq!(sim.state().mean("x"), None);
    assert_eq!(sim.now(), 0.0);
}

#[rstest]
fn invalid_horizon_is_rejected_without_halting(mut sim: Simulation<Collector>) {
    assert!(matches!(
        sim.run_until(f64::NAN),
        Err(Error::InvalidHorizon(_))
    ));
    assert!(!sim.is_halted());
}

#[rstest]
fn negative_delay_fails_the_process(mut sim: Simulation<Collector>) {
    sim.spawn("backwards", Script::builder().timeout(-1.0).build());
    match sim.run() {
        Err(Error::ProcessLogic { name, source, .. }) => {
            assert_eq!(name, "backwards");
            assert!(matches!(
                source.downcast_ref::<Error>(),
                Some(Error::InvalidDelay(d)) if *d == -1.0
            ));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[rstest]
fn overflowing_timeout_fails_instead_of_stalling(mut sim: Simulation<Collector>) {
    sim.spawn(
        "far future",
        Script::builder()
            .timeout(f64::MAX)
            .timeout(f64::MAX)
            .emit("reached", Measure::Now)
            .build(),
    );
    match sim.run() {
        Err(Error::ProcessLogic { time, source, .. }) => {
            assert_eq!(time, f64::MAX);
            assert!(matches!(
                source.downcast_ref::<Error>(),
                Some(Error::InvalidDelay(d)) if *d == f64::MAX
            ));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(sim.pending_events(), 0);
    assert_eq!(sim.state().count("reached"), 0);
}

#[rstest]
fn zero_capacity_is_rejected(mut sim: Simulation<Collector>) {
    assert!(matches!(sim.add_resource(0), Err(Error::Capacity(0))));
}

#[rstest]
fn clock_ref_follows_simulation(mut sim: Simulation<Collector>) {
    let clock = sim.clock();
    sim.spawn("p", Script::builder().timeout(2.5).build());
    sim.run().unwrap();
    assert_eq!(clock.time(), 2.5);
}

#[test]
fn independent_simulations_run_in_parallel() {
    let run = || {
        let mut sim = Simulation::new(Collector::default());
        let resource = sim.add_resource(2).unwrap();
        for idx in 0..10 {
            sim.spawn(
                format!("job {}", idx),
                job(f64::from(idx) * 0.5, resource, 3.0),
            );
        }
        sim.run().unwrap();
        sim.into_state()
    };
    let handles: Vec<_> = (0..4).map(|_| std::thread::spawn(run)).collect();
    let results: Vec<Collector> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0].count("wait"), 10);
    assert!(results.iter().all(|r| r == &results[0]));
}
