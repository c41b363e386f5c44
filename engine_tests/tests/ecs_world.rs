use std::io;

use anyhow::Context as _;
use engine_core::prelude::*;
use engine_tests::{init_tracing, sorted, Calls, ErrorLog};

#[derive(Debug, Clone, PartialEq)]
struct Baz {
    fizz: &'static str,
    buzz: Vec<i32>,
}

#[test]
fn smoke_systems_see_only_fully_qualified_entities() -> anyhow::Result<()> {
    init_tracing();
    let calls = Calls::default();
    let mut world = World::new();

    let c = calls.clone();
    let system1 = System::new("system1")
        .query::<(i32, &'static str, Baz)>()
        .run(move |cx| {
            for (e, (foo, bar, baz)) in cx.query::<(i32, &'static str, Baz)>().all() {
                c.record(format!("system1 {e} {foo} {bar} {} {:?}", baz.fizz, baz.buzz));
            }
            Ok(())
        });
    let c = calls.clone();
    let system2 = System::new("system2")
        .query::<(i32, &'static str)>()
        .run(move |cx| {
            for (e, (foo, bar)) in cx.query::<(i32, &'static str)>().all() {
                c.record(format!("system2 {e} {foo} {bar}"));
            }
            Ok(())
        });
    let c = calls.clone();
    let system3 = System::new("system3").query::<(Baz,)>().run(move |cx| {
        for (e, (baz,)) in cx.query::<(Baz,)>().all() {
            c.record(format!("system3 {e} {}", baz.fizz));
        }
        Ok(())
    });
    world.add_systems([system1, system2, system3])?;

    let e1 = world.spawn(());
    let e2 = world.spawn(());
    let e3 = world.spawn(());
    let e4 = world.spawn(());
    let baz1 = Baz {
        fizz: "fizz1",
        buzz: vec![1, 2, 3],
    };
    let baz2 = Baz {
        fizz: "fizz2",
        buzz: vec![4, 5],
    };

    world.apply(e1, (10i32, "a", baz1));
    world.apply(e2, (20i32,));
    world.apply_many(vec![
        (e2, vec![BoxedComponent::new(baz2)]),
        (e3, vec![BoxedComponent::new(30i32), BoxedComponent::new("c")]),
        (e2, vec![BoxedComponent::new("b")]),
    ]);
    world.apply(e4, (40i32,));
    world.kill(e4);

    world.commit();
    let report = world.step();
    assert_eq!(report.failed_systems, 0);

    assert_eq!(
        calls.sorted(),
        sorted([
            &format!("system1 {e1} 10 a fizz1 [1, 2, 3]"),
            &format!("system1 {e2} 20 b fizz2 [4, 5]"),
            &format!("system2 {e1} 10 a"),
            &format!("system2 {e2} 20 b"),
            &format!("system2 {e3} 30 c"),
            &format!("system3 {e1} fizz1"),
            &format!("system3 {e2} fizz2"),
        ])
    );
    assert!(!world.is_alive(e4));
    Ok(())
}

#[test]
fn failures_are_isolated_per_item_and_per_system() -> anyhow::Result<()> {
    init_tracing();
    let errors = ErrorLog::default();
    let calls = Calls::default();
    let mut world = errors.world();

    let c = calls.clone();
    let system1 = System::new("system1").query::<(i32,)>().run(move |cx| {
        for (_, (foo,)) in cx.query::<(i32,)>().all() {
            cx.catch(|_| {
                1i32.checked_div(*foo).context("division by zero")?;
                c.record(format!("system1 {foo}"));
                Ok(())
            });
        }
        Ok(())
    });
    let c = calls.clone();
    let system2 = System::new("system2")
        .query::<(i32, &'static str)>()
        .run(move |cx| {
            for (_, (foo, bar)) in cx.query::<(i32, &'static str)>().all() {
                cx.catch(|_| {
                    1i32.checked_div(2 - foo.abs()).context("division by zero")?;
                    c.record(format!("system2 {foo} {bar}"));
                    Ok(())
                });
            }
            Ok(())
        });
    let system3 = System::new("system3").run(|_| {
        Err(io::Error::new(io::ErrorKind::Other, "disk on fire").into())
    });
    world.add_systems([system1, system2, system3])?;

    let e1 = world.spawn(());
    let e2 = world.spawn(());
    let e3 = world.spawn(());
    let e4 = world.spawn(());
    world.apply(e1, (3i32, "a"));
    world.apply_many([(e2, (2i32, "b")), (e3, (0i32, "c"))]);
    world.apply(e4, (-2i32, "d"));

    world.commit();
    let report = world.step();
    assert_eq!(report.failed_systems, 1);

    let errors = errors.drain();
    assert_eq!(errors.len(), 4);
    for err in &errors[..3] {
        assert!(format!("{err:#}").contains("division by zero"), "{err:#}");
    }
    assert!(errors[0].to_string().contains("system1"));
    assert!(errors[3].root_cause().downcast_ref::<io::Error>().is_some());
    assert!(errors[3].to_string().contains("system3"));

    assert_eq!(
        calls.sorted(),
        sorted([
            "system1 3",
            "system1 2",
            "system1 -2",
            "system2 3 a",
            "system2 0 c",
        ])
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scorched(i32);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tended(i32);

#[test]
fn commit_still_runs_after_a_system_fails() -> anyhow::Result<()> {
    init_tracing();
    let errors = ErrorLog::default();
    let mut world = errors.world();

    let arsonist = System::new("arsonist").query::<(i32,)>().run(|cx| {
        let seen: Vec<(Entity, i32)> = cx
            .query::<(i32,)>()
            .all()
            .map(|(e, (v,))| (e, *v))
            .collect();
        for (e, v) in seen {
            cx.apply(e, (Scorched(v),));
        }
        anyhow::bail!("gave up halfway")
    });
    let gardener = System::new("gardener").query::<(i32,)>().run(|cx| {
        let seen: Vec<(Entity, i32)> = cx
            .query::<(i32,)>()
            .all()
            .map(|(e, (v,))| (e, *v))
            .collect();
        for (e, v) in seen {
            cx.apply(e, (Tended(v * 10),));
        }
        Ok(())
    });
    world.add_systems([arsonist, gardener])?;
    world.register_query::<(Scorched, Tended)>()?;

    let e = world.spawn((7i32,));
    world.commit();
    let report = world.step();

    assert_eq!(report.failed_systems, 1);
    let errors = errors.drain();
    assert_eq!(errors.len(), 1);
    assert!(format!("{:#}", errors[0]).contains("gave up halfway"));

    let both: Vec<_> = world
        .query::<(Scorched, Tended)>()
        .all()
        .map(|(e, (s, t))| (e, *s, *t))
        .collect();
    assert_eq!(both, vec![(e, Scorched(7), Tended(70))]);
    Ok(())
}

#[test]
fn unapply_simple() -> anyhow::Result<()> {
    let calls = Calls::default();
    let mut world = World::new();
    let c = calls.clone();
    world.add_system(System::new("system1").query::<(i32,)>().run(move |cx| {
        for (e, (n,)) in cx.query::<(i32,)>().all() {
            c.record(format!("{e} {n}"));
        }
        Ok(())
    }))?;

    let es = world.spawn_many([(10i32,), (20,), (30,), (40,), (50,)]);
    world.commit();

    world.unapply::<(i32,)>(es[1]);
    world.unapply::<(i32,)>(es[4]);
    world.commit();
    world.step();

    assert_eq!(
        calls.sorted(),
        sorted([
            &format!("{} 10", es[0]),
            &format!("{} 30", es[2]),
            &format!("{} 40", es[3]),
        ])
    );
    Ok(())
}

#[test]
fn unapply_complex() -> anyhow::Result<()> {
    let calls = Calls::default();
    let mut world = World::new();

    let c = calls.clone();
    let system1 = System::new("system1")
        .query::<(i32, &'static str)>()
        .run(move |cx| {
            for (e, (n, s)) in cx.query::<(i32, &'static str)>().all() {
                c.record(format!("system1 {e} {n} {s}"));
            }
            Ok(())
        });
    let c = calls.clone();
    let system2 = System::new("system2").query::<(i32,)>().run(move |cx| {
        for (e, (n,)) in cx.query::<(i32,)>().all() {
            c.record(format!("system2 {e} {n}"));
        }
        Ok(())
    });
    let c = calls.clone();
    let system3 = System::new("system3")
        .query::<(&'static str,)>()
        .run(move |cx| {
            for (e, (s,)) in cx.query::<(&'static str,)>().all() {
                c.record(format!("system3 {e} {s}"));
            }
            Ok(())
        });
    let c = calls.clone();
    let system4 = System::new("system4").query::<(bool,)>().run(move |cx| {
        for (e, (b,)) in cx.query::<(bool,)>().all() {
            c.record(format!("system4 {e} {b}"));
        }
        Ok(())
    });
    world.add_systems([system1, system2, system3, system4])?;

    let e1 = world.spawn((100i32, "foo", true));
    let e2 = world.spawn((200i32, true));
    let e3 = world.spawn((300i32, "bar", true));
    let e4 = world.spawn((400i32, "baz", true));
    let e5 = world.spawn((500i32, "fizz", true));
    let e6 = world.spawn((600i32, "buzz", true));
    world.commit();

    world.unapply::<(i32, &'static str)>(e3);
    world.unapply::<(i32,)>(e4);
    world.unapply::<(&'static str, bool)>(e5);
    world.commit();
    world.step();

    assert_eq!(
        calls.sorted(),
        sorted([
            &format!("system1 {e1} 100 foo"),
            &format!("system1 {e6} 600 buzz"),
            &format!("system2 {e1} 100"),
            &format!("system2 {e2} 200"),
            &format!("system2 {e5} 500"),
            &format!("system2 {e6} 600"),
            &format!("system3 {e1} foo"),
            &format!("system3 {e4} baz"),
            &format!("system3 {e6} buzz"),
            &format!("system4 {e1} true"),
            &format!("system4 {e2} true"),
            &format!("system4 {e3} true"),
            &format!("system4 {e4} true"),
            &format!("system4 {e6} true"),
        ])
    );
    Ok(())
}

#[test]
fn repeated_removal_in_one_batch_is_idempotent() -> anyhow::Result<()> {
    let mut world = World::new();
    world.register_query::<(i32,)>()?;
    let e = world.spawn((1i32, "keep"));
    world.commit();
    assert!(world.query::<(i32,)>().contains(e));

    world.unapply::<(i32,)>(e);
    world.unapply::<(i32,)>(e);
    world.commit();

    assert!(!world.query::<(i32,)>().contains(e));
    assert_eq!(world.get::<&'static str>(e), Some(&"keep"));
    Ok(())
}

#[test]
fn kill_with_pending_edits_purges_everything() -> anyhow::Result<()> {
    let mut world = World::new();
    world.register_query::<(i32,)>()?;
    world.register_query::<(bool,)>()?;
    let e = world.spawn((1i32, "x"));
    world.commit();

    world.apply(e, (true,));
    world.unapply::<(&'static str,)>(e);
    world.kill(e);
    world.kill(e);
    let stats = world.commit();

    assert_eq!(stats.killed, 1);
    assert!(!world.is_alive(e));
    assert!(world.query::<(i32,)>().is_empty());
    assert!(world.query::<(bool,)>().is_empty());
    assert_eq!(world.entity_count(), 0);

    // Later edits against the dead id are dropped.
    world.apply(e, (2i32,));
    let stats = world.commit();
    assert_eq!(stats.dropped, 1);
    assert!(world.query::<(i32,)>().is_empty());
    Ok(())
}

#[test]
fn transform_runs_after_structural_changes() -> anyhow::Result<()> {
    let mut world = World::new();
    world.register_query::<(i32,)>()?;
    let a = world.spawn((1i32,));
    let b = world.spawn((1i32,));
    world.commit();

    world.schedule_transform::<i32, _>(a, |n| n * 10);
    world.apply(a, (5i32,));
    world.schedule_transform::<i32, _>(b, |n| n + 1);
    world.kill(b);
    let stats = world.commit();

    assert_eq!(stats.transformed, 1);
    assert_eq!(world.query::<(i32,)>().fetch(a)?, (&50,));
    assert!(matches!(
        world.query::<(i32,)>().fetch(b),
        Err(EcsError::NotInQuery { .. })
    ));
    Ok(())
}

#[test]
fn queued_writes_are_invisible_until_commit() -> anyhow::Result<()> {
    let calls = Calls::default();
    let mut world = World::new();

    let writer = System::new("writer").query::<(i32,)>().run(|cx| {
        let targets: Vec<Entity> = cx.query::<(i32,)>().entities().collect();
        for e in targets {
            cx.apply(e, (true,));
        }
        Ok(())
    });
    let c = calls.clone();
    let reader = System::new("reader").query::<(i32, bool)>().run(move |cx| {
        c.record(format!("seen {}", cx.query::<(i32, bool)>().len()));
        Ok(())
    });
    world.add_systems([writer, reader])?;

    world.spawn((7i32,));
    world.commit();
    world.step();
    world.step();

    assert_eq!(calls.sorted(), sorted(["seen 0", "seen 1"]));
    Ok(())
}

#[test]
fn systems_can_target_entities_spawned_this_tick() -> anyhow::Result<()> {
    let mut world = World::new();
    world.register_query::<(u8, bool)>()?;
    world.add_system(System::new("spawner").run(|cx| {
        if cx.try_resource::<Entity>().is_none() {
            let e = cx.spawn((1u8,));
            cx.apply(e, (true,));
            cx.insert_resource(e);
        }
        Ok(())
    }))?;

    world.step();
    let e = *world.resource::<Entity>();
    assert_eq!(world.query::<(u8, bool)>().get(e), Some((&1, &true)));

    world.step();
    assert_eq!(world.entity_count(), 1);
    Ok(())
}

#[test]
fn registration_is_frozen_after_first_step() {
    let mut world = World::new();
    world
        .add_system(System::new("first").run(|_| Ok(())))
        .expect("building phase accepts systems");
    world.step();

    let err = world
        .add_system(System::new("late").run(|_| Ok(())))
        .unwrap_err();
    assert_eq!(err, EcsError::ScheduleFrozen);
    assert_eq!(world.system_count(), 1);
}

#[test]
fn malformed_queries_fail_registration() {
    let mut world = World::new();
    let err = world
        .add_system(System::new("dup").query::<(i32, i32)>().run(|_| Ok(())))
        .unwrap_err();
    assert!(matches!(err, EcsError::MalformedQuery { .. }));

    let err = world
        .add_system(
            System::new("empty")
                .query_key(QueryKey::new(Vec::new()))
                .run(|_| Ok(())),
        )
        .unwrap_err();
    assert!(err.to_string().contains("`empty`"));
}

#[test]
#[should_panic(expected = "did not declare query")]
fn undeclared_query_panics() {
    let mut world = World::new();
    world
        .add_system(System::new("sneaky").run(|cx| {
            let _ = cx.query::<(i32,)>().len();
            Ok(())
        }))
        .expect("registration succeeds");
    world.step();
}

#[test]
#[should_panic(expected = "TickDelta")]
fn unset_resource_panics_with_type_name() {
    let mut world = World::new();
    world
        .add_system(System::new("needs_dt").run(|cx| {
            let TickDelta(_) = *cx.resource::<TickDelta>();
            Ok(())
        }))
        .expect("registration succeeds");
    world.step();
}
