use rand::SeedableRng;
use rand::rngs::SmallRng;
use seaward_adapt::{
    AdaptError, AdaptationMode, BanditConfig, BanditRule, ExploreImitateAdaptation, PeerSnapshot,
    PolicyMenu, ProbabilityRule, RewardAverage, SelectionRule, StepOutcome, StrategyFactory,
    every_n_days,
};
use seaward_core::{AgentId, Day, GridMap, StateView};
use slotmap::SlotMap;

type Tag = &'static str;

#[derive(Debug, Default)]
struct Boat {
    policy: Option<Tag>,
    objective: f64,
    installs: u32,
}

fn factory(tag: Tag) -> StrategyFactory<Tag> {
    Box::new(move |_state, _rng| tag)
}

fn menu() -> PolicyMenu<Tag, Tag> {
    PolicyMenu::from_entries([("a", factory("a")), ("b", factory("b")), ("c", factory("c"))])
        .expect("menu")
}

fn adaptation(
    probability: ProbabilityRule,
    selection: SelectionRule,
) -> Result<ExploreImitateAdaptation<Boat, Tag, Tag>, AdaptError> {
    ExploreImitateAdaptation::new(
        menu(),
        Box::new(|boat: &Boat| boat.policy),
        Box::new(|boat: &mut Boat, strategy: Tag| {
            boat.policy = Some(strategy);
            boat.installs += 1;
        }),
        Box::new(|boat: &Boat| boat.objective),
        probability,
        selection,
    )
}

fn ids(count: usize) -> Vec<AgentId> {
    let mut arena: SlotMap<AgentId, ()> = SlotMap::with_key();
    (0..count).map(|_| arena.insert(())).collect()
}

fn snapshot(id: AgentId, policy: Tag, objective: f64) -> PeerSnapshot<Tag> {
    PeerSnapshot {
        id,
        policy: Some(policy),
        objective,
    }
}

const IMITATE_ONLY: ProbabilityRule = ProbabilityRule::Fixed {
    explore: 0.0,
    imitate: 1.0,
};

#[test]
fn imitation_copies_the_best_strictly_better_peer() {
    let ids = ids(3);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let state = StateView::new(&map, Day(15));
    let mut rng = SmallRng::seed_from_u64(1);
    let mut adaptation = adaptation(IMITATE_ONLY, SelectionRule::UniformRandom).expect("adaptation");
    adaptation.enroll(ids[0]).expect("enroll");

    let mut boat = Boat {
        policy: Some("a"),
        objective: 1.0,
        installs: 0,
    };
    let peers = [
        snapshot(ids[0], "a", 1.0),
        snapshot(ids[1], "c", 2.0),
        snapshot(ids[2], "b", 3.0),
    ];
    let outcome = adaptation
        .step(ids[0], &mut boat, &peers, &state, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Imitated("b"));
    assert_eq!(boat.policy, Some("b"));
    assert_eq!(boat.installs, 1);

    boat.objective = 3.0;
    let outcome = adaptation
        .step(ids[0], &mut boat, &peers, &state, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Kept);
    assert_eq!(boat.installs, 1);

    let record = adaptation.state(ids[0]).expect("enrolled");
    assert_eq!(record.imitations(), 1);
    assert_eq!(record.last_decision(), AdaptationMode::Imitate);
    assert_eq!(record.last_reward(), Some(3.0));
}

#[test]
fn uniform_exploration_only_actuates_on_change() {
    let ids = ids(1);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let state = StateView::new(&map, Day(1));
    let mut rng = SmallRng::seed_from_u64(2);
    let mut adaptation = adaptation(
        ProbabilityRule::Fixed {
            explore: 1.0,
            imitate: 0.0,
        },
        SelectionRule::UniformRandom,
    )
    .expect("adaptation");
    adaptation.enroll(ids[0]).expect("enroll");

    let mut boat = Boat {
        policy: Some("a"),
        ..Boat::default()
    };
    let mut switches = 0;
    let mut visited = std::collections::HashSet::new();
    for _ in 0..60 {
        let before = boat.policy;
        match adaptation
            .step(ids[0], &mut boat, &[], &state, &mut rng)
            .expect("step")
        {
            StepOutcome::Explored(tag) => {
                assert_ne!(before, Some(tag));
                switches += 1;
            }
            StepOutcome::Kept => assert_eq!(before, boat.policy),
            other => panic!("unexpected outcome {other:?}"),
        }
        visited.insert(boat.policy);
    }
    assert_eq!(boat.installs, switches);
    assert_eq!(visited.len(), 3);
    assert_eq!(adaptation.state(ids[0]).expect("enrolled").explorations(), switches);
}

#[test]
fn vetoed_candidates_leave_the_policy_alone() {
    let ids = ids(2);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let state = StateView::new(&map, Day(1));
    let mut rng = SmallRng::seed_from_u64(3);
    let mut adaptation = adaptation(IMITATE_ONLY, SelectionRule::UniformRandom)
        .expect("adaptation")
        .with_validity(Box::new(|_current, candidate| *candidate != "c"));
    adaptation.enroll(ids[0]).expect("enroll");

    let mut boat = Boat {
        policy: Some("a"),
        ..Boat::default()
    };
    let outcome = adaptation
        .step(ids[0], &mut boat, &[snapshot(ids[1], "c", 10.0)], &state, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Vetoed("c"));
    assert_eq!(boat.policy, Some("a"));
    assert_eq!(boat.installs, 0);

    let outcome = adaptation
        .step(ids[0], &mut boat, &[snapshot(ids[1], "zzz", 10.0)], &state, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Vetoed("zzz"));
    assert_eq!(adaptation.state(ids[0]).expect("enrolled").vetoes(), 2);
}

#[test]
fn predicate_gates_the_whole_cycle() {
    let ids = ids(2);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let mut rng = SmallRng::seed_from_u64(4);
    let mut adaptation = adaptation(IMITATE_ONLY, SelectionRule::UniformRandom)
        .expect("adaptation")
        .with_predicate(every_n_days(15));
    adaptation.enroll(ids[0]).expect("enroll");
    let mut boat = Boat {
        policy: Some("a"),
        ..Boat::default()
    };
    let peers = [snapshot(ids[1], "b", 9.0)];

    let quiet = StateView::new(&map, Day(7));
    let outcome = adaptation
        .step(ids[0], &mut boat, &peers, &quiet, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Skipped);
    assert_eq!(adaptation.state(ids[0]).expect("enrolled").last_reward(), None);

    let due = StateView::new(&map, Day(30));
    let outcome = adaptation
        .step(ids[0], &mut boat, &peers, &due, &mut rng)
        .expect("step");
    assert_eq!(outcome, StepOutcome::Imitated("b"));
}

#[test]
fn bandit_driven_ucb_tries_each_tag_then_the_best() {
    let ids = ids(1);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let state = StateView::new(&map, Day(1));
    let mut rng = SmallRng::seed_from_u64(5);
    let mut adaptation = adaptation(
        ProbabilityRule::BanditDriven,
        SelectionRule::Bandit(BanditConfig::new(
            BanditRule::Ucb1 {
                min_reward: 0.0,
                max_reward: 5.0,
            },
            RewardAverage::Mean,
        )),
    )
    .expect("adaptation");
    adaptation.enroll(ids[0]).expect("enroll");

    let mut boat = Boat {
        policy: Some("a"),
        ..Boat::default()
    };
    let mut outcomes = Vec::new();
    for reward in [1.0, 5.0, 3.0] {
        boat.objective = reward;
        outcomes.push(
            adaptation
                .step(ids[0], &mut boat, &[], &state, &mut rng)
                .expect("step"),
        );
    }
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Explored("b"),
            StepOutcome::Explored("c"),
            StepOutcome::Explored("b"),
        ]
    );
    let bandit = adaptation
        .state(ids[0])
        .and_then(|state| state.bandit())
        .expect("bandit");
    assert_eq!(bandit.average(1), 5.0);
    assert_eq!(bandit.pulls(2), 1);
}

#[test]
fn fixed_seed_reproduces_outcomes() {
    let run = |seed| {
        let ids = ids(4);
        let map = GridMap::new(2, 2, 1.0).expect("map");
        let state = StateView::new(&map, Day(1));
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut adaptation = adaptation(
            ProbabilityRule::Annealed {
                initial: 0.6,
                decay: 0.9,
                floor: 0.1,
                imitate: 0.5,
            },
            SelectionRule::Bandit(BanditConfig::default()),
        )
        .expect("adaptation");
        adaptation.enroll(ids[0]).expect("enroll");
        let mut boat = Boat {
            policy: Some("a"),
            ..Boat::default()
        };
        let peers = [snapshot(ids[1], "b", 2.0), snapshot(ids[2], "c", 4.0)];
        (0..40)
            .map(|period| {
                boat.objective = f64::from(period % 5);
                adaptation
                    .step(ids[0], &mut boat, &peers, &state, &mut rng)
                    .expect("step")
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(77), run(77));
}

#[test]
fn construction_and_enrollment_faults() {
    let err = adaptation(ProbabilityRule::BanditDriven, SelectionRule::UniformRandom).unwrap_err();
    assert_eq!(err, AdaptError::BanditDrivenWithoutBandit);

    let err = adaptation(
        ProbabilityRule::Fixed {
            explore: -0.1,
            imitate: 0.5,
        },
        SelectionRule::UniformRandom,
    )
    .unwrap_err();
    assert!(matches!(err, AdaptError::InvalidProbability { .. }));

    let ids = ids(1);
    let map = GridMap::new(2, 2, 1.0).expect("map");
    let state = StateView::new(&map, Day(1));
    let mut rng = SmallRng::seed_from_u64(6);
    let mut adaptation = adaptation(IMITATE_ONLY, SelectionRule::UniformRandom).expect("adaptation");
    let mut boat = Boat::default();
    let err = adaptation
        .step(ids[0], &mut boat, &[], &state, &mut rng)
        .unwrap_err();
    assert_eq!(err, AdaptError::NotEnrolled(ids[0]));

    adaptation.enroll(ids[0]).expect("enroll");
    assert_eq!(adaptation.enrolled(), 1);
    assert!(adaptation.remove(ids[0]).is_some());
    assert_eq!(adaptation.enrolled(), 0);
}
