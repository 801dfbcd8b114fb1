//! Property tests for the step state machine invariants

use proptest::prelude::*;

use crate::steps::{StepRun, StepSpec, StepState};

#[derive(Debug, Clone)]
enum Transition {
    Advance(usize),
    Fail(usize, String),
    Complete(usize),
}

fn transition_strategy(step_count: usize) -> impl Strategy<Value = Transition> {
    prop_oneof![
        (0..step_count).prop_map(Transition::Advance),
        ((0..step_count), "[a-z ]{1,20}").prop_map(|(i, msg)| Transition::Fail(i, msg)),
        (0..step_count).prop_map(Transition::Complete),
    ]
}

fn run_with_steps(step_count: usize) -> StepRun {
    let mut run = StepRun::new("property run");
    run.set_steps(
        (0..step_count)
            .map(|i| StepSpec::new(format!("step-{i}"), format!("Step {i}")))
            .collect(),
    );
    run
}

fn assert_invariants(run: &StepRun) {
    let active = run
        .steps
        .iter()
        .filter(|s| s.state == StepState::Active)
        .count();
    let errored = run.steps.iter().filter(|s| s.state.is_error()).count();
    assert!(active <= 1, "more than one active step");
    assert!(errored <= 1, "more than one errored step");
    assert!(active + errored <= 1, "active and errored at the same time");

    if let Some(pivot) = run
        .steps
        .iter()
        .position(|s| s.state == StepState::Active || s.state.is_error())
    {
        assert!(
            run.steps[..pivot]
                .iter()
                .all(|s| s.state == StepState::Completed),
            "step before the pivot not completed"
        );
        assert!(
            run.steps[pivot + 1..]
                .iter()
                .all(|s| s.state == StepState::Idle),
            "step after the pivot not idle"
        );
    }
}

proptest! {
    #[test]
    fn arbitrary_transition_sequences_preserve_invariants(
        step_count in 1usize..8,
        transitions in prop::collection::vec(transition_strategy(8), 0..40),
    ) {
        let mut run = run_with_steps(step_count);

        for transition in transitions {
            match transition {
                Transition::Advance(i) if i < step_count => {
                    run.advance(&format!("step-{i}")).unwrap();
                }
                Transition::Fail(i, msg) if i < step_count => {
                    run.fail(&format!("step-{i}"), msg.clone()).unwrap();
                    let recorded = run.errored_step().unwrap();
                    prop_assert_eq!(
                        &recorded.state,
                        &StepState::Error { message: msg }
                    );
                }
                Transition::Complete(i) if i < step_count => {
                    run.complete(&format!("step-{i}")).unwrap();
                }
                // Out-of-range ids must fail loudly and leave state untouched.
                Transition::Advance(i) | Transition::Complete(i) => {
                    let before = run.clone();
                    let id = format!("step-{i}");
                    prop_assert!(run.advance(&id).is_err());
                    prop_assert_eq!(&before.steps, &run.steps);
                }
                Transition::Fail(i, msg) => {
                    let before = run.clone();
                    let id = format!("step-{i}");
                    prop_assert!(run.fail(&id, msg).is_err());
                    prop_assert_eq!(&before.steps, &run.steps);
                }
            }
            assert_invariants(&run);
        }
    }

    #[test]
    fn set_steps_always_resets(
        first in 1usize..6,
        second in 1usize..6,
        advance_to in 0usize..6,
    ) {
        let mut run = run_with_steps(first);
        if advance_to < first {
            run.advance(&format!("step-{advance_to}")).unwrap();
        }

        run.set_steps(
            (0..second)
                .map(|i| StepSpec::new(format!("fresh-{i}"), format!("Fresh {i}")))
                .collect(),
        );
        prop_assert_eq!(run.steps.len(), second);
        prop_assert!(run.steps.iter().all(|s| s.state == StepState::Idle));
        prop_assert!(run.steps.iter().all(|s| s.id.starts_with("fresh-")));
    }
}
