//! Pure step state machine for multi-step flows
//!
//! A [`StepRun`] tracks one user-initiated action: an ordered list of named
//! steps, each `Idle`, `Active`, `Completed` or `Error`. Transitions keep the
//! single-active-step invariant: everything before the active (or errored)
//! step is completed, everything after is idle. The machine is synchronous
//! and has no rendering concerns; the observable wrapper lives in
//! [`crate::progress`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EngineError;

/// State of one step within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Idle,
    Active,
    Completed,
    Error { message: String },
}

impl StepState {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Declaration of a step before any state is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSpec {
    pub id: String,
    pub description: String,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// One unit of a multi-step process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub description: String,
    pub state: StepState,
}

/// The ordered step sequence for one user-initiated action
///
/// Owned by the flow that created it; a new run fully replaces prior state
/// via [`StepRun::set_steps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRun {
    /// Unique id of this run, regenerated by every `set_steps`
    pub run_id: Uuid,

    /// Dialog heading
    pub title: String,

    /// Dialog visibility flag, independent of step state
    pub open: bool,

    pub steps: Vec<Step>,
}

impl StepRun {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            title: title.into(),
            open: false,
            steps: Vec::new(),
        }
    }

    /// Declare the steps for a fresh run. All steps start `Idle`; any prior
    /// run state is discarded wholesale.
    pub fn set_steps(&mut self, specs: Vec<StepSpec>) {
        self.run_id = Uuid::new_v4();
        self.steps = specs
            .into_iter()
            .map(|spec| Step {
                id: spec.id,
                description: spec.description,
                state: StepState::Idle,
            })
            .collect();
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Make the step with `id` the active one: everything before it becomes
    /// `Completed`, everything after is reset to `Idle`.
    ///
    /// An unknown id is an error, never a silent no-op; step ids are typed
    /// constants per flow and a mismatch is a bug in the calling flow.
    pub fn advance(&mut self, id: &str) -> Result<(), EngineError> {
        let target = self.position(id)?;
        self.apply(target, StepState::Active);
        Ok(())
    }

    /// Mark the step with `id` as failed, preserving `message` verbatim.
    /// Prior steps become `Completed`, later steps reset to `Idle`. The run
    /// makes no further forward progress until a new `set_steps`.
    pub fn fail(&mut self, id: &str, message: impl Into<String>) -> Result<(), EngineError> {
        let target = self.position(id)?;
        self.apply(
            target,
            StepState::Error {
                message: message.into(),
            },
        );
        Ok(())
    }

    /// Explicitly complete the step with `id` and everything before it.
    /// The machine never auto-completes the final step; terminal flows call
    /// this when their last external call has succeeded.
    pub fn complete(&mut self, id: &str) -> Result<(), EngineError> {
        let target = self.position(id)?;
        self.apply(target, StepState::Completed);
        Ok(())
    }

    /// Currently active step, if any
    pub fn active_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.state == StepState::Active)
    }

    /// Errored step, if any
    pub fn errored_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.state.is_error())
    }

    /// All steps completed
    pub fn is_finished(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.state == StepState::Completed)
    }

    pub fn has_error(&self) -> bool {
        self.errored_step().is_some()
    }

    fn position(&self, id: &str) -> Result<usize, EngineError> {
        if self.steps.is_empty() {
            return Err(EngineError::NoStepsDeclared);
        }
        self.steps
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| EngineError::unknown_step(id))
    }

    fn apply(&mut self, target: usize, target_state: StepState) {
        for (index, step) in self.steps.iter_mut().enumerate() {
            step.state = match index.cmp(&target) {
                std::cmp::Ordering::Less => StepState::Completed,
                std::cmp::Ordering::Equal => target_state.clone(),
                std::cmp::Ordering::Greater => StepState::Idle,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_step_run() -> StepRun {
        let mut run = StepRun::new("Minting hypercert");
        run.set_steps(vec![
            StepSpec::new("sign", "Awaiting signature"),
            StepSpec::new("submit", "Submitting transaction"),
            StepSpec::new("confirm", "Waiting for confirmation"),
        ]);
        run
    }

    #[test]
    fn set_steps_initializes_all_idle() {
        let run = three_step_run();
        assert_eq!(run.steps.len(), 3);
        assert!(run.steps.iter().all(|s| s.state == StepState::Idle));
        assert!(run.active_step().is_none());
    }

    #[test]
    fn advance_completes_prior_and_resets_later() {
        let mut run = three_step_run();
        run.advance("submit").unwrap();

        assert_eq!(run.steps[0].state, StepState::Completed);
        assert_eq!(run.steps[1].state, StepState::Active);
        assert_eq!(run.steps[2].state, StepState::Idle);
        assert_eq!(run.active_step().unwrap().id, "submit");
    }

    #[test]
    fn advancing_backwards_resets_forward_steps() {
        let mut run = three_step_run();
        run.advance("confirm").unwrap();
        run.advance("sign").unwrap();

        assert_eq!(run.steps[0].state, StepState::Active);
        assert_eq!(run.steps[1].state, StepState::Idle);
        assert_eq!(run.steps[2].state, StepState::Idle);
    }

    #[test]
    fn fail_preserves_message_verbatim() {
        let mut run = three_step_run();
        run.advance("submit").unwrap();
        run.fail("submit", "insufficient allowance").unwrap();

        assert_eq!(
            run.steps[1].state,
            StepState::Error {
                message: "insufficient allowance".to_string()
            }
        );
        assert_eq!(run.errored_step().unwrap().id, "submit");
        assert!(run.has_error());
        assert!(!run.is_finished());
    }

    #[test]
    fn unknown_id_fails_loudly() {
        let mut run = three_step_run();
        let err = run.advance("not-a-step").unwrap_err();
        assert!(matches!(err, EngineError::UnknownStep { .. }));

        let err = run.fail("also-missing", "boom").unwrap_err();
        assert!(matches!(err, EngineError::UnknownStep { .. }));
    }

    #[test]
    fn transition_before_set_steps_is_rejected() {
        let mut run = StepRun::new("empty");
        assert!(matches!(
            run.advance("anything").unwrap_err(),
            EngineError::NoStepsDeclared
        ));
    }

    #[test]
    fn final_step_needs_explicit_completion() {
        let mut run = three_step_run();
        run.advance("confirm").unwrap();
        assert!(!run.is_finished());

        run.complete("confirm").unwrap();
        assert!(run.is_finished());
        assert!(run.steps.iter().all(|s| s.state == StepState::Completed));
    }

    #[test]
    fn set_steps_replaces_prior_run_wholesale() {
        let mut run = three_step_run();
        run.advance("confirm").unwrap();
        let old_run_id = run.run_id;

        run.set_steps(vec![StepSpec::new("upload", "Uploading allowlist")]);
        assert_ne!(run.run_id, old_run_id);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].state, StepState::Idle);
        assert!(run.steps.iter().all(|s| s.id != "confirm"));
    }

    #[test]
    fn single_active_step_invariant_across_transitions() {
        let mut run = three_step_run();
        for id in ["sign", "submit", "sign", "confirm", "submit"] {
            run.advance(id).unwrap();
            let active = run
                .steps
                .iter()
                .filter(|s| s.state == StepState::Active)
                .count();
            assert_eq!(active, 1);

            let active_index = run.steps.iter().position(|s| s.state == StepState::Active);
            if let Some(i) = active_index {
                assert!(run.steps[..i].iter().all(|s| s.state == StepState::Completed));
                assert!(run.steps[i + 1..].iter().all(|s| s.state == StepState::Idle));
            }
        }
    }
}
