//! Per-feature lifecycle state machine.

use super::feature::BoxedFeature;
use vdlaunch_shared::errors::{VdError, VdResult};

/// Lifecycle of one feature within a launch attempt.
///
/// ```text
/// NotStarted → SettingUp → SetUp ──→ TearingDown → TornDown
///                        ↘ FailedSetup           ↘ FailedTeardown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureState {
    NotStarted,
    SettingUp,
    SetUp,
    FailedSetup,
    TearingDown,
    TornDown,
    FailedTeardown,
}

impl FeatureState {
    pub fn can_transition_to(self, next: FeatureState) -> bool {
        use FeatureState::*;
        matches!(
            (self, next),
            (NotStarted, SettingUp)
                | (SettingUp, SetUp)
                | (SettingUp, FailedSetup)
                | (SetUp, TearingDown)
                | (TearingDown, TornDown)
                | (TearingDown, FailedTeardown)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FeatureState::FailedSetup | FeatureState::TornDown | FeatureState::FailedTeardown
        )
    }
}

/// Lifecycle states indexed like the features they track.
pub(crate) struct StateTable(Vec<FeatureState>);

impl StateTable {
    pub(crate) fn new(len: usize) -> Self {
        Self(vec![FeatureState::NotStarted; len])
    }

    pub(crate) fn get(&self, index: usize) -> FeatureState {
        self.0[index]
    }

    pub(crate) fn transition(
        &mut self,
        index: usize,
        next: FeatureState,
        feature: &str,
    ) -> VdResult<()> {
        let current = self.0[index];
        if !current.can_transition_to(next) {
            return Err(VdError::InvalidState(format!(
                "feature '{}' cannot move from {:?} to {:?}",
                feature, current, next
            )));
        }
        self.0[index] = next;
        Ok(())
    }
}

/// Features of one launch attempt together with their lifecycle state.
pub struct FeatureRun {
    pub(crate) features: Vec<BoxedFeature>,
    pub(crate) states: StateTable,
}

impl FeatureRun {
    pub(crate) fn new(features: Vec<BoxedFeature>) -> Self {
        let states = StateTable::new(features.len());
        Self { features, states }
    }

    pub(crate) fn transition(&mut self, index: usize, next: FeatureState) -> VdResult<()> {
        let FeatureRun { features, states } = self;
        states.transition(index, next, features[index].name())
    }

    pub fn state_of(&self, name: &str) -> Option<FeatureState> {
        self.features
            .iter()
            .position(|f| f.name() == name)
            .map(|i| self.states.get(i))
    }

    /// `(name, state)` pairs in registration order.
    pub fn states(&self) -> Vec<(&str, FeatureState)> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name(), self.states.get(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::feature::{Feature, FeatureCtx};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Feature for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn setup(&self, _ctx: &FeatureCtx) -> VdResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_legal_transitions() {
        use FeatureState::*;
        assert!(NotStarted.can_transition_to(SettingUp));
        assert!(SettingUp.can_transition_to(FailedSetup));
        assert!(SetUp.can_transition_to(TearingDown));
        assert!(TearingDown.can_transition_to(FailedTeardown));
    }

    #[test]
    fn test_failed_setup_is_never_torn_down() {
        assert!(!FeatureState::FailedSetup.can_transition_to(FeatureState::TearingDown));
        assert!(FeatureState::FailedSetup.is_terminal());
        assert!(!FeatureState::SetUp.is_terminal());
    }

    #[test]
    fn test_run_rejects_illegal_transition() {
        let mut run = FeatureRun::new(vec![Box::new(Noop)]);

        let err = run.transition(0, FeatureState::SetUp).unwrap_err();
        assert!(matches!(err, VdError::InvalidState(_)));

        run.transition(0, FeatureState::SettingUp).unwrap();
        run.transition(0, FeatureState::SetUp).unwrap();
        assert_eq!(run.state_of("noop"), Some(FeatureState::SetUp));
        assert_eq!(run.states(), vec![("noop", FeatureState::SetUp)]);
    }
}
