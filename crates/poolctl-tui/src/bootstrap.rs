//! Start-up data loading as an explicit, ordered pipeline.
//!
//! Each step fetches one part of the console state. The identity step is
//! the only one whose failure stops the run; every later step records its
//! error and the pipeline moves on.

use tracing::{debug, warn};

use crate::error::ConsoleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStep {
    Identity,
    Config,
    Keys,
    AdminUsers,
    AdminKeys,
    Models,
    ClientKeys,
    MyLogs,
    AllLogs,
    ProxyPool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Abort,
    Continue,
}

impl BootstrapStep {
    pub const PIPELINE: [BootstrapStep; 10] = [
        BootstrapStep::Identity,
        BootstrapStep::Config,
        BootstrapStep::Keys,
        BootstrapStep::AdminUsers,
        BootstrapStep::AdminKeys,
        BootstrapStep::Models,
        BootstrapStep::ClientKeys,
        BootstrapStep::MyLogs,
        BootstrapStep::AllLogs,
        BootstrapStep::ProxyPool,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BootstrapStep::Identity => "identity",
            BootstrapStep::Config => "config",
            BootstrapStep::Keys => "keys",
            BootstrapStep::AdminUsers => "admin users",
            BootstrapStep::AdminKeys => "admin keys",
            BootstrapStep::Models => "models",
            BootstrapStep::ClientKeys => "client keys",
            BootstrapStep::MyLogs => "my logs",
            BootstrapStep::AllLogs => "all logs",
            BootstrapStep::ProxyPool => "proxy pool",
        }
    }

    pub fn admin_only(&self) -> bool {
        matches!(
            self,
            BootstrapStep::Config
                | BootstrapStep::AdminUsers
                | BootstrapStep::AdminKeys
                | BootstrapStep::AllLogs
                | BootstrapStep::ProxyPool
        )
    }

    pub fn policy(&self) -> FailurePolicy {
        match self {
            BootstrapStep::Identity => FailurePolicy::Abort,
            _ => FailurePolicy::Continue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub steps: Vec<(BootstrapStep, StepOutcome)>,
    /// Set when an abort-policy step failed. Later steps were never run.
    pub aborted: bool,
}

impl BootstrapReport {
    pub fn outcome(&self, step: BootstrapStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> Vec<(BootstrapStep, &str)> {
        self.steps
            .iter()
            .filter_map(|(step, outcome)| match outcome {
                StepOutcome::Failed(e) => Some((*step, e.as_str())),
                _ => None,
            })
            .collect()
    }

    /// One-line status bar text.
    pub fn summary(&self) -> String {
        let failures = self.failures();
        match failures.as_slice() {
            [] => "loaded".to_string(),
            [(step, e)] if self.aborted => format!("{} failed: {e}", step.name()),
            [(step, e)] => format!("loaded with errors ({}: {e})", step.name()),
            many => format!("loaded with {} errors", many.len()),
        }
    }
}

/// Something that can run the individual steps, i.e. the console.
pub trait StepRunner {
    /// Asked before every step, so the identity step decides what follows.
    fn is_admin(&self) -> bool;
    fn run_step(&mut self, step: BootstrapStep) -> Result<(), ConsoleError>;
}

pub fn run_pipeline<R: StepRunner + ?Sized>(runner: &mut R) -> BootstrapReport {
    let mut report = BootstrapReport::default();
    for step in BootstrapStep::PIPELINE {
        if step.admin_only() && !runner.is_admin() {
            report.steps.push((step, StepOutcome::Skipped));
            continue;
        }
        match runner.run_step(step) {
            Ok(()) => {
                debug!("bootstrap step {} done", step.name());
                report.steps.push((step, StepOutcome::Done));
            }
            Err(e) => {
                warn!("bootstrap step {} failed: {e}", step.name());
                report.steps.push((step, StepOutcome::Failed(e.to_string())));
                if step.policy() == FailurePolicy::Abort {
                    report.aborted = true;
                    break;
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolctl_service::ServiceError;

    struct FakeRunner {
        admin: bool,
        failing: Vec<BootstrapStep>,
        ran: Vec<BootstrapStep>,
    }

    impl FakeRunner {
        fn new(admin: bool, failing: &[BootstrapStep]) -> Self {
            Self {
                admin,
                failing: failing.to_vec(),
                ran: Vec::new(),
            }
        }
    }

    impl StepRunner for FakeRunner {
        fn is_admin(&self) -> bool {
            self.admin
        }

        fn run_step(&mut self, step: BootstrapStep) -> Result<(), ConsoleError> {
            self.ran.push(step);
            if self.failing.contains(&step) {
                Err(ServiceError::RequestFailed {
                    status: Some(500),
                    message: "boom".into(),
                }
                .into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn admin_runs_every_step_in_order() {
        let mut runner = FakeRunner::new(true, &[]);
        let report = run_pipeline(&mut runner);
        assert_eq!(runner.ran, BootstrapStep::PIPELINE.to_vec());
        assert!(!report.aborted);
        assert_eq!(report.summary(), "loaded");
    }

    #[test]
    fn non_admin_skips_admin_steps() {
        let mut runner = FakeRunner::new(false, &[]);
        let report = run_pipeline(&mut runner);
        assert_eq!(
            runner.ran,
            vec![
                BootstrapStep::Identity,
                BootstrapStep::Keys,
                BootstrapStep::Models,
                BootstrapStep::ClientKeys,
                BootstrapStep::MyLogs,
            ]
        );
        assert_eq!(
            report.outcome(BootstrapStep::AllLogs),
            Some(&StepOutcome::Skipped)
        );
    }

    #[test]
    fn identity_failure_aborts() {
        let mut runner = FakeRunner::new(true, &[BootstrapStep::Identity]);
        let report = run_pipeline(&mut runner);
        assert!(report.aborted);
        assert_eq!(runner.ran, vec![BootstrapStep::Identity]);
        assert_eq!(report.outcome(BootstrapStep::Keys), None);
        assert_eq!(report.summary(), "identity failed: boom");
    }

    #[test]
    fn later_failures_continue() {
        let mut runner =
            FakeRunner::new(true, &[BootstrapStep::Keys, BootstrapStep::ProxyPool]);
        let report = run_pipeline(&mut runner);
        assert!(!report.aborted);
        assert_eq!(runner.ran.len(), BootstrapStep::PIPELINE.len());
        assert_eq!(report.failures().len(), 2);
        assert_eq!(report.summary(), "loaded with 2 errors");
    }
}
