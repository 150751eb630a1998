// libs/appointment-cell/src/services/policy.rs
use tracing::{debug, warn};

use crate::models::{Decision, ScheduleCandidate, SchedulingContext, SchedulingError, SchedulingPolicy};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::rules::{self, EligibilityRule};

/// Turns a candidate appointment and a snapshot of the world into a single
/// accept/reject decision. Holds no state between calls and performs no I/O.
pub struct SchedulingPolicyEngine {
    policy: SchedulingPolicy,
    rules: Vec<Box<dyn EligibilityRule>>,
    lifecycle_service: AppointmentLifecycleService,
}

impl SchedulingPolicyEngine {
    pub fn new(policy: SchedulingPolicy) -> Self {
        Self::with_rules(policy, rules::standard_rules())
    }

    /// Rules run in the given order; the first failure wins.
    pub fn with_rules(policy: SchedulingPolicy, rules: Vec<Box<dyn EligibilityRule>>) -> Self {
        let engine = Self {
            policy,
            rules,
            lifecycle_service: AppointmentLifecycleService::new(),
        };
        debug!("Scheduling rules in order: {:?}", engine.rule_names());
        engine
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn evaluate(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
    ) -> Result<Decision, SchedulingError> {
        candidate.validate()?;
        self.check_references(candidate, context)?;

        if let Some(original) = &candidate.original {
            if !self.lifecycle_service.can_modify(original.status) {
                return Err(SchedulingError::ImmutableAppointment(original.status));
            }
        }

        let outcome = self.rules.iter().try_for_each(|rule| {
            rule.check(candidate, context, &self.policy).map_err(|reason| {
                debug!("Rule {} rejected candidate: {}", rule.name(), reason);
                reason
            })
        });

        let requires_consent_form = rules::requires_consent_form(
            context.student,
            context.now,
            self.policy.consent_age_threshold,
            self.policy.calendar_offset,
        );

        match outcome {
            Ok(()) => {
                debug!(
                    "Candidate for teacher {} at {} accepted (consent form: {})",
                    candidate.teacher_id, candidate.scheduled_at, requires_consent_form
                );
                Ok(Decision::Accepted { requires_consent_form })
            }
            Err(reason) => {
                warn!(
                    "Candidate for teacher {} at {} rejected: {:?}",
                    candidate.teacher_id, candidate.scheduled_at, reason
                );
                Ok(Decision::Rejected { reason })
            }
        }
    }

    fn check_references(
        &self,
        candidate: &ScheduleCandidate,
        context: &SchedulingContext<'_>,
    ) -> Result<(), SchedulingError> {
        if context.student.id != candidate.student_id {
            return Err(SchedulingError::ReferenceNotFound {
                entity: "student",
                id: candidate.student_id.clone(),
            });
        }
        if context.teacher.id != candidate.teacher_id {
            return Err(SchedulingError::ReferenceNotFound {
                entity: "teacher",
                id: candidate.teacher_id.clone(),
            });
        }
        Ok(())
    }
}

impl Default for SchedulingPolicyEngine {
    fn default() -> Self {
        Self::new(SchedulingPolicy::default())
    }
}
