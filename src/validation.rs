//! # Recovery Plan Validation
//!
//! Synchronous validation at the API boundary: a plan that fails here never
//! enters the state machine and no execution record is created. Wave
//! dependencies must reference existing, strictly earlier waves, which also
//! guarantees the dependency graph is acyclic.

use crate::models::RecoveryPlan;
use std::collections::HashSet;

/// Plan-graph validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("plan {plan_id} has no waves")]
    EmptyPlan { plan_id: String },

    #[error("wave number {number} appears more than once")]
    DuplicateWaveNumber { number: u32 },

    #[error("wave {number} has no servers")]
    EmptyWave { number: u32 },

    #[error("server {server_id} appears in more than one wave")]
    DuplicateServer { server_id: String },

    #[error("wave {number} depends on unknown wave {depends_on}")]
    UnknownDependency { number: u32, depends_on: u32 },

    #[error(
        "wave {number} depends on wave {depends_on}, which does not precede it \
         (dependencies must form an acyclic graph over earlier waves)"
    )]
    CyclicDependency { number: u32, depends_on: u32 },
}

/// Validate a recovery plan's wave graph.
///
/// Rules: at least one wave; unique wave numbers; every wave non-empty; no
/// server in two waves; dependencies reference known, strictly earlier waves.
pub fn validate_plan(plan: &RecoveryPlan) -> Result<(), ValidationError> {
    if plan.waves.is_empty() {
        return Err(ValidationError::EmptyPlan {
            plan_id: plan.id.clone(),
        });
    }

    let mut numbers = HashSet::new();
    for wave in &plan.waves {
        if !numbers.insert(wave.number) {
            return Err(ValidationError::DuplicateWaveNumber {
                number: wave.number,
            });
        }
        if wave.server_ids.is_empty() {
            return Err(ValidationError::EmptyWave {
                number: wave.number,
            });
        }
    }

    let mut servers = HashSet::new();
    for wave in &plan.waves {
        for server_id in &wave.server_ids {
            if !servers.insert(server_id.as_str()) {
                return Err(ValidationError::DuplicateServer {
                    server_id: server_id.clone(),
                });
            }
        }
    }

    for wave in &plan.waves {
        for dep in &wave.depends_on {
            if !numbers.contains(dep) {
                return Err(ValidationError::UnknownDependency {
                    number: wave.number,
                    depends_on: *dep,
                });
            }
            // Earlier-wave-only references make cycles structurally
            // impossible; a self or forward reference is the cycle case.
            if *dep >= wave.number {
                return Err(ValidationError::CyclicDependency {
                    number: wave.number,
                    depends_on: *dep,
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FailurePolicy, PlanWave};
    use proptest::prelude::*;

    fn wave(number: u32, depends_on: Vec<u32>, servers: Vec<&str>) -> PlanWave {
        PlanWave {
            number,
            name: format!("wave-{number}"),
            depends_on,
            pause_before: false,
            server_ids: servers.into_iter().map(String::from).collect(),
        }
    }

    fn plan(waves: Vec<PlanWave>) -> RecoveryPlan {
        RecoveryPlan {
            id: "plan-1".to_string(),
            name: "fleet".to_string(),
            failure_policy: FailurePolicy::Lenient,
            waves,
        }
    }

    #[test]
    fn test_valid_plan_passes() {
        let plan = plan(vec![
            wave(1, vec![], vec!["s-1", "s-2"]),
            wave(2, vec![1], vec!["s-3"]),
            wave(3, vec![1, 2], vec!["s-4"]),
        ]);
        assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn test_empty_plan_rejected() {
        assert!(matches!(
            validate_plan(&plan(vec![])),
            Err(ValidationError::EmptyPlan { .. })
        ));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let plan = plan(vec![wave(1, vec![1], vec!["s-1"])]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::CyclicDependency {
                number: 1,
                depends_on: 1
            })
        ));
    }

    #[test]
    fn test_two_wave_cycle_rejected() {
        let plan = plan(vec![
            wave(1, vec![2], vec!["s-1"]),
            wave(2, vec![1], vec!["s-2"]),
        ]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let plan = plan(vec![wave(2, vec![1], vec!["s-1"])]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::UnknownDependency {
                number: 2,
                depends_on: 1
            })
        ));
    }

    #[test]
    fn test_duplicate_wave_number_rejected() {
        let plan = plan(vec![
            wave(1, vec![], vec!["s-1"]),
            wave(1, vec![], vec!["s-2"]),
        ]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::DuplicateWaveNumber { number: 1 })
        ));
    }

    #[test]
    fn test_duplicate_server_rejected() {
        let plan = plan(vec![
            wave(1, vec![], vec!["s-1"]),
            wave(2, vec![1], vec!["s-1"]),
        ]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::DuplicateServer { .. })
        ));
    }

    #[test]
    fn test_empty_wave_rejected() {
        let plan = plan(vec![wave(1, vec![], vec![])]);
        assert!(matches!(
            validate_plan(&plan),
            Err(ValidationError::EmptyWave { number: 1 })
        ));
    }

    proptest! {
        /// Chains where every wave depends on its predecessor are always
        /// acyclic and must validate.
        #[test]
        fn prop_linear_chains_always_valid(len in 1u32..20) {
            let waves: Vec<PlanWave> = (1..=len)
                .map(|n| PlanWave {
                    number: n,
                    name: format!("wave-{n}"),
                    depends_on: if n == 1 { vec![] } else { vec![n - 1] },
                    pause_before: false,
                    server_ids: vec![format!("s-{n}")],
                })
                .collect();
            prop_assert!(validate_plan(&plan(waves)).is_ok());
        }

        /// Any dependency pointing at the wave itself or a later wave is
        /// rejected as cyclic.
        #[test]
        fn prop_forward_references_always_rejected(
            len in 2u32..10,
            offender in 1u32..10,
        ) {
            let offender = (offender % len) + 1;
            let waves: Vec<PlanWave> = (1..=len)
                .map(|n| PlanWave {
                    number: n,
                    name: format!("wave-{n}"),
                    // The offender wave points at itself.
                    depends_on: if n == offender { vec![n] } else { vec![] },
                    pause_before: false,
                    server_ids: vec![format!("s-{n}")],
                })
                .collect();
            let rejected = matches!(
                validate_plan(&plan(waves)),
                Err(ValidationError::CyclicDependency { .. })
            );
            prop_assert!(rejected, "forward reference was not rejected as cyclic");
        }
    }
}
