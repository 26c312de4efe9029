//! Property-based tests for the verification state machine
//!
//! These drive the pure transition function the way the runtime would:
//! every `ScheduleCheck` is answered with `CheckDue`, every `RunCheck` with
//! `CheckCompleted`, until no effect asks for more.

use super::transition::*;
use super::*;
use crate::notify::Severity;
use proptest::prelude::*;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Default)]
struct Trace {
    checks: u32,
    successes: u32,
    failures: u32,
    final_state: VerifyState,
}

/// Run one session to quiescence. `answer(n)` decides check `n` (1-based).
fn drive(policy: &VerifyPolicy, mut answer: impl FnMut(u32) -> CheckOutcome) -> Trace {
    let session_id = Uuid::new_v4();
    let mut trace = Trace::default();
    let mut state = VerifyState::Idle;
    let mut queue = vec![Event::Submit {
        session_id,
        tx_id: "5xTx".to_string(),
    }];

    while let Some(event) = queue.pop() {
        let result = transition(&state, policy, event).expect("live session accepts its own events");
        state = result.new_state;
        for effect in result.effects {
            match effect {
                Effect::ScheduleCheck {
                    session_id,
                    attempt,
                    ..
                } => queue.push(Event::CheckDue {
                    session_id,
                    attempt,
                }),
                Effect::RunCheck {
                    session_id,
                    attempt,
                    ..
                } => {
                    trace.checks += 1;
                    queue.push(Event::CheckCompleted {
                        session_id,
                        attempt,
                        outcome: answer(attempt),
                    });
                }
                Effect::Notify(n) => match n.severity {
                    Severity::Success => trace.successes += 1,
                    Severity::Error => trace.failures += 1,
                },
                Effect::CancelPending => {}
            }
        }
    }

    trace.final_state = state;
    trace
}

fn policy(max_attempts: u32) -> VerifyPolicy {
    VerifyPolicy {
        max_attempts,
        initial_delay: Duration::from_secs(3),
        recheck_delay: Duration::from_secs(3),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_inconclusive() -> impl Strategy<Value = CheckOutcome> {
    prop_oneof![
        Just(CheckOutcome::Unconfirmed),
        "[a-z ]{1,20}".prop_map(|message| CheckOutcome::Failed { message }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_confirmed_after_exactly_k_checks(
        max_attempts in 1u32..30,
        k_seed in any::<u32>(),
        noise in proptest::collection::vec(arb_inconclusive(), 30),
    ) {
        let k = k_seed % max_attempts + 1;
        let trace = drive(&policy(max_attempts), |n| {
            if n == k { CheckOutcome::Confirmed } else { noise[(n - 1) as usize].clone() }
        });

        prop_assert_eq!(trace.checks, k);
        prop_assert_eq!(trace.successes, 1);
        prop_assert_eq!(trace.failures, 0);
        let confirmed = matches!(trace.final_state, VerifyState::Confirmed { attempts, .. } if attempts == k);
        prop_assert!(confirmed);
    }

    #[test]
    fn prop_never_confirmed_times_out_once(
        max_attempts in 1u32..30,
        noise in proptest::collection::vec(arb_inconclusive(), 30),
    ) {
        let trace = drive(&policy(max_attempts), |n| noise[(n - 1) as usize].clone());

        prop_assert_eq!(trace.checks, max_attempts);
        prop_assert_eq!(trace.failures, 1);
        prop_assert_eq!(trace.successes, 0);
        prop_assert!(trace.final_state.is_terminal());
        prop_assert!(trace.final_state.active_tx().is_none());
    }

    #[test]
    fn prop_terminal_states_accept_no_check_events(
        attempt in 1u32..40,
        confirmed in any::<bool>(),
    ) {
        let session_id = Uuid::new_v4();
        let state = if confirmed {
            VerifyState::Confirmed { session_id, tx_id: "t".into(), attempts: 3 }
        } else {
            VerifyState::TimedOut { session_id, tx_id: "t".into(), attempts: 20 }
        };

        let due = transition(&state, &VerifyPolicy::eap(), Event::CheckDue { session_id, attempt });
        prop_assert_eq!(due.err(), Some(TransitionError::StaleEvent));

        let done = transition(
            &state,
            &VerifyPolicy::eap(),
            Event::CheckCompleted { session_id, attempt, outcome: CheckOutcome::Confirmed },
        );
        prop_assert_eq!(done.err(), Some(TransitionError::StaleEvent));
    }

    #[test]
    fn prop_attempts_never_exceed_policy(
        max_attempts in 1u32..30,
        answers in proptest::collection::vec(any::<bool>(), 30),
    ) {
        let trace = drive(&policy(max_attempts), |n| {
            if answers[(n - 1) as usize] { CheckOutcome::Confirmed } else { CheckOutcome::Unconfirmed }
        });

        prop_assert!(trace.checks <= max_attempts);
        prop_assert!(trace.final_state.attempts() <= max_attempts);
        prop_assert_eq!(trace.successes + trace.failures, 1);
    }
}

#[test]
fn test_eap_policy_seventh_check_confirms() {
    let trace = drive(&VerifyPolicy::eap(), |n| {
        if n == 7 {
            CheckOutcome::Confirmed
        } else {
            CheckOutcome::Unconfirmed
        }
    });
    assert_eq!(trace.checks, 7);
    assert_eq!(trace.successes, 1);
}

#[test]
fn test_eap_policy_gives_up_after_twenty() {
    let trace = drive(&VerifyPolicy::eap(), |_| CheckOutcome::Unconfirmed);
    assert_eq!(trace.checks, 20);
    assert_eq!(trace.failures, 1);
    assert!(matches!(
        trace.final_state,
        VerifyState::TimedOut { attempts: 20, .. }
    ));
}
