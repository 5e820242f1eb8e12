// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in input policies.
//!
//! Back-edge inputs never hold a node back: they take no part in choosing the
//! invocation timestamp, and whatever they have queued at or before it is
//! delivered along with the invocation. A node is done when every other input
//! is exhausted.

use std::sync::Arc;

use crate::packet::Timestamp;
use crate::traits::{InputPolicy, InputPolicyKind, InputState, Readiness};

pub fn policy_for(kind: InputPolicyKind) -> Arc<dyn InputPolicy> {
    match kind {
        InputPolicyKind::Synchronized => Arc::new(SynchronizedPolicy),
        InputPolicyKind::Immediate => Arc::new(ImmediatePolicy),
    }
}

fn all_exhausted(inputs: &[InputState]) -> bool {
    inputs
        .iter()
        .filter(|input| !input.back_edge)
        .all(InputState::is_exhausted)
}

/// Runs once per settled timestamp.
///
/// The candidate is the lowest head-or-bound across inputs. It is settled when
/// every input either holds a packet at the candidate or has a bound above it,
/// i.e. no input can still produce an earlier or equal packet.
#[derive(Debug, Default, Clone, Copy)]
pub struct SynchronizedPolicy;

impl InputPolicy for SynchronizedPolicy {
    fn readiness(&self, inputs: &[InputState]) -> Readiness {
        if all_exhausted(inputs) {
            return Readiness::Done;
        }

        let candidate = inputs
            .iter()
            .filter(|input| !input.back_edge)
            .map(InputState::min_timestamp)
            .min()
            .unwrap_or(Timestamp::DONE);

        let unsettled = inputs
            .iter()
            .any(|input| !input.back_edge && input.head.is_none() && input.bound <= candidate);
        if unsettled || !candidate.is_allowed_in_stream() {
            return Readiness::NotReady;
        }

        let take = inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| match input.head {
                Some(head) if input.back_edge => head <= candidate,
                Some(head) => head == candidate,
                None => false,
            })
            .map(|(index, _)| index)
            .collect();

        Readiness::Ready {
            timestamp: candidate,
            take,
        }
    }

    fn name(&self) -> &'static str {
        "synchronized"
    }
}

/// Runs once per packet, taking the oldest head across all inputs.
/// Ties go to the lowest port index.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediatePolicy;

impl InputPolicy for ImmediatePolicy {
    fn readiness(&self, inputs: &[InputState]) -> Readiness {
        if all_exhausted(inputs) {
            return Readiness::Done;
        }

        let oldest = inputs
            .iter()
            .enumerate()
            .filter_map(|(index, input)| input.head.map(|head| (head, index)))
            .min();

        match oldest {
            Some((timestamp, index)) => Readiness::Ready {
                timestamp,
                take: vec![index],
            },
            None => Readiness::NotReady,
        }
    }

    fn name(&self) -> &'static str {
        "immediate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queued(head: i64, bound: i64) -> InputState {
        InputState {
            head: Some(Timestamp::new(head)),
            bound: Timestamp::new(bound),
            back_edge: false,
        }
    }

    fn empty(bound: Timestamp) -> InputState {
        InputState {
            head: None,
            bound,
            back_edge: false,
        }
    }

    fn ready(timestamp: i64, take: Vec<usize>) -> Readiness {
        Readiness::Ready {
            timestamp: Timestamp::new(timestamp),
            take,
        }
    }

    #[test]
    fn test_synchronized_table_driven() {
        struct TestCase {
            name: &'static str,
            inputs: Vec<InputState>,
            expected: Readiness,
        }

        let test_cases = vec![
            TestCase {
                name: "all inputs at candidate",
                inputs: vec![queued(1, 1), queued(1, 2)],
                expected: ready(1, vec![0, 1]),
            },
            TestCase {
                name: "other input bound past candidate",
                inputs: vec![queued(1, 3), empty(Timestamp::new(2))],
                expected: ready(1, vec![0]),
            },
            TestCase {
                name: "other input could still produce candidate",
                inputs: vec![queued(3, 3), empty(Timestamp::new(2))],
                expected: Readiness::NotReady,
            },
            TestCase {
                name: "other input bound equal to head",
                inputs: vec![queued(3, 3), empty(Timestamp::new(3))],
                expected: Readiness::NotReady,
            },
            TestCase {
                name: "other input closed",
                inputs: vec![queued(3, 3), empty(Timestamp::DONE)],
                expected: ready(3, vec![0]),
            },
            TestCase {
                name: "nothing started",
                inputs: vec![empty(Timestamp::UNSTARTED), empty(Timestamp::UNSTARTED)],
                expected: Readiness::NotReady,
            },
            TestCase {
                name: "everything exhausted",
                inputs: vec![empty(Timestamp::DONE), empty(Timestamp::DONE)],
                expected: Readiness::Done,
            },
        ];

        for tc in test_cases {
            assert_eq!(
                SynchronizedPolicy.readiness(&tc.inputs),
                tc.expected,
                "case '{}'",
                tc.name
            );
        }
    }

    #[test]
    fn test_synchronized_back_edge_does_not_block() {
        let seeded = InputState {
            head: Some(Timestamp::PRE_STREAM),
            bound: Timestamp::UNSTARTED,
            back_edge: true,
        };
        let starved = InputState {
            head: None,
            bound: Timestamp::UNSTARTED,
            back_edge: true,
        };

        assert_eq!(
            SynchronizedPolicy.readiness(&[queued(1, 1), seeded]),
            ready(1, vec![0, 1])
        );
        assert_eq!(
            SynchronizedPolicy.readiness(&[queued(1, 1), starved]),
            ready(1, vec![0])
        );
        assert_eq!(
            SynchronizedPolicy.readiness(&[empty(Timestamp::DONE), seeded]),
            Readiness::Done
        );
    }

    #[test]
    fn test_immediate_takes_oldest_head() {
        assert_eq!(
            ImmediatePolicy.readiness(&[queued(5, 5), queued(2, 2)]),
            ready(2, vec![1])
        );
        assert_eq!(
            ImmediatePolicy.readiness(&[queued(2, 2), queued(2, 2)]),
            ready(2, vec![0])
        );
        assert_eq!(
            ImmediatePolicy.readiness(&[empty(Timestamp::new(4)), queued(9, 9)]),
            ready(9, vec![1])
        );
        assert_eq!(
            ImmediatePolicy.readiness(&[empty(Timestamp::new(4))]),
            Readiness::NotReady
        );
        assert_eq!(
            ImmediatePolicy.readiness(&[empty(Timestamp::DONE)]),
            Readiness::Done
        );
    }

    #[test]
    fn test_policy_for_kind() {
        assert_eq!(policy_for(InputPolicyKind::Synchronized).name(), "synchronized");
        assert_eq!(policy_for(InputPolicyKind::Immediate).name(), "immediate");
    }
}
