#![allow(dead_code)]

//! Per-family lock counters tracked along one exploration path.

use crate::catalog::CallEffect;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LockState {
    counters: Vec<i64>,
}

impl LockState {
    pub(crate) fn new(family_count: usize) -> Self {
        Self {
            counters: vec![0; family_count],
        }
    }

    pub(crate) fn balanced(&self) -> bool {
        self.counters.iter().all(|&c| c == 0)
    }

    /// Applies a classified call effect, returning `true` if it actually
    /// mutated a counter (i.e. a lock operation occurred, which is what
    /// triggers the forbidden-position check at the call site).
    pub(crate) fn apply(&mut self, effect: CallEffect) -> bool {
        match effect {
            CallEffect::Acquire(index) => {
                self.counters[index] += 1;
                true
            }
            CallEffect::Release(index) => {
                self.counters[index] -= 1;
                true
            }
            CallEffect::Panic | CallEffect::None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<i64> {
        self.counters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_balanced() {
        assert!(LockState::new(3).balanced());
    }

    #[test]
    fn acquire_then_release_rebalances() {
        let mut state = LockState::new(1);
        assert!(state.apply(CallEffect::Acquire(0)));
        assert!(!state.balanced());
        assert!(state.apply(CallEffect::Release(0)));
        assert!(state.balanced());
    }

    #[test]
    fn over_release_goes_negative_and_is_unbalanced() {
        let mut state = LockState::new(1);
        state.apply(CallEffect::Release(0));
        assert_eq!(state.snapshot(), vec![-1]);
        assert!(!state.balanced());
    }

    #[test]
    fn non_catalog_call_does_not_mutate() {
        let mut state = LockState::new(2);
        let mutated = state.apply(CallEffect::None);
        assert!(!mutated);
        assert_eq!(state.snapshot(), vec![0, 0]);
    }

    #[test]
    fn equality_is_reflexive_symmetric_transitive() {
        let a = LockState::new(2);
        let b = LockState::new(2);
        let c = LockState::new(2);
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_eq!(b, c);
        assert_eq!(a, c);
    }

    #[test]
    fn balanced_iff_equal_to_initial() {
        let initial = LockState::new(2);
        let mut other = LockState::new(2);
        assert_eq!(other.balanced(), other == initial);
        other.apply(CallEffect::Acquire(0));
        assert_eq!(other.balanced(), other == initial);
    }
}
