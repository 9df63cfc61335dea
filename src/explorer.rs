#![allow(dead_code)]

//! Per-path exploration state and the branch-splitting abstraction.
//!
//! A split never clones the AST — only the small [`ExplorationContext`] is
//! duplicated by value. The remainder of the enclosing statement sequence is
//! represented elsewhere as a borrowed continuation (see `interpreter`), so
//! siblings share the (immutable) tree and diverge only in their own state.

use std::collections::HashMap;

use crate::state::LockState;

#[derive(Clone, Debug)]
pub(crate) struct ExplorationContext {
    pub(crate) state: LockState,
    pub(crate) forbidden: bool,
    /// Name of the label a forward goto is currently skipping toward.
    pub(crate) ignore_until: Option<String>,
    pub(crate) cond_memo: HashMap<String, bool>,
}

impl ExplorationContext {
    pub(crate) fn new(family_count: usize) -> Self {
        Self {
            state: LockState::new(family_count),
            forbidden: false,
            ignore_until: None,
            cond_memo: HashMap::new(),
        }
    }
}

/// A path's terminal or pending result. `Break`/`Continue`/`Fallthrough`
/// still carry a full context because an enclosing construct may resume
/// plain sequential visiting from them; `Return`/`Forbidden`/`NoError` never
/// need to resume anything past themselves.
#[derive(Clone, Debug)]
pub(crate) enum Exit {
    NoError,
    Return(LockState),
    Forbidden(LockState),
    Break(ExplorationContext),
    Continue(ExplorationContext),
    Fallthrough(ExplorationContext),
}

/// One independently-explored sibling of a split, already bound to its own
/// cloned context and continuation.
pub(crate) type Branch<'a> = Box<dyn FnOnce() -> Vec<Exit> + Send + 'a>;

/// Abstraction over path splitting: run each sibling independently and union
/// the resulting exits. Kept as its own type (rather than inlined at each
/// call site) so the one place that decides "serial or parallel" governs
/// every split point uniformly.
pub(crate) struct BranchExplorer;

impl BranchExplorer {
    #[cfg(not(feature = "parallel-explore"))]
    pub(crate) fn explore_all(branches: Vec<Branch<'_>>) -> Vec<Exit> {
        branches.into_iter().flat_map(|branch| branch()).collect()
    }

    #[cfg(feature = "parallel-explore")]
    pub(crate) fn explore_all<'a>(branches: Vec<Branch<'a>>) -> Vec<Exit> {
        use rayon::prelude::*;
        branches.into_par_iter().flat_map(|branch| branch()).collect()
    }
}
