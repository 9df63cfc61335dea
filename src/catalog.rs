#![allow(dead_code)]

//! Named lock families and call-site classification. See [`LockCatalog::classify`].

use std::collections::HashSet;

use anyhow::{Result, anyhow};

/// A named pair of C functions that acquire and release one kind of lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LockFamily {
    pub(crate) name: String,
    pub(crate) acquire_name: String,
    pub(crate) release_name: String,
}

/// The result of classifying a call site's callee name against a [`LockCatalog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CallEffect {
    Acquire(usize),
    Release(usize),
    /// `panic`, structurally special regardless of catalog contents.
    Panic,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LockCatalog {
    families: Vec<LockFamily>,
}

impl LockCatalog {
    pub(crate) fn new(families: Vec<LockFamily>) -> Result<Self> {
        let mut seen = HashSet::new();
        for family in &families {
            for name in [&family.name, &family.acquire_name, &family.release_name] {
                if !seen.insert(name.clone()) {
                    return Err(anyhow!(
                        "lock family name collision on `{name}`: two families must not share a name, acquire function, or release function"
                    ));
                }
            }
        }
        Ok(Self { families })
    }

    /// The default `{spl, mpl, mtx}` triple described in the external interface
    /// contract. Try-acquire variants are deliberately not included.
    pub(crate) fn default_catalog() -> Self {
        Self::new(vec![
            LockFamily {
                name: "spl".to_string(),
                acquire_name: "splraise".to_string(),
                release_name: "spllower".to_string(),
            },
            LockFamily {
                name: "mpl".to_string(),
                acquire_name: "__mp_lock".to_string(),
                release_name: "__mp_unlock".to_string(),
            },
            LockFamily {
                name: "mtx".to_string(),
                acquire_name: "mtx_enter".to_string(),
                release_name: "mtx_leave".to_string(),
            },
        ])
        .expect("built-in default catalog has no name collisions")
    }

    pub(crate) fn len(&self) -> usize {
        self.families.len()
    }

    pub(crate) fn families(&self) -> &[LockFamily] {
        &self.families
    }

    /// Restricts the active family set to those named in `names`, preserving
    /// catalog order. Unknown names are an error: a typo in a `--families`
    /// filter should not silently analyze nothing.
    pub(crate) fn restrict(&self, names: &[String]) -> Result<Self> {
        let mut kept = Vec::new();
        for name in names {
            let family = self
                .families
                .iter()
                .find(|f| &f.name == name)
                .ok_or_else(|| anyhow!("unknown lock family `{name}`"))?;
            kept.push(family.clone());
        }
        Self::new(kept)
    }

    pub(crate) fn classify(&self, callee_name: &str) -> CallEffect {
        if callee_name == "panic" {
            return CallEffect::Panic;
        }
        for (index, family) in self.families.iter().enumerate() {
            if callee_name == family.acquire_name {
                return CallEffect::Acquire(index);
            }
            if callee_name == family.release_name {
                return CallEffect::Release(index);
            }
        }
        CallEffect::None
    }

    pub(crate) fn is_catalog_name(&self, callee_name: &str) -> bool {
        self.families
            .iter()
            .any(|f| f.acquire_name == callee_name || f.release_name == callee_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_classifies_each_family() {
        let catalog = LockCatalog::default_catalog();
        assert_eq!(catalog.classify("splraise"), CallEffect::Acquire(0));
        assert_eq!(catalog.classify("spllower"), CallEffect::Release(0));
        assert_eq!(catalog.classify("mtx_enter"), CallEffect::Acquire(2));
        assert_eq!(catalog.classify("mtx_enter_try"), CallEffect::None);
        assert_eq!(catalog.classify("panic"), CallEffect::Panic);
        assert_eq!(catalog.classify("frobnicate"), CallEffect::None);
    }

    #[test]
    fn rejects_overlapping_family_names() {
        let families = vec![
            LockFamily {
                name: "a".to_string(),
                acquire_name: "lock_a".to_string(),
                release_name: "unlock_a".to_string(),
            },
            LockFamily {
                name: "b".to_string(),
                acquire_name: "lock_a".to_string(),
                release_name: "unlock_b".to_string(),
            },
        ];
        assert!(LockCatalog::new(families).is_err());
    }

    #[test]
    fn restrict_keeps_only_named_families_in_order() {
        let catalog = LockCatalog::default_catalog();
        let restricted = catalog.restrict(&["mtx".to_string(), "spl".to_string()]).unwrap();
        assert_eq!(restricted.len(), 2);
        assert_eq!(restricted.families()[0].name, "mtx");
        assert_eq!(restricted.families()[1].name, "spl");
    }

    #[test]
    fn restrict_rejects_unknown_family() {
        let catalog = LockCatalog::default_catalog();
        assert!(catalog.restrict(&["nonexistent".to_string()]).is_err());
    }
}
