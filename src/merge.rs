//! Merge engine for reconciling concurrent update proposals
//!
//! When several pending updates for the same entity are approved in one
//! batch, last-write-wins would silently drop edits an earlier proposal made
//! to fields a later proposal never touched. The merge session instead keeps
//! a running result per entity and folds in, proposal by proposal, only the
//! fields each proposal actually changed.
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::entity::GovernedEntity;

pub struct MergeSession<E> {
    results: HashMap<String, E>,
}

impl<E: GovernedEntity> MergeSession<E> {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
        }
    }

    /// Fold one update proposal into the running result for its entity and
    /// return the merged entity to persist. The first proposal seen for an
    /// entity seeds the running result with a full copy of its new snapshot.
    pub fn fold(&mut self, old: &E, new: &E) -> E {
        match self.results.entry(new.id().to_string()) {
            Entry::Occupied(mut slot) => {
                let acc = slot.get_mut();
                E::fold_changed_fields(acc, old, new);
                acc.clone()
            }
            Entry::Vacant(slot) => slot.insert(new.clone()).clone(),
        }
    }
}

impl<E: GovernedEntity> Default for MergeSession<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A list-valued sub-entity with a stable id, reconciled element-wise during
/// batch approval.
pub trait KeyedElement: Clone + PartialEq {
    fn element_id(&self) -> &str;

    /// same changed-field-wins rule as the parent entity, per element
    fn fold_changed_fields(acc: &mut Self, old: &Self, new: &Self);
}

/// Element-wise reconciliation of a keyed list. Elements the proposal added
/// are appended, elements it dropped are removed by id, and elements present
/// in both snapshots are field-merged into the running list. A changed
/// element that is no longer in the running list gets re-added.
pub fn merge_elements<T: KeyedElement>(acc: &mut Vec<T>, old: &[T], new: &[T]) {
    for n in new {
        match old.iter().find(|o| o.element_id() == n.element_id()) {
            Some(o) => {
                if o != n {
                    match acc.iter_mut().find(|a| a.element_id() == n.element_id()) {
                        Some(a) => T::fold_changed_fields(a, o, n),
                        None => acc.push(n.clone()),
                    }
                }
            }
            // a blank or unknown element id means this proposal added it
            None => acc.push(n.clone()),
        }
    }
    for o in old {
        if !new.iter().any(|n| n.element_id() == o.element_id()) {
            acc.retain(|a| a.element_id() != o.element_id());
        }
    }
}
