//! Service layer API for the change approval workflow
use std::collections::BTreeMap;

use super::change::{ApprovedChangeRecord, ChangeBuilder, ChangeRecord, Operation};
use super::entity::GovernedEntity;
use super::error::WorkflowError;
use super::merge::MergeSession;
use super::store::Table;
use super::validator;

/// Settings injected at construction. Read-only mode refuses every mutating
/// call before it reaches the tables.
#[derive(Debug, Clone, Default)]
pub struct WorkflowConfig {
    pub read_only: bool,
}

/// The approval engine for one entity kind. Holds the entity table plus the
/// pending and approved change tables for that kind; instantiate once per
/// kind against a shared database.
pub struct ChangeService<E: GovernedEntity> {
    entities: Table<E>,
    pending: Table<ChangeRecord<E>>,
    approved: Table<ApprovedChangeRecord<E>>,
    config: WorkflowConfig,
}

impl<E: GovernedEntity> ChangeService<E> {
    pub fn new(db: &sled::Db, config: WorkflowConfig) -> Result<Self, WorkflowError> {
        let entities = Table::open(db, &format!("{}_entities", E::KIND))?;
        let pending = Table::open(db, &format!("{}_pending_changes", E::KIND))?;
        let approved = Table::open(db, &format!("{}_approved_changes", E::KIND))?;

        Ok(Self {
            entities,
            pending,
            approved,
            config,
        })
    }

    /// The entity table is owned by the wider system, not the workflow;
    /// callers read and seed entities through this handle.
    pub fn entities(&self) -> &Table<E> {
        &self.entities
    }

    /// Stage a mutation for review. Which operation is proposed follows from
    /// the snapshots passed in: a new entity alone proposes a create, both
    /// snapshots propose an update, an old entity alone proposes a delete.
    ///
    /// Returns `None` when an update already matches the stored entity; the
    /// write is applied directly because there is nothing left to review.
    pub fn propose(
        &self,
        old_entity: Option<E>,
        new_entity: Option<E>,
        application_type: &str,
        author: &str,
    ) -> Result<Option<ChangeRecord<E>>, WorkflowError> {
        self.ensure_writable()?;

        if let (Some(_), Some(new)) = (&old_entity, &new_entity) {
            if let Some(current) = self.entities.get(new.id())? {
                if current.same_change_data(new) {
                    self.entities.set(new.id(), new)?;
                    return Ok(None);
                }
            }
        }

        let mut builder = ChangeBuilder::new(application_type, author);
        if let Some(old) = old_entity {
            builder = builder.set_old_entity(old);
        }
        if let Some(new) = new_entity {
            builder = builder.set_new_entity(new);
        }
        let record = builder.build()?;

        validator::validate(&record)?;
        validator::ensure_not_duplicate(&self.pending.list_all()?, &record)?;

        self.pending.set(&record.id, &record)?;

        Ok(Some(record))
    }

    /// Apply one pending change. On success the entity table reflects the
    /// proposal, an approved record is written, the pending record is gone
    /// and every competing proposal for the same entity is cancelled.
    pub fn approve(
        &self,
        change_id: &str,
        approver: &str,
    ) -> Result<ApprovedChangeRecord<E>, WorkflowError> {
        self.ensure_writable()?;

        let record = self.pending.get(change_id)?.ok_or_else(|| {
            WorkflowError::NotFound(format!("no pending change {change_id}"))
        })?;

        self.apply_single(&record)?;
        let approved = self.finish_approval(record, approver)?;
        self.cascade_cancel(&approved.entity_id, &[])?;

        Ok(approved)
    }

    /// Apply a batch of pending changes, earliest proposals first. A failing
    /// change never aborts the loop; its error message is collected under
    /// its change id and its pending record is left in place for retry. An
    /// empty result map means the whole batch was applied.
    pub fn approve_many(
        &self,
        change_ids: &[String],
        approver: &str,
    ) -> Result<BTreeMap<String, String>, WorkflowError> {
        self.ensure_writable()?;

        let mut failures = BTreeMap::new();
        let mut records = Vec::new();
        for id in change_ids {
            match self.pending.get(id)? {
                Some(record) => records.push(record),
                None => {
                    failures.insert(id.clone(), format!("no pending change {id}"));
                }
            }
        }
        // earliest first so later proposals merge against the freshest baseline
        records.sort_by(|a, b| a.updated.cmp(&b.updated));

        let mut session = MergeSession::new();
        let mut touched: Vec<String> = Vec::new();
        let mut failed_ids: Vec<String> = Vec::new();

        for record in records {
            let id = record.id.clone();
            let entity_id = record.entity_id.clone();
            let outcome = self
                .apply_batched(&record, &mut session)
                .and_then(|_| self.finish_approval(record, approver).map(|_| ()));
            match outcome {
                Ok(()) => touched.push(entity_id),
                Err(err) => {
                    failed_ids.push(id.clone());
                    failures.insert(id, err.to_string());
                }
            }
        }

        for entity_id in &touched {
            self.cascade_cancel(entity_id, &failed_ids)?;
        }

        Ok(failures)
    }

    /// Withdraw a pending change without applying it.
    pub fn cancel(&self, change_id: &str) -> Result<(), WorkflowError> {
        self.ensure_writable()?;

        if self.pending.get(change_id)?.is_none() {
            return Err(WorkflowError::NotFound(format!(
                "no pending change {change_id}"
            )));
        }
        self.pending.delete(change_id)
    }

    /// Roll an applied change back to its pre-change state and retire the
    /// audit record. The audit record survives if the entity mutation fails.
    pub fn revert(&self, approved_id: &str) -> Result<(), WorkflowError> {
        self.ensure_writable()?;

        let record = self.approved.get(approved_id)?.ok_or_else(|| {
            WorkflowError::NotFound(format!("no approved change {approved_id}"))
        })?;

        self.unapply(&record)?;
        self.approved.delete(approved_id)
    }

    /// Batch revert, earliest approvals first, with the same
    /// continue-on-error policy as batch approval.
    pub fn revert_many(
        &self,
        approved_ids: &[String],
    ) -> Result<BTreeMap<String, String>, WorkflowError> {
        self.ensure_writable()?;

        let mut failures = BTreeMap::new();
        let mut records = Vec::new();
        for id in approved_ids {
            match self.approved.get(id)? {
                Some(record) => records.push(record),
                None => {
                    failures.insert(id.clone(), format!("no approved change {id}"));
                }
            }
        }
        records.sort_by(|a, b| a.updated.cmp(&b.updated));

        for record in records {
            let outcome = self
                .unapply(&record)
                .and_then(|_| self.approved.delete(&record.id));
            if let Err(err) = outcome {
                failures.insert(record.id.clone(), err.to_string());
            }
        }

        Ok(failures)
    }

    pub fn get_change(&self, change_id: &str) -> Result<Option<ChangeRecord<E>>, WorkflowError> {
        self.pending.get(change_id)
    }

    pub fn get_approved(
        &self,
        approved_id: &str,
    ) -> Result<Option<ApprovedChangeRecord<E>>, WorkflowError> {
        self.approved.get(approved_id)
    }

    pub fn pending_changes(&self) -> Result<Vec<ChangeRecord<E>>, WorkflowError> {
        self.pending.list_all()
    }

    pub fn approved_changes(&self) -> Result<Vec<ApprovedChangeRecord<E>>, WorkflowError> {
        self.approved.list_all()
    }

    /// pending changes for one tenant partition, filtered in memory
    pub fn pending_changes_for(
        &self,
        application_type: &str,
    ) -> Result<Vec<ChangeRecord<E>>, WorkflowError> {
        let mut changes = self.pending.list_all()?;
        changes.retain(|c| c.application_type == application_type);
        Ok(changes)
    }

    pub fn approved_changes_for(
        &self,
        application_type: &str,
    ) -> Result<Vec<ApprovedChangeRecord<E>>, WorkflowError> {
        let mut changes = self.approved.list_all()?;
        changes.retain(|c| c.application_type == application_type);
        Ok(changes)
    }

    /// pending changes grouped by the entity they target
    pub fn pending_by_entity(
        &self,
    ) -> Result<BTreeMap<String, Vec<ChangeRecord<E>>>, WorkflowError> {
        let mut grouped: BTreeMap<String, Vec<ChangeRecord<E>>> = BTreeMap::new();
        for change in self.pending.list_all()? {
            grouped.entry(change.entity_id.clone()).or_default().push(change);
        }
        Ok(grouped)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.count()
    }

    pub fn approved_count(&self) -> usize {
        self.approved.count()
    }

    fn ensure_writable(&self) -> Result<(), WorkflowError> {
        if self.config.read_only {
            return Err(WorkflowError::ReadOnly);
        }
        Ok(())
    }

    // current entity for a record, with the application type recheck that is
    // deferred from proposal time to approval time
    fn lookup_current(&self, record_entity_id: &str, application_type: &str) -> Result<E, WorkflowError> {
        let current = self.entities.get(record_entity_id)?.ok_or_else(|| {
            WorkflowError::NotFound(format!("entity {record_entity_id} does not exist"))
        })?;
        if current.application_type() != application_type {
            return Err(WorkflowError::Conflict(format!(
                "application type mismatch for entity {record_entity_id}"
            )));
        }
        Ok(current)
    }

    // single approval applies the snapshots as proposed, refusing to clobber
    // an entity that moved on since the proposal was made
    fn apply_single(&self, record: &ChangeRecord<E>) -> Result<(), WorkflowError> {
        match record.operation {
            Operation::Create => {
                let new = record.new_snapshot()?;
                self.entities.set(new.id(), new)
            }
            Operation::Update => {
                let old = record.old_snapshot()?;
                let new = record.new_snapshot()?;
                let current = self.lookup_current(&record.entity_id, &record.application_type)?;
                if !current.same_change_data(old) {
                    return Err(WorkflowError::Conflict(format!(
                        "entity {} was changed after this proposal was made",
                        record.entity_id
                    )));
                }
                self.entities.set(new.id(), new)
            }
            Operation::Delete => {
                let old = record.old_snapshot()?;
                let current = self.lookup_current(&record.entity_id, &record.application_type)?;
                if !current.same_change_data(old) {
                    return Err(WorkflowError::Conflict(format!(
                        "entity {} was changed after this proposal was made",
                        record.entity_id
                    )));
                }
                self.entities.delete(old.id())
            }
        }
    }

    // batch approval folds same-entity updates through the merge session
    // instead of applying the staleness check; deletes and creates apply as
    // proposed
    fn apply_batched(
        &self,
        record: &ChangeRecord<E>,
        session: &mut MergeSession<E>,
    ) -> Result<(), WorkflowError> {
        match record.operation {
            Operation::Create => {
                let new = record.new_snapshot()?;
                self.entities.set(new.id(), new)
            }
            Operation::Update => {
                let old = record.old_snapshot()?;
                let new = record.new_snapshot()?;
                self.lookup_current(&record.entity_id, &record.application_type)?;
                let merged = session.fold(old, new);
                self.entities.set(merged.id(), &merged)
            }
            Operation::Delete => {
                let old = record.old_snapshot()?;
                self.lookup_current(&record.entity_id, &record.application_type)?;
                self.entities.delete(old.id())
            }
        }
    }

    // the audit copy is written before the pending record is dropped; the
    // sequence is not atomic and a crash in between leaves both visible
    fn finish_approval(
        &self,
        record: ChangeRecord<E>,
        approver: &str,
    ) -> Result<ApprovedChangeRecord<E>, WorkflowError> {
        let approved = record.into_approved(approver);
        validator::validate_approved(&approved)?;
        self.approved.set(&approved.id, &approved)?;
        self.pending.delete(&approved.id)?;
        Ok(approved)
    }

    // once one proposal for an entity is realized the remaining proposals
    // for that entity no longer apply to anything and are discarded
    fn cascade_cancel(&self, entity_id: &str, keep: &[String]) -> Result<(), WorkflowError> {
        for change in self.pending.list_all()? {
            if change.entity_id == entity_id && !keep.contains(&change.id) {
                self.pending.delete(&change.id)?;
            }
        }
        Ok(())
    }

    // reverse one approved change against the entity table
    fn unapply(&self, record: &ApprovedChangeRecord<E>) -> Result<(), WorkflowError> {
        match record.operation {
            // a delete is undone by restoring the snapshot taken before it
            Operation::Delete => {
                let old = record.old_snapshot()?;
                self.entities.set(old.id(), old)
            }
            // a create is undone by deleting whatever currently holds the
            // id, looked up rather than trusting the stored snapshot
            Operation::Create => {
                let current = self.entities.get(&record.entity_id)?.ok_or_else(|| {
                    WorkflowError::NotFound(format!(
                        "entity {} does not exist",
                        record.entity_id
                    ))
                })?;
                self.entities.delete(current.id())
            }
            // an update is undone with a raw overwrite, not a merge
            Operation::Update => {
                let old = record.old_snapshot()?;
                self.entities.set(old.id(), old)
            }
        }
    }
}
