//! Validation applied to change records before they are persisted
use super::change::{ApprovedChangeRecord, ChangeRecord, Operation};
use super::entity::GovernedEntity;
use super::error::WorkflowError;

/// Required-field checks for a pending change record. The operation decides
/// which snapshots must be present.
pub fn validate<E: GovernedEntity>(record: &ChangeRecord<E>) -> Result<(), WorkflowError> {
    if record.id.is_empty() {
        return Err(WorkflowError::BadRequest("change id is blank".to_string()));
    }
    if record.entity_id.is_empty() {
        return Err(WorkflowError::BadRequest("entity id is blank".to_string()));
    }
    if record.author.is_empty() {
        return Err(WorkflowError::BadRequest(
            "change author is blank".to_string(),
        ));
    }
    match record.operation {
        Operation::Create => {
            record.new_snapshot()?;
        }
        Operation::Update => {
            record.old_snapshot()?;
            record.new_snapshot()?;
        }
        Operation::Delete => {
            record.old_snapshot()?;
        }
    }
    // snapshots may not cross tenant partitions
    for snapshot in [&record.old_entity, &record.new_entity].into_iter().flatten() {
        if snapshot.application_type() != record.application_type {
            return Err(WorkflowError::Conflict(format!(
                "change {} does not match the application type of entity {}",
                record.id, record.entity_id
            )));
        }
    }
    Ok(())
}

/// An approved record additionally has to carry the approver identity.
pub fn validate_approved<E: GovernedEntity>(
    record: &ApprovedChangeRecord<E>,
) -> Result<(), WorkflowError> {
    if record.approved_user.is_empty() {
        return Err(WorkflowError::BadRequest(
            "approved user is blank".to_string(),
        ));
    }
    Ok(())
}

/// Duplicate suppression: a second proposal for the same entity with an
/// identical operation and snapshots is rejected so two actors cannot stage
/// the same change twice.
pub fn ensure_not_duplicate<E: GovernedEntity>(
    pending: &[ChangeRecord<E>],
    candidate: &ChangeRecord<E>,
) -> Result<(), WorkflowError> {
    let signature = candidate.signature()?;
    for existing in pending.iter().filter(|c| c.entity_id == candidate.entity_id) {
        if existing.signature()? == signature {
            return Err(WorkflowError::Conflict(format!(
                "an identical change for entity {} is already pending approval",
                candidate.entity_id
            )));
        }
    }
    Ok(())
}
