//! Change record data model and construction
use super::entity::GovernedEntity;
use super::error::WorkflowError;
use super::utils;
use chrono::{DateTime, TimeZone, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operation {
    #[n(0)]
    Create,
    #[n(1)]
    Update,
    #[n(2)]
    Delete,
}

#[derive(Debug, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl<T: TimeZone> PartialEq for TimeStamp<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T: TimeZone> Eq for TimeStamp<T> {}

impl<T: TimeZone> PartialOrd for TimeStamp<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: TimeZone> Ord for TimeStamp<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

/// A staged mutation waiting for approval. `old_entity` and `new_entity` are
/// snapshots taken at proposal time; which of them must be present depends on
/// the operation.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ChangeRecord<E> {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub entity_id: String,
    #[n(2)]
    pub entity_type: String,
    #[n(3)]
    pub application_type: String,
    #[n(4)]
    pub operation: Operation,
    #[n(5)]
    pub old_entity: Option<E>,
    #[n(6)]
    pub new_entity: Option<E>,
    #[n(7)]
    pub author: String,
    #[n(8)]
    pub updated: TimeStamp<Utc>,
}

/// Audit record written at the moment a change is applied. Same shape as the
/// change it came from plus the approver identity; consumed by revert.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ApprovedChangeRecord<E> {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub entity_id: String,
    #[n(2)]
    pub entity_type: String,
    #[n(3)]
    pub application_type: String,
    #[n(4)]
    pub operation: Operation,
    #[n(5)]
    pub old_entity: Option<E>,
    #[n(6)]
    pub new_entity: Option<E>,
    #[n(7)]
    pub author: String,
    #[n(8)]
    pub updated: TimeStamp<Utc>,
    #[n(9)]
    pub approved_user: String,
}

impl<E> ChangeRecord<E> {
    pub fn old_snapshot(&self) -> Result<&E, WorkflowError> {
        self.old_entity.as_ref().ok_or_else(|| {
            WorkflowError::BadRequest(format!(
                "change {} is missing its previous entity snapshot",
                self.id
            ))
        })
    }
    pub fn new_snapshot(&self) -> Result<&E, WorkflowError> {
        self.new_entity.as_ref().ok_or_else(|| {
            WorkflowError::BadRequest(format!(
                "change {} is missing its proposed entity snapshot",
                self.id
            ))
        })
    }
    pub fn into_approved(self, approved_user: &str) -> ApprovedChangeRecord<E> {
        ApprovedChangeRecord {
            id: self.id,
            entity_id: self.entity_id,
            entity_type: self.entity_type,
            application_type: self.application_type,
            operation: self.operation,
            old_entity: self.old_entity,
            new_entity: self.new_entity,
            author: self.author,
            updated: self.updated,
            approved_user: approved_user.to_string(),
        }
    }
}

impl<E: GovernedEntity> ChangeRecord<E> {
    /// Structural signature of what this change does. Two proposals with the
    /// same operation and snapshots hash to the same value regardless of who
    /// made them or when.
    pub fn signature(&self) -> Result<String, WorkflowError> {
        let mut payload =
            minicbor::to_vec(self.operation).map_err(|e| WorkflowError::Codec(e.to_string()))?;
        payload.extend(
            minicbor::to_vec(&self.old_entity).map_err(|e| WorkflowError::Codec(e.to_string()))?,
        );
        payload.extend(
            minicbor::to_vec(&self.new_entity).map_err(|e| WorkflowError::Codec(e.to_string()))?,
        );
        Ok(sha256::digest(payload))
    }
}

impl<E> ApprovedChangeRecord<E> {
    pub fn old_snapshot(&self) -> Result<&E, WorkflowError> {
        self.old_entity.as_ref().ok_or_else(|| {
            WorkflowError::BadRequest(format!(
                "approved change {} is missing its previous entity snapshot",
                self.id
            ))
        })
    }
}

// used for assembling a change record from an entity diff
pub struct ChangeBuilder<E> {
    id: Option<String>,
    old_entity: Option<E>,
    new_entity: Option<E>,
    application_type: String,
    author: String,
    updated: Option<TimeStamp<Utc>>,
}

impl<E: GovernedEntity> ChangeBuilder<E> {
    pub fn new(application_type: &str, author: &str) -> Self {
        Self {
            id: None,
            old_entity: None,
            new_entity: None,
            application_type: application_type.to_string(),
            author: author.to_string(),
            updated: None,
        }
    }
    pub fn set_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
    pub fn set_old_entity(mut self, entity: E) -> Self {
        self.old_entity = Some(entity);
        self
    }
    pub fn set_new_entity(mut self, entity: E) -> Self {
        self.new_entity = Some(entity);
        self
    }
    pub fn set_updated(mut self, updated: TimeStamp<Utc>) -> Self {
        self.updated = Some(updated);
        self
    }
    /// The operation is chosen by which snapshots are present: only a new
    /// entity means create, both mean update, only an old entity means
    /// delete. A record with neither cannot be built.
    pub fn build(self) -> Result<ChangeRecord<E>, WorkflowError> {
        let (operation, entity_id) = match (&self.old_entity, &self.new_entity) {
            (None, Some(new)) => (Operation::Create, new.id().to_string()),
            (Some(_), Some(new)) => (Operation::Update, new.id().to_string()),
            (Some(old), None) => (Operation::Delete, old.id().to_string()),
            (None, None) => {
                return Err(WorkflowError::BadRequest(
                    "change carries no entity snapshots".to_string(),
                ));
            }
        };
        let id = match self.id {
            Some(id) => id,
            None => utils::new_uuid_to_bech32(E::CHANGE_ID_HRP)
                .map_err(|e| WorkflowError::Internal(e.to_string()))?,
        };

        Ok(ChangeRecord {
            id,
            entity_id,
            entity_type: E::KIND.to_string(),
            application_type: self.application_type,
            operation,
            old_entity: self.old_entity,
            new_entity: self.new_entity,
            author: self.author,
            updated: self.updated.unwrap_or_default(),
        })
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}
impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
