//! DCM rule entity kind
use super::entity::GovernedEntity;

/// Download configuration rule. Scalar fields only, so merging never has to
/// reconcile a sub-entity list for this kind.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Eq, PartialEq)]
pub struct DcmRule {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub application_type: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub condition: String, // e.g. "model IS X1"
    #[n(4)]
    pub priority: u32,
    #[n(5)]
    pub percentage: u8,
}

impl DcmRule {
    pub fn new(id: &str, application_type: &str) -> Self {
        Self {
            id: id.to_string(),
            application_type: application_type.to_string(),
            ..Self::default()
        }
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
    pub fn set_condition(mut self, condition: &str) -> Self {
        self.condition = condition.to_string();
        self
    }
    pub fn set_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
    pub fn set_percentage(mut self, percentage: u8) -> Self {
        self.percentage = percentage;
        self
    }
}

impl GovernedEntity for DcmRule {
    const KIND: &'static str = "dcm_rule";
    const CHANGE_ID_HRP: &'static str = "rulechg_";

    fn id(&self) -> &str {
        &self.id
    }
    fn application_type(&self) -> &str {
        &self.application_type
    }
    fn fold_changed_fields(acc: &mut Self, old: &Self, new: &Self) {
        if old.name != new.name {
            acc.name = new.name.clone();
        }
        if old.condition != new.condition {
            acc.condition = new.condition.clone();
        }
        if old.priority != new.priority {
            acc.priority = new.priority;
        }
        if old.percentage != new.percentage {
            acc.percentage = new.percentage;
        }
    }
}
