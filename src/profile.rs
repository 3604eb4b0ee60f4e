//! Telemetry profile entity kind
use super::entity::GovernedEntity;
use super::merge::{self, KeyedElement};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Eq, PartialEq)]
pub enum UploadProtocol {
    #[default]
    #[n(0)]
    Http,
    #[n(1)]
    Https,
    #[n(2)]
    Tftp,
    #[n(3)]
    S3,
}

/// One telemetry collection rule inside a profile. Profiles carry a list of
/// these keyed by element id; the merge engine reconciles them element-wise.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Eq, PartialEq)]
pub struct TelemetryElement {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub header: String,
    #[n(2)]
    pub content: String,
    #[n(3)]
    pub poll_frequency: u32,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Default, Clone, Eq, PartialEq)]
pub struct TelemetryProfile {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub application_type: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub schedule: String, // cron expression
    #[n(4)]
    pub upload_protocol: UploadProtocol,
    #[n(5)]
    pub elements: Vec<TelemetryElement>,
}

impl TelemetryElement {
    pub fn new(id: &str, header: &str, content: &str, poll_frequency: u32) -> Self {
        Self {
            id: id.to_string(),
            header: header.to_string(),
            content: content.to_string(),
            poll_frequency,
        }
    }
}

impl TelemetryProfile {
    /// Construct an empty profile, fields are filled in with the setters
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
    pub fn set_schedule(mut self, schedule: &str) -> Self {
        self.schedule = schedule.to_string();
        self
    }
    pub fn set_upload_protocol(mut self, protocol: UploadProtocol) -> Self {
        self.upload_protocol = protocol;
        self
    }
    pub fn add_element(mut self, element: TelemetryElement) -> Self {
        self.elements.push(element);
        self
    }
}

impl KeyedElement for TelemetryElement {
    fn element_id(&self) -> &str {
        &self.id
    }
    fn fold_changed_fields(acc: &mut Self, old: &Self, new: &Self) {
        if old.header != new.header {
            acc.header = new.header.clone();
        }
        if old.content != new.content {
            acc.content = new.content.clone();
        }
        if old.poll_frequency != new.poll_frequency {
            acc.poll_frequency = new.poll_frequency;
        }
    }
}

impl GovernedEntity for TelemetryProfile {
    const KIND: &'static str = "telemetry_profile";
    const CHANGE_ID_HRP: &'static str = "tpchg_";

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
        if old.schedule != new.schedule {
            acc.schedule = new.schedule.clone();
        }
        if old.upload_protocol != new.upload_protocol {
            acc.upload_protocol = new.upload_protocol.clone();
        }
        merge::merge_elements(&mut acc.elements, &old.elements, &new.elements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(id: &str, header: &str, freq: u32) -> TelemetryElement {
        TelemetryElement::new(id, header, "file:///rdklogs/logs", freq)
    }

    #[test]
    fn changed_fields_win_over_the_running_result() {
        let base = TelemetryProfile::new("tp1", "stb").set_name("uploads");
        let mut acc = base.clone().set_schedule("0 * * * *");

        // proposal changed only the name, the accumulated schedule survives
        let new = base.clone().set_name("uploads-v2");
        TelemetryProfile::fold_changed_fields(&mut acc, &base, &new);

        assert_eq!(acc.name, "uploads-v2");
        assert_eq!(acc.schedule, "0 * * * *");
    }

    #[test]
    fn element_added_by_proposal_is_appended() {
        let old = TelemetryProfile::new("tp1", "stb");
        let new = old.clone().add_element(element("e1", "CPU_INFO", 60));
        let mut acc = old.clone();

        TelemetryProfile::fold_changed_fields(&mut acc, &old, &new);

        assert_eq!(acc.elements.len(), 1);
        assert_eq!(acc.elements[0].id, "e1");
    }

    #[test]
    fn element_dropped_by_proposal_is_removed() {
        let old = TelemetryProfile::new("tp1", "stb").add_element(element("e1", "CPU_INFO", 60));
        let new = TelemetryProfile::new("tp1", "stb");
        let mut acc = old.clone();

        TelemetryProfile::fold_changed_fields(&mut acc, &old, &new);

        assert!(acc.elements.is_empty());
    }

    #[test]
    fn changed_element_missing_from_running_result_is_re_added() {
        let old = TelemetryProfile::new("tp1", "stb").add_element(element("e1", "CPU_INFO", 60));
        let new = old.clone();
        let new = TelemetryProfile {
            elements: vec![element("e1", "CPU_INFO", 300)],
            ..new
        };
        // running result no longer carries e1 at all
        let mut acc = TelemetryProfile::new("tp1", "stb");

        TelemetryProfile::fold_changed_fields(&mut acc, &old, &new);

        assert_eq!(acc.elements.len(), 1);
        assert_eq!(acc.elements[0].poll_frequency, 300);
    }
}
