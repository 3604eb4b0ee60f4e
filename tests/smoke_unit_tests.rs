//! Smoke Screen Unit tests for the change workflow components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path.
//!
#![allow(unused_imports)]

use config_approval::{
    change::{ChangeBuilder, ChangeRecord, Operation, TimeStamp},
    error::WorkflowError,
    merge::MergeSession,
    profile::{TelemetryElement, TelemetryProfile},
    rule::DcmRule,
    utils::new_uuid_to_bech32,
    validator,
};

fn sample_rule(id: &str) -> DcmRule {
    DcmRule::new(id, "stb")
        .set_name("nightly-logs")
        .set_condition("model IS X1")
        .set_priority(4)
        .set_percentage(100)
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("tpchg_");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("tpchg_1"));
        assert!(encoded.len() > 10); // UUID should produce substantial output
    }

    /// Test that the function handles empty strings appropriately
    #[test]
    fn handles_empty_hrp() {
        // Empty string should fail
        let result = new_uuid_to_bech32("");
        assert!(result.is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("tpchg_").unwrap();
        let id2 = new_uuid_to_bech32("tpchg_").unwrap();
        let id3 = new_uuid_to_bech32("tpchg_").unwrap();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }
}

// CHANGE MODULE TESTS
#[cfg(test)]
mod change_tests {
    use super::*;

    /// Test that a lone new snapshot builds a create
    #[test]
    fn builder_picks_create_from_new_snapshot() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();

        assert_eq!(record.operation, Operation::Create);
        assert_eq!(record.entity_id, "r1");
        assert_eq!(record.entity_type, "dcm_rule");
        assert!(record.old_entity.is_none());
    }

    /// Test that both snapshots build an update
    #[test]
    fn builder_picks_update_from_both_snapshots() {
        let old = sample_rule("r1");
        let new = old.clone().set_priority(9);

        let record = ChangeBuilder::new("stb", "user_a")
            .set_old_entity(old)
            .set_new_entity(new)
            .build()
            .unwrap();

        assert_eq!(record.operation, Operation::Update);
    }

    /// Test that a lone old snapshot builds a delete
    #[test]
    fn builder_picks_delete_from_old_snapshot() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_old_entity(sample_rule("r1"))
            .build()
            .unwrap();

        assert_eq!(record.operation, Operation::Delete);
        assert!(record.new_entity.is_none());
    }

    /// Test that a builder with no snapshots refuses to build
    #[test]
    fn builder_rejects_empty_diff() {
        let result = ChangeBuilder::<DcmRule>::new("stb", "user_a").build();
        assert!(matches!(result, Err(WorkflowError::BadRequest(_))));
    }

    /// Test that a fresh id is minted with the per-kind prefix when absent
    #[test]
    fn builder_assigns_prefixed_id() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();

        assert!(record.id.starts_with("rulechg_1"));
    }

    /// Test that an explicitly provided id survives the build
    #[test]
    fn builder_keeps_provided_id() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_id("rulechg_fixed")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();

        assert_eq!(record.id, "rulechg_fixed");
    }

    /// Test that identical proposals hash to the same signature regardless
    /// of author or timing
    #[test]
    fn identical_proposals_share_a_signature() {
        let a = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .set_updated(TimeStamp::new_with(2026, 1, 5, 9, 0, 0))
            .build()
            .unwrap();
        let b = ChangeBuilder::new("stb", "user_b")
            .set_new_entity(sample_rule("r1"))
            .set_updated(TimeStamp::new_with(2026, 1, 6, 14, 0, 0))
            .build()
            .unwrap();

        assert_eq!(a.signature().unwrap(), b.signature().unwrap());
    }

    /// Test that a different operation or snapshot changes the signature
    #[test]
    fn different_proposals_have_different_signatures() {
        let create = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();
        let delete = ChangeBuilder::new("stb", "user_a")
            .set_old_entity(sample_rule("r1"))
            .build()
            .unwrap();

        assert_ne!(create.signature().unwrap(), delete.signature().unwrap());
    }

    /// Test that timestamps order the way batch processing relies on
    #[test]
    fn timestamps_order_chronologically() {
        let earlier = TimeStamp::new_with(2026, 3, 1, 8, 0, 0);
        let later = TimeStamp::new_with(2026, 3, 1, 8, 0, 1);

        assert!(earlier < later);
    }
}

// VALIDATOR MODULE TESTS
#[cfg(test)]
mod validator_tests {
    use super::*;

    /// Test that a blank author is rejected
    #[test]
    fn rejects_blank_author() {
        let record = ChangeBuilder::new("stb", "")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();

        let result = validator::validate(&record);
        assert!(matches!(result, Err(WorkflowError::BadRequest(_))));
    }

    /// Test that an entity without an id is rejected
    #[test]
    fn rejects_blank_entity_id() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule(""))
            .build()
            .unwrap();

        let result = validator::validate(&record);
        assert!(matches!(result, Err(WorkflowError::BadRequest(_))));
    }

    /// Test that a snapshot from another tenant partition is rejected
    #[test]
    fn rejects_application_type_mismatch() {
        let foreign = DcmRule::new("r1", "xhome").set_name("nightly-logs");
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(foreign)
            .build()
            .unwrap();

        let result = validator::validate(&record);
        assert!(matches!(result, Err(WorkflowError::Conflict(_))));
    }

    /// Test that a well-formed update passes
    #[test]
    fn accepts_complete_update() {
        let old = sample_rule("r1");
        let new = old.clone().set_priority(9);
        let record = ChangeBuilder::new("stb", "user_a")
            .set_old_entity(old)
            .set_new_entity(new)
            .build()
            .unwrap();

        assert!(validator::validate(&record).is_ok());
    }

    /// Test that a pending duplicate for the same entity is flagged
    #[test]
    fn flags_pending_duplicate() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();
        let rival = ChangeBuilder::new("stb", "user_b")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();

        let result = validator::ensure_not_duplicate(&[record], &rival);
        assert!(matches!(result, Err(WorkflowError::Conflict(_))));
    }

    /// Test that a different edit to the same entity is not a duplicate
    #[test]
    fn allows_distinct_edits_to_same_entity() {
        let record = ChangeBuilder::new("stb", "user_a")
            .set_new_entity(sample_rule("r1"))
            .build()
            .unwrap();
        let different = ChangeBuilder::new("stb", "user_b")
            .set_new_entity(sample_rule("r1").set_priority(9))
            .build()
            .unwrap();

        assert!(validator::ensure_not_duplicate(&[record], &different).is_ok());
    }
}

// MERGE MODULE TESTS
#[cfg(test)]
mod merge_tests {
    use super::*;

    /// Test that the first proposal seeds the running result wholesale
    #[test]
    fn first_proposal_seeds_running_result() {
        let mut session = MergeSession::new();
        let old = sample_rule("r1");
        let new = old.clone().set_priority(9);

        let merged = session.fold(&old, &new);
        assert_eq!(merged, new);
    }

    /// Test that a later proposal only folds in the fields it changed
    #[test]
    fn later_proposal_keeps_unrelated_edits() {
        let mut session = MergeSession::new();
        let base = sample_rule("r1");

        // first editor bumps the priority, second only renames
        session.fold(&base, &base.clone().set_priority(9));
        let merged = session.fold(&base, &base.clone().set_name("weekly-logs"));

        assert_eq!(merged.priority, 9);
        assert_eq!(merged.name, "weekly-logs");
        assert_eq!(merged.condition, base.condition);
    }

    /// Test that different entities never share a running result
    #[test]
    fn entities_merge_independently() {
        let mut session = MergeSession::new();
        let one = sample_rule("r1");
        let two = sample_rule("r2");

        let merged_one = session.fold(&one, &one.clone().set_priority(9));
        let merged_two = session.fold(&two, &two.clone().set_name("weekly-logs"));

        assert_eq!(merged_one.priority, 9);
        assert_eq!(merged_one.name, one.name);
        assert_eq!(merged_two.priority, two.priority);
        assert_eq!(merged_two.name, "weekly-logs");
    }
}
