//! Capability trait implemented once per governed entity kind
use std::fmt::Debug;

/// A configuration entity that can be staged, approved and reverted through
/// the change workflow. The service is instantiated once per implementor and
/// keeps a separate set of tables for each.
pub trait GovernedEntity:
    Clone + Debug + PartialEq + minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()>
{
    /// discriminator, also names the sled trees for this kind
    const KIND: &'static str;
    /// bech32 prefix used when minting change record ids
    const CHANGE_ID_HRP: &'static str;

    fn id(&self) -> &str;

    /// tenant partition the entity belongs to
    fn application_type(&self) -> &str;

    /// Fold into `acc` only the fields this proposal actually changed, i.e.
    /// where `old` and `new` disagree. Fields the proposal left alone keep
    /// whatever value `acc` currently holds.
    fn fold_changed_fields(acc: &mut Self, old: &Self, new: &Self);

    /// structural equality check used by the no-op short circuit
    fn same_change_data(&self, other: &Self) -> bool {
        self == other
    }
}
