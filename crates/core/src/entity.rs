//! Identity traits shared by accounts and ledger records.

use crate::id::OrganizationId;

/// A record with a stable typed id that survives changes to its fields.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// A record that lives inside exactly one organization.
///
/// Tenant isolation checks are written once against this trait instead of per
/// record type.
pub trait TenantOwned: Entity {
    fn organization_id(&self) -> OrganizationId;
}
