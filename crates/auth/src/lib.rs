//! `agencyledger-auth`: tenant identity and authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: lookups go through the
//! [`AccountDirectory`] and [`MembershipDirectory`] traits, everything else is
//! pure.

pub mod gate;
pub mod identity;
pub mod membership;
pub mod policy;
pub mod provisioning;
pub mod session;

pub use gate::{Area, GateActor, GateDecision, OwnerPage, RedirectReason, TeamPage, classify, gate, home_path};
pub use identity::{
    Account, AccountDirectory, AccountKind, IdentityResolver, Organization, Resolution,
    SignInSurface, SurfaceMismatch, UnauthenticatedReason, admit,
};
pub use membership::{
    DirectoryError, FunctionalRole, Membership, MembershipDirectory, MembershipRole,
    MembershipStatus, TenantMembership, active_membership,
};
pub use policy::{
    Action, Actor, AuthorizationExplanation, Decision, DenyKind, DenyReason, Resource,
    ResourceKind, authorize, evaluate, explain,
};
pub use provisioning::{
    NewTeamMember, OwnerSignUp, ProvisionedOwner, change_role, deactivate, provision_owner,
    provision_team_member,
};
pub use session::{SessionClaims, SessionCodec, SessionError, validate_claims};
