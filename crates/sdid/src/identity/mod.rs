//! Identity records: key material, DID, roles, and origin grants.
//!
//! The identity module provides the stored [`Identity`] record owned by the
//! agent and the [`IdentityDescriptor`] that is safe to hand to a requester.

pub mod normalize;
pub mod record;

pub use normalize::{normalize_identity, parse_list};
pub use record::{has_admin_role, Identity, IdentityDescriptor, IdentityId, ADMIN_ROLE};
