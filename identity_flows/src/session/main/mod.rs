mod cache;
mod memberships;

pub use cache::{RefreshHandle, SessionCache};
pub use memberships::MembershipCache;
