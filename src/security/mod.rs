mod policy;
mod resolver;

pub use policy::{AllowAllPolicy, AuthorizationPolicy, EnforcingPolicy};
pub use resolver::RoleResolver;
