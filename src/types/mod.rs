mod distro_id;
mod models;
mod principal;
pub mod role;

pub use distro_id::make_distro_id;
pub use models::*;
pub use principal::Principal;
pub use role::{Role, RoleSet};
