mod actions;
mod admin;
mod api;
pub mod dto;
pub mod response;
mod router;
mod simple;

pub use admin::admin_router;
pub use api::api_router;
pub use router::{AppState, create_router};
