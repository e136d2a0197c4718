mod admin;
pub mod api;
pub mod dto;
mod lookup;
pub mod response;
mod router;
pub mod validation;

pub use router::{AppState, create_router};
