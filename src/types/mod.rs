mod models;
mod permission;
mod status;

pub use models::*;
pub use permission::Permission;
pub use status::*;
