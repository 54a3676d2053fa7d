pub mod config;
pub mod errors;
pub mod models;
pub mod phone;
pub mod traits;

pub use config::AppConfig;
pub use errors::{CampaignerError, CampaignerResult};
