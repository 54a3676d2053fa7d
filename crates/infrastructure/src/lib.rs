pub mod database;
pub mod gateway;

pub use database::sqlite::{
    SqliteCampaignNumberRepository, SqliteCampaignRepository, SqliteLineRepository,
    SqliteRequestIdSequence,
};
pub use database::DatabaseManager;
pub use gateway::{HttpCallGateway, HttpLogQueryService, HttpSmsGateway};
