pub mod sqlite_campaign_number_repository;
pub mod sqlite_campaign_repository;
pub mod sqlite_line_repository;
pub mod sqlite_request_id_sequence;

pub use sqlite_campaign_number_repository::SqliteCampaignNumberRepository;
pub use sqlite_campaign_repository::SqliteCampaignRepository;
pub use sqlite_line_repository::SqliteLineRepository;
pub use sqlite_request_id_sequence::SqliteRequestIdSequence;
