pub mod gateway;
pub mod repository;

pub use gateway::{
    CallGateway, CallOutcome, CallRequest, LogQueryService, RequestIdSequence, SmsGateway,
    SmsOutcome, SmsRequest,
};
pub use repository::{CampaignNumberRepository, CampaignRepository, LineRepository};
