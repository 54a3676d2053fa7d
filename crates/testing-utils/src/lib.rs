//! Shared testing utilities for the campaigner workspace.

pub mod builders;
pub mod mocks;

pub use builders::{CampaignBuilder, CampaignNumberBuilder, LineBuilder};
pub use mocks::{
    MockCallGateway, MockCampaignNumberRepository, MockCampaignRepository, MockLineRepository,
    MockLogQueryService, MockRequestIdSequence, MockSmsGateway,
};
