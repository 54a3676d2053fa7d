pub mod campaign;
pub mod campaign_number;
pub mod line;

pub use campaign::{Campaign, CampaignStatus, CampaignType, CounterDeltas};
pub use campaign_number::{CallStatus, CampaignNumber, NumberStatusSummary, SmsStatus};
pub use line::{Line, LineStatus};
