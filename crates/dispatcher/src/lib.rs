pub mod campaign_scheduler;
pub mod controller;
pub mod dispatch_worker;
pub mod line_allocator;
pub mod pacing;
pub mod reconciler;

pub use campaign_scheduler::CampaignScheduler;
pub use controller::{CampaignController, CampaignStats, NewCampaign};
pub use dispatch_worker::DispatchWorker;
pub use line_allocator::{LineAllocator, OperatorPrefixTable};
pub use pacing::{AntiDetectPacing, FixedPacing, PacingPolicy};
pub use reconciler::{
    DeliveryReconciler, DeliveryRecord, LogMatch, ReconcileInput, ReconcileOutcome,
    ReconcileReport,
};
