pub mod http_call_gateway;
pub mod http_log_query;
pub mod http_sms_gateway;

pub use http_call_gateway::HttpCallGateway;
pub use http_log_query::HttpLogQueryService;
pub use http_sms_gateway::HttpSmsGateway;
