pub mod executor;
pub mod reports;
pub mod transport;

pub use executor::RequestExecutor;
pub use reports::BulkReportClient;
pub use transport::ReqwestTransport;
