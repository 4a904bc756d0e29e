pub mod request;
pub mod uploads;

pub use request::ApiResponse;
pub use uploads::{LimitsResponse, StoredFileResponse};
