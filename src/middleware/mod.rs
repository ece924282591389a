pub mod logging;
pub mod request_id;

pub use logging::request_response_logger;
pub use request_id::{REQUEST_ID_HEADER, RequestId, RequestIdExt, request_id_middleware};
