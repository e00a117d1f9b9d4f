mod diagnostics;
mod init_tracing;
mod request_id;
mod tracing_config;

pub use diagnostics::{sanitize_prompt, summarize_diagnostics};
pub use init_tracing::init_tracing;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use tracing_config::{DEFAULT_FILTER, TracingConfig};
