//! `filterkit` HTTP adapter: request input sources, axum glue and error
//! responses for filters built by `filterkit-core`.

pub mod config;
pub mod extract;
pub mod input;
pub mod telemetry;

pub use config::HttpConfig;
pub use extract::{bind_request, validate_request, RequestFilterError};
pub use input::{InputError, RequestBags, RequestInput};
pub use telemetry::{init_tracing, LogFormat};
