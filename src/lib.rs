pub mod config;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod picker;
pub mod plugin;
pub mod summarize;
pub mod summary;
pub mod utils;

pub use config::{FetchConfig, SamaryOptions};
pub use embed::{Player, resolve_embed};
pub use error::{ErrorKind, FetchError, SamaryError, StatusError};
pub use fetch::{FetchMethod, FetchRequest, FetchResponse, Fetcher};
pub use plugin::Plugin;
pub use summarize::{summarize, summarize_general};
pub use summary::{Summary, SummaryResult};
