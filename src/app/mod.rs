pub mod context;
pub mod error;
pub mod pipeline;

pub use context::AppContext;
pub use error::{NotifierError, Result};
pub use pipeline::{run_once, RunSummary};
