//! Request execution and completion handling.

pub mod executor;
pub mod handle;
pub mod types;

pub use executor::{ExchangeError, Executor, ExecutorPolicy};
pub use handle::{CallbackRegistry, Handle};
pub use types::{Exchange, Outcome, ResponseBody, SuccessRange};
