//! Model access layer
//!
//! - [`client`]: retrying [`ModelClient`] over a pluggable [`ModelBackend`]
//! - [`http_client`]: chat-completions backend over reqwest
//! - [`retry`]: backoff policy as a pure state machine
//! - [`limiter`]: shared bound on in-flight requests
//! - [`prompts`]: extraction and summary templates
//! - [`utils`]: reasoning-block stripping and JSON extraction

pub mod client;
pub mod http_client;
pub mod limiter;
pub mod prompts;
pub mod retry;
pub mod utils;

pub use client::{ModelBackend, ModelClient, Prompt};
pub use http_client::ChatCompletionsBackend;
pub use limiter::ConcurrencyLimiter;
pub use retry::{RetryPolicy, RetryState, RetryStep};
