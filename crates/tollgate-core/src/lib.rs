//! tollgate-core
//!
//! Outbound request governor: every API call is funneled through a
//! bounded-concurrency FIFO queue that retries transient failures with
//! exponential backoff and never retries failures that retrying cannot fix.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, failure 分類, item state, decision）
//! - **queue**: `RequestGovernor`, `QueueItem`, `RetryPolicy`, stats
//! - **executor**: 実際の I/O を行う Executor port
//! - **client**: HTTP client wrapper（`ApiClient`, `ReqwestExecutor`）
//! - **config**: GovernorConfig / ClientConfig（TOML）
//! - **error**: GovernorError / ConfigError

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod queue;

pub use config::{ClientConfig, GovernorConfig};
pub use domain::{ErrorKind, Failure, FailureCause, ItemState, RequestId};
pub use error::{ConfigError, GovernorError};
pub use executor::{Executor, FnExecutor};
pub use queue::{GovernorStats, RequestGovernor, RetryPolicy, Ticket};
