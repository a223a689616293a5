//! Index layer: stored item layout, store access with retries, and the
//! per-call cancellation context shared with the query engine.

pub mod adapter;
pub mod context;
pub mod item;
pub mod retry;

pub use adapter::IndexStoreAdapter;
pub use context::{CallContext, CancellationToken};
pub use item::IndexedItem;
pub use retry::RetryPolicy;
