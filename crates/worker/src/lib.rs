//! Cooperative runtime primitives shared by the syntax engine.
//!
//! * [`TaskClass`] and [`spawn`]: classified task spawning on the ambient runtime.
//! * [`yield_point`]: the explicit scheduler yield between time slices.
//! * [`CancelScope`]: generation-stamped cancellation for racing waits.
//! * [`SerialQueue`]: per-owner FIFO queue with at most one job in flight.
//! * [`AsyncMemo`]: keyed cache over pending/settled futures with a sync fast path.

mod class;
pub mod memo;
mod serial;
mod spawn;
mod token;

pub use class::TaskClass;
pub use memo::{AsyncMemo, MemoFuture};
pub use serial::SerialQueue;
pub use spawn::{spawn, yield_point};
pub use token::{CancelScope, ScopeClock};
