//! Single point of serialization for all queue mutations.
//!
//! Payloads are produced from arbitrary caller threads; one dedicated
//! worker performs every append, eviction and flush trigger in FIFO order.

mod dispatcher;
mod flush_timer;

pub(crate) use dispatcher::*;
pub(crate) use flush_timer::*;
