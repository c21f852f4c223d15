//! Ordered, possibly short-circuiting interceptor chain every payload
//! passes through before it reaches the dispatcher.
//!
//! Interceptors run synchronously on the calling thread, in registration
//! order. An interceptor that never calls [`Chain::proceed`] silently
//! discards the payload; nothing downstream ever sees it.

use std::sync::Arc;

use crate::payload::Payload;

pub trait Middleware: Send + Sync + 'static {
    /// Inspect or transform the chain's payload, then either call
    /// `chain.proceed(...)` to continue (with the same or a derived
    /// payload) or return without proceeding to drop it.
    fn intercept(
        &self,
        chain: Chain<'_>,
    );
}

/// Cursor over the interceptor list for one payload.
pub struct Chain<'a> {
    index: usize,
    payload: Payload,
    middlewares: &'a [Arc<dyn Middleware>],
    terminal: &'a mut dyn FnMut(Payload),
}

impl<'a> Chain<'a> {
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Advance to the next interceptor, or deliver to the dispatcher when
    /// the cursor is exhausted.
    pub fn proceed(
        self,
        payload: Payload,
    ) {
        dispatch(self.index + 1, payload, self.middlewares, self.terminal);
    }
}

fn dispatch(
    index: usize,
    payload: Payload,
    middlewares: &[Arc<dyn Middleware>],
    terminal: &mut dyn FnMut(Payload),
) {
    match middlewares.get(index) {
        Some(next) => next.intercept(Chain {
            index,
            payload,
            middlewares,
            terminal,
        }),
        None => terminal(payload),
    }
}

/// Run `payload` through the chain; `terminal` receives it if no
/// interceptor short-circuits.
pub(crate) fn run(
    middlewares: &[Arc<dyn Middleware>],
    payload: Payload,
    terminal: &mut dyn FnMut(Payload),
) {
    dispatch(0, payload, middlewares, terminal);
}

/// Instance identity check used to reject duplicate registrations.
pub(crate) fn contains_instance(
    middlewares: &[Arc<dyn Middleware>],
    candidate: &Arc<dyn Middleware>,
) -> bool {
    middlewares.iter().any(|m| Arc::ptr_eq(m, candidate))
}
