//! Request/response over the broker.
//!
//! A caller registers a waiter keyed by a fresh message id, publishes the
//! request with that id and its reply queue, then waits for the matching reply
//! until the call's deadline. Replies are routed back into waiters by a
//! [`crate::transport::ReplyListener`].

mod call;
mod listener;
mod waiters;

pub use call::{RpcClient, Target};
pub use listener::QueueReplyListener;
pub use waiters::{ReplySlot, ReplyWaiters};
