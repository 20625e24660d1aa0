//! Core sampling / windowing / delivery state machine.
//!
//! Raw pulses become per-tick observations ([`sampler`]), observations are
//! counted into epoch-aligned windows with a backlog of closed, undelivered
//! ones ([`window`]), and the backlog is drained toward the remote store on
//! flush boundaries ([`scheduler`]).

pub mod sampler;
pub mod scheduler;
pub mod window;

pub use sampler::{Observation, Sampler};
pub use scheduler::DeliveryScheduler;
pub use window::{align, Aggregator, Window};
