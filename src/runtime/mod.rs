//! Runtime plumbing: bounded queues, the in-process event bus, the alarm
//! worker loop, and shutdown signaling.

pub mod bus;
pub mod queue;
pub mod shutdown;
pub mod worker;

pub use bus::EventBus;
pub use queue::BoundedQueue;
pub use shutdown::Shutdown;
pub use worker::AlarmWorker;
