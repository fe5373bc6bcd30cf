// Use cases layer: the shared connection and the widget fan-out.

pub mod connection;
pub mod fanout;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{ConnectionManager, ConnectionSettings};
pub use fanout::{SubscriberId, SubscriberRegistry};
