//! Segmented response relay
//!
//! A relay session joins one consumer-facing byte stream to a sequence of
//! producers, one at a time. Producers are swapped with `switch_source`
//! without the consumer ever observing a gap, a reorder or a premature end.

mod channel;
mod error;
mod reader;

pub use channel::RelayChannel;
pub use error::RelayError;
pub use reader::RelayStream;

#[cfg(test)]
mod proptests;
