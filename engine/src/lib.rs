//! Core engine of one logical crawl: admission, rate-paced dispatch to
//! remote download agents over the message bus, response correlation, and
//! the data-flow pipeline.

pub mod dataflow;
pub mod lifetime;
pub mod requested;
pub mod spider;


pub use dataflow::{ConsoleStorage, StorageRegistry};
pub use lifetime::AppLifetime;
pub use requested::RequestedQueue;
pub use spider::Spider;
