pub mod dataflow;
pub mod stats;
pub mod store;
pub mod supplier;

pub use dataflow::*;
pub use stats::*;
pub use store::*;
pub use supplier::*;
