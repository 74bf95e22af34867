//! Frame source implementations

pub mod replay;
pub mod serial;

pub use replay::ReplayProvider;
pub use serial::SerialProvider;
