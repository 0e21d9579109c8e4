pub mod driver;
pub mod session;
pub mod snapshot;
