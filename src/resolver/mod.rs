pub mod description;
pub mod resolver;
pub mod strategy;

pub use description::{ElementDescription, TextMatch};
pub use resolver::{Resolution, ResolveError, Resolver};
