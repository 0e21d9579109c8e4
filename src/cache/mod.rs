pub mod differ;
pub mod error;
pub mod freshness;
pub mod manager;
pub mod schema;
pub mod store;
pub mod validator;

pub use manager::CacheManager;
pub use store::ElementStore;
