use std::sync::Arc;

use crate::{
    cache::{manager::CacheManager, store::ElementStore},
    cli::config::ElementCacheConfig,
    resolver::resolver::Resolver,
    trace::logger::TraceLogger,
};

pub mod browser;
pub mod cache;
pub mod cli;
pub mod element;
pub mod page;
pub mod resolver;
pub mod trace;

/// Wire a store, cache manager and resolver from one config.
pub fn open(config: &ElementCacheConfig) -> (Arc<CacheManager>, Resolver) {
    let store = Arc::new(ElementStore::open(config.cache_path()));

    let tracer = match &config.trace_file {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    let manager = Arc::new(
        CacheManager::from_config(store, config).with_tracer(Arc::new(tracer)),
    );
    let resolver = Resolver::from_config(Arc::clone(&manager), config);

    (manager, resolver)
}
