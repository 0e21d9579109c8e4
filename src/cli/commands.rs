use std::time::Duration;

use crate::browser::session::BrowserSession;
use crate::cache::freshness::unix_now;
use crate::cache::manager::CacheSource;
use crate::cache::schema::IndexRecord;
use crate::cache::store::ElementStore;
use crate::cli::config::ElementCacheConfig;
use crate::page::key::PageKey;
use crate::resolver::description::ElementDescription;

const NAVIGATE_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Formatting helpers
// ============================================================================

/// Human-readable age, e.g. `42s`, `5m 3s`, `2h 10m`, `3d 4h`.
pub fn format_age(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (days, hours, minutes, secs) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// One line per cached page: url, element count, version, age.
pub fn format_entry_list(entries: &[(String, IndexRecord)], now: f64) -> String {
    if entries.is_empty() {
        return "No cached pages.".to_string();
    }

    let mut rows: Vec<&IndexRecord> = entries.iter().map(|(_, r)| r).collect();
    rows.sort_by(|a, b| a.url.cmp(&b.url));

    let mut out = format!("{} cached page(s):\n", rows.len());
    for record in rows {
        out.push_str(&format!(
            "  {}  elements={}  version={}  age={}\n",
            record.url,
            record.element_count,
            record.version,
            format_age(now - record.timestamp)
        ));
    }
    out
}

fn open_session(helper: &str, url: &str) -> Result<BrowserSession, Box<dyn std::error::Error>> {
    let mut session = BrowserSession::launch_script(helper)?;
    session.navigate(url, NAVIGATE_TIMEOUT)?;
    Ok(session)
}

// ============================================================================
// Store-only subcommands
// ============================================================================

pub fn cmd_list(store: &ElementStore) {
    print!("{}", format_entry_list(&store.entries(), unix_now()));
}

pub fn cmd_info(store: &ElementStore, url: &str) {
    let key = PageKey::from_url(url);
    match store.metadata(&key) {
        Some(meta) => {
            println!("page:     {}", key);
            println!("file:     {}.json", key.cache_file_key());
            println!("elements: {}", meta.element_count);
            println!("version:  {}", meta.version);
            println!("age:      {}", format_age(unix_now() - meta.timestamp));
        }
        None => println!("No cache entry for {}", key),
    }
}

pub fn cmd_show(store: &ElementStore, url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let key = PageKey::from_url(url);
    let elements = store.get(&key);
    if elements.is_empty() {
        println!("No cached elements for {}", key);
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&elements)?);
    Ok(())
}

pub fn cmd_clear(store: &ElementStore, url: Option<&str>) {
    match url {
        Some(url) => {
            let key = PageKey::from_url(url);
            store.clear(Some(&key));
            println!("Cleared cache entry for {}", key);
        }
        None => {
            store.clear(None);
            println!("Cleared all cache entries");
        }
    }
}

// ============================================================================
// Live subcommands (need the page helper)
// ============================================================================

pub fn cmd_refresh(
    config: &ElementCacheConfig,
    url: &str,
    force: bool,
    helper: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (manager, _) = crate::open(config);
    let mut session = open_session(helper, url)?;
    let key = PageKey::from_url(url);

    let lookup = manager.lookup(&mut session, &key, force);
    let source = match &lookup.source {
        CacheSource::Cached => "cache (valid)".to_string(),
        CacheSource::Refreshed => "full snapshot".to_string(),
        CacheSource::DiffMerged(diff) => format!(
            "diff merge (+{} ~{} -{})",
            diff.added.len(),
            diff.modified.len(),
            diff.removed.len()
        ),
        CacheSource::Stale => "stale cache (snapshot failed)".to_string(),
    };

    println!(
        "{}: {} elements, version {}, from {}",
        key,
        lookup.elements.len(),
        lookup.version,
        source
    );

    session.quit()?;
    Ok(())
}

/// Returns whether the element was found.
pub fn cmd_find(
    config: &ElementCacheConfig,
    url: &str,
    description: &ElementDescription,
    helper: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (_, resolver) = crate::open(config);
    let mut session = open_session(helper, url)?;
    let key = PageKey::from_url(url);

    let found = match resolver.resolve(&mut session, &key, description) {
        Ok(resolution) => {
            println!(
                "Found element {} via {} (round {}, {} attempts)",
                resolution.handle,
                resolution.strategy,
                resolution.round,
                resolution.attempts.len()
            );
            true
        }
        Err(e) => {
            println!("{}", e);
            false
        }
    };

    session.quit()?;
    Ok(found)
}
