use std::fs;

use element_cache::page::key::PageKey;
use element_cache::trace::logger::TraceLogger;
use element_cache::trace::trace::TraceEvent;
use tempfile::TempDir;

#[test]
fn trace_event_omits_unset_fields() {
    let key = PageKey::from_url("https://x.test/?b=2&a=1");
    let event = TraceEvent::now(&key, "refresh").with_version(3);
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["page_key"], "https://x.test/?a=1&b=2");
    assert_eq!(json["event"], "refresh");
    assert_eq!(json["version"], 3);
    assert!(json.get("strategy").is_none());
    assert!(json.get("handle").is_none());
    assert!(json["timestamp_ms"].as_u64().unwrap() > 0);
}

#[test]
fn trace_logger_appends_one_line_per_event() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.jsonl");
    let key = PageKey::from_url("https://x.test/");

    {
        let logger = TraceLogger::new(path.to_str().unwrap());
        assert!(logger.is_enabled());
        logger.log(&TraceEvent::now(&key, "strategy_attempt").with_strategy("text").with_attempt(1));
        logger.log(&TraceEvent::now(&key, "resolved").with_handle("4"));
    }
    // Reopening appends
    TraceLogger::new(path.to_str().unwrap()).log(&TraceEvent::now(&key, "exhausted"));

    let content = fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["strategy"], "text");
    assert_eq!(events[1]["handle"], "4");
    assert_eq!(events[2]["event"], "exhausted");
}

#[test]
fn disabled_logger_is_a_no_op() {
    let logger = TraceLogger::default();
    assert!(!logger.is_enabled());
    logger.log(&TraceEvent::now(&PageKey::from_url("https://x.test/"), "refresh"));
}

#[test]
fn unwritable_trace_path_disables_logging() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing-dir").join("trace.jsonl");
    let logger = TraceLogger::new(path.to_str().unwrap());
    assert!(!logger.is_enabled());
}
