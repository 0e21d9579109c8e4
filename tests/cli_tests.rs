use clap::Parser;
use element_cache::cache::schema::IndexRecord;
use element_cache::cli::commands::{format_age, format_entry_list};
use element_cache::cli::config::{
    Cli, Commands, ElementCacheConfig, apply_overrides, load_config, parse_config,
};
use std::time::Duration;

// ============================================================================
// CLI Argument Parsing Tests
// ============================================================================

#[test]
fn cli_parse_list() {
    let cli = Cli::parse_from(["element-cache", "list"]);
    assert!(matches!(cli.command, Commands::List));
    assert_eq!(cli.verbose, 0);
    assert!(cli.cache_dir.is_none());
}

#[test]
fn cli_parse_clear_all_and_one() {
    let cli = Cli::parse_from(["element-cache", "clear"]);
    match cli.command {
        Commands::Clear { url } => assert!(url.is_none()),
        _ => panic!("Expected Clear command"),
    }

    let cli = Cli::parse_from(["element-cache", "clear", "--url", "https://x.test/?a=1"]);
    match cli.command {
        Commands::Clear { url } => assert_eq!(url.as_deref(), Some("https://x.test/?a=1")),
        _ => panic!("Expected Clear command"),
    }
}

#[test]
fn cli_parse_refresh_defaults() {
    let cli = Cli::parse_from(["element-cache", "refresh", "--url", "https://x.test"]);
    match cli.command {
        Commands::Refresh { url, force, helper } => {
            assert_eq!(url, "https://x.test");
            assert!(!force);
            assert_eq!(helper, "node/page-helper/page_server.js");
        }
        _ => panic!("Expected Refresh command"),
    }
}

#[test]
fn cli_parse_find_all_args() {
    let cli = Cli::parse_from([
        "element-cache",
        "find",
        "--url",
        "https://x.test",
        "--handle",
        "4",
        "--selector",
        "#go",
        "--role",
        "button",
        "--name",
        "Go",
        "--text",
        "Go now",
        "--exact",
        "--tag",
        "button",
        "--helper",
        "helper.js",
    ]);
    match cli.command {
        Commands::Find {
            url,
            handle,
            selector,
            role,
            name,
            text,
            exact,
            tag,
            helper,
        } => {
            assert_eq!(url, "https://x.test");
            assert_eq!(handle.as_deref(), Some("4"));
            assert_eq!(selector.as_deref(), Some("#go"));
            assert_eq!(role.as_deref(), Some("button"));
            assert_eq!(name.as_deref(), Some("Go"));
            assert_eq!(text.as_deref(), Some("Go now"));
            assert!(exact);
            assert_eq!(tag.as_deref(), Some("button"));
            assert_eq!(helper, "helper.js");
        }
        _ => panic!("Expected Find command"),
    }
}

#[test]
fn cli_parse_global_flags() {
    let cli = Cli::parse_from([
        "element-cache",
        "list",
        "-vv",
        "--cache-dir",
        "/tmp/elements",
        "--config",
        "custom.yaml",
    ]);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.cache_dir.as_deref(), Some("/tmp/elements"));
    assert_eq!(cli.config.as_deref(), Some("custom.yaml"));
}

// ============================================================================
// Config File Tests
// ============================================================================

#[test]
fn config_load_missing_file() {
    let config = load_config(Some("nonexistent_file_that_does_not_exist.yaml"));
    assert_eq!(config, ElementCacheConfig::default());
}

#[test]
fn config_default_values() {
    let config = ElementCacheConfig::default();
    assert_eq!(config.cache_directory, "cache_data");
    assert_eq!(config.ttl(), Duration::from_secs(86_400));
    assert_eq!(config.validation_sample_size, 3);
    assert!((config.validation_threshold - 0.7).abs() < f64::EPSILON);
    assert_eq!(config.resolver_max_attempts, 3);
    assert_eq!(config.retry_delay(), Duration::from_millis(500));
    assert_eq!(config.refresh_after_failed_rounds, 1);
    assert!(!config.compare_text);
    assert!(config.trace_file.is_none());
}

#[test]
fn config_yaml_roundtrip() {
    let config = ElementCacheConfig::default();
    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed: ElementCacheConfig = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn config_partial_yaml() {
    let yaml = r#"
ttl_seconds: 600
validation_threshold: 0.5
trace_file: "trace.jsonl"
"#;
    let config = parse_config(yaml);
    assert_eq!(config.ttl_seconds, 600);
    assert!((config.validation_threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.trace_file.as_deref(), Some("trace.jsonl"));
    // Everything else gets defaults
    assert_eq!(config.cache_directory, "cache_data");
    assert_eq!(config.resolver_max_attempts, 3);
}

#[test]
fn config_accepts_camel_case_keys() {
    let yaml = r#"
cacheDirectory: ".elements"
resolverMaxAttempts: 5
resolverRetryDelayMs: 0
compareText: true
"#;
    let config = parse_config(yaml);
    assert_eq!(config.cache_directory, ".elements");
    assert_eq!(config.resolver_max_attempts, 5);
    assert_eq!(config.retry_delay(), Duration::ZERO);
    assert!(config.compare_text);
}

#[test]
fn config_malformed_yaml_falls_back_to_defaults() {
    let config = parse_config("ttl_seconds: [not, a, number");
    assert_eq!(config, ElementCacheConfig::default());
}

#[test]
fn cli_cache_dir_overrides_config() {
    let cli = Cli::parse_from(["element-cache", "list", "--cache-dir", "override"]);
    let config = apply_overrides(parse_config("cache_directory: from_file"), &cli);
    assert_eq!(config.cache_directory, "override");

    let cli = Cli::parse_from(["element-cache", "list"]);
    let config = apply_overrides(parse_config("cache_directory: from_file"), &cli);
    assert_eq!(config.cache_directory, "from_file");
}

// ============================================================================
// Output Formatting Tests
// ============================================================================

#[test]
fn format_age_units() {
    assert_eq!(format_age(-3.0), "0s");
    assert_eq!(format_age(42.9), "42s");
    assert_eq!(format_age(303.0), "5m 3s");
    assert_eq!(format_age(7_800.0), "2h 10m");
    assert_eq!(format_age(273_600.0), "3d 4h");
}

#[test]
fn format_entry_list_sorts_by_url() {
    let entries = vec![
        (
            "k2".to_string(),
            IndexRecord {
                url: "https://x.test/b".into(),
                timestamp: 900.0,
                element_count: 4,
                version: 2,
            },
        ),
        (
            "k1".to_string(),
            IndexRecord {
                url: "https://x.test/a?q=1".into(),
                timestamp: 990.0,
                element_count: 12,
                version: 1,
            },
        ),
    ];

    let out = format_entry_list(&entries, 1000.0);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "2 cached page(s):");
    assert_eq!(lines[1], "  https://x.test/a?q=1  elements=12  version=1  age=10s");
    assert_eq!(lines[2], "  https://x.test/b  elements=4  version=2  age=1m 40s");
}

#[test]
fn format_entry_list_empty() {
    assert_eq!(format_entry_list(&[], 0.0), "No cached pages.");
}
