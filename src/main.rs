use clap::Parser;
use element_cache::cache::store::ElementStore;
use element_cache::cli::commands::{cmd_clear, cmd_find, cmd_info, cmd_list, cmd_refresh, cmd_show};
use element_cache::cli::config::{Cli, Commands, apply_overrides, load_config};
use element_cache::resolver::description::{ElementDescription, TextMatch};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("element_cache={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Resolve settings: CLI > config file > defaults
    let config = apply_overrides(load_config(cli.config.as_deref()), &cli);

    match &cli.command {
        Commands::List => cmd_list(&ElementStore::open(config.cache_path())),
        Commands::Info { url } => cmd_info(&ElementStore::open(config.cache_path()), url),
        Commands::Show { url } => cmd_show(&ElementStore::open(config.cache_path()), url)?,
        Commands::Clear { url } => {
            cmd_clear(&ElementStore::open(config.cache_path()), url.as_deref())
        }
        Commands::Refresh { url, force, helper } => cmd_refresh(&config, url, *force, helper)?,
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
            let description = ElementDescription {
                handle: handle.clone(),
                selector: selector.clone(),
                role: role.clone(),
                name: name.clone(),
                text: text.clone(),
                text_match: if *exact { TextMatch::Exact } else { TextMatch::Fuzzy },
                tag: tag.clone(),
                interactive_only: false,
            };
            if !cmd_find(&config, url, &description, helper)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
