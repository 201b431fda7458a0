use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use ttrss_core::{
    cat_id, feed_id, ArticleField, FeedsQuery, HeadlinesQuery, Session, SessionOptions, UpdateMode, UreqTransport,
    ViewMode, DEFAULT_COUNTER_MODE,
};

mod config;
mod tree;

use config::Config;

/// Command-line client for a Tiny Tiny RSS server.
#[derive(Parser, Debug)]
#[command(name = "ttrss", version)]
struct Cli {
    /// Config file (defaults to the platform config dir, e.g. ~/.config/ttrss/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API endpoint, e.g. https://host/tt-rss/api/
    #[arg(long, global = true)]
    url: Option<String>,

    #[arg(long, global = true)]
    user: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Server version, API level and unread count
    Status,
    /// Print the category/feed tree
    Tree {
        #[arg(long)]
        include_empty: bool,
    },
    /// List feeds as JSON
    Feeds {
        #[arg(long, default_value_t = cat_id::ALL_EXCLUDING_VIRTUAL, allow_hyphen_values = true)]
        cat: i64,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        #[arg(long)]
        unread_only: bool,
        #[arg(long)]
        nested: bool,
    },
    /// List categories with unread counts
    Categories {
        #[arg(long)]
        nested: bool,
    },
    /// Print headlines, one per line
    Headlines {
        #[arg(long, default_value_t = feed_id::ALL_ARTICLES, allow_hyphen_values = true)]
        feed: i64,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long)]
        unread: bool,
    },
    /// Unread counters as JSON
    Counters {
        #[arg(long, default_value = DEFAULT_COUNTER_MODE)]
        mode: String,
    },
    /// Mark articles read
    MarkRead { ids: Vec<i64> },
    /// Mark articles unread
    MarkUnread { ids: Vec<i64> },
    /// Star articles
    Star { ids: Vec<i64> },
    /// Unstar articles
    Unstar { ids: Vec<i64> },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config_path = cli.config.clone().or_else(config::default_path);
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let creds = config
        .with_env(|key| std::env::var(key).ok())
        .with_flags(cli.url.clone(), cli.user.clone())
        .resolve(config::prompt)?;

    let options = SessionOptions {
        refresh_labels_after_assign: creds.refresh_labels,
    };
    let transport = UreqTransport::with_timeout(creds.timeout);
    let mut session = Session::login_with_options(transport, &creds.url, &creds.user, creds.password(), options)
        .with_context(|| format!("login to {} failed", creds.url))?;

    let result = run(&session, cli.command);
    if let Err(e) = session.logout() {
        tracing::warn!(error = %e, "Logout failed");
    }
    result
}

fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            println!("Version: {}", session.version()?);
            println!("API level: {}", session.api_level()?);
            println!("Unread: {}", session.unread()?);
        }
        Command::Tree { include_empty } => {
            let tree = session.feed_tree(include_empty)?;
            print!("{}", tree::render(&tree));
        }
        Command::Feeds {
            cat,
            limit,
            offset,
            unread_only,
            nested,
        } => {
            let query = FeedsQuery::new(cat)
                .unread_only(unread_only)
                .page(limit, offset)
                .include_nested(nested);
            let feeds = session.feeds(&query)?;
            println!("{}", serde_json::to_string_pretty(&feeds)?);
            println!("{}", feeds.len());
        }
        Command::Categories { nested } => {
            for category in session.categories(false, nested, true)? {
                println!("{:>4}  {category}", category.id);
            }
        }
        Command::Headlines { feed, limit, unread } => {
            let mut query = HeadlinesQuery::new(feed).page(limit, 0);
            if unread {
                query = query.view_mode(ViewMode::Unread);
            }
            let headlines = session.headlines(&query)?;
            for item in headlines.as_array().map(Vec::as_slice).unwrap_or_default() {
                println!(
                    "#{}: {} ({})",
                    item["id"],
                    item["title"].as_str().unwrap_or_default(),
                    item["feed_title"].as_str().unwrap_or_default()
                );
            }
        }
        Command::Counters { mode } => {
            println!("{}", serde_json::to_string_pretty(&session.counters(&mode)?)?);
        }
        Command::MarkRead { ids } => update(session, ids, UpdateMode::Clear, ArticleField::Unread)?,
        Command::MarkUnread { ids } => update(session, ids, UpdateMode::Set, ArticleField::Unread)?,
        Command::Star { ids } => update(session, ids, UpdateMode::Set, ArticleField::Starred)?,
        Command::Unstar { ids } => update(session, ids, UpdateMode::Clear, ArticleField::Starred)?,
    }
    Ok(())
}

fn update(session: &Session, ids: Vec<i64>, mode: UpdateMode, field: ArticleField) -> Result<()> {
    anyhow::ensure!(!ids.is_empty(), "no article ids given");
    let updated = session.update_article(ids, mode, field, None)?;
    println!("Updated: {updated}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_ids_parse() {
        let cli = Cli::try_parse_from(["ttrss", "headlines", "--feed", "-1"]).unwrap();
        assert!(matches!(cli.command, Command::Headlines { feed: -1, .. }));

        let cli = Cli::try_parse_from(["ttrss", "--url", "http://h/api/", "feeds"]).unwrap();
        assert_eq!(cli.url.as_deref(), Some("http://h/api/"));
        assert!(matches!(cli.command, Command::Feeds { cat: -3, limit: 10, .. }));
    }

    #[test]
    fn mark_commands_take_id_lists() {
        let cli = Cli::try_parse_from(["ttrss", "mark-read", "1", "2", "3"]).unwrap();
        match cli.command {
            Command::MarkRead { ids } => assert_eq!(ids, vec![1, 2, 3]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
