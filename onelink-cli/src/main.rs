use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use onelink::*;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let config = load_config(&matches).await?;

    match matches.subcommand() {
        Some(("embed", sub_matches)) => embed_command(&config, sub_matches)?,
        Some(("slug", sub_matches)) => slug_command(sub_matches)?,
        Some(("migrate", sub_matches)) => migrate_command(&config, sub_matches).await?,
        Some(("blocks", sub_matches)) => blocks_command(&config, sub_matches).await?,
        Some(("page", sub_matches)) => page_command(&config, sub_matches).await?,
        _ => {
            build_cli().print_help()?;
            std::process::exit(1);
        }
    }

    Ok(())
}

fn database_url_arg() -> Arg {
    Arg::new("database-url")
        .short('d')
        .long("database-url")
        .value_name("URL")
        .help("PostgreSQL connection URL (overrides DATABASE_URL and the config file)")
}

fn build_cli() -> Command {
    Command::new("onelink")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Check embed input and slugs, and inspect stored OneLink pages")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("YAML configuration file"),
        )
        .subcommand(
            Command::new("embed")
                .about("Classify a URL or iframe snippet against the trusted domains")
                .arg(
                    Arg::new("input")
                        .value_name("INPUT")
                        .help("URL or embed code; read from stdin when omitted"),
                )
                .arg(
                    Arg::new("title")
                        .short('t')
                        .long("title")
                        .value_name("TITLE")
                        .help("Accessible title for the generated frame"),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .action(ArgAction::SetTrue)
                        .help("Print the sandboxed iframe markup instead of the URL"),
                ),
        )
        .subcommand(
            Command::new("slug")
                .about("Check a profile slug against the slug rules")
                .arg(Arg::new("slug").value_name("SLUG").required(true)),
        )
        .subcommand(
            Command::new("migrate")
                .about("Create the profiles, blocks and questions tables")
                .arg(database_url_arg()),
        )
        .subcommand(
            Command::new("blocks")
                .about("Print a profile's stored blocks in display order")
                .arg(
                    Arg::new("profile")
                        .short('p')
                        .long("profile")
                        .value_name("ID")
                        .required(true)
                        .help("Profile (owner) id"),
                )
                .arg(database_url_arg()),
        )
        .subcommand(
            Command::new("page")
                .about("Print the public page for a slug, with embed render decisions")
                .arg(Arg::new("slug").value_name("SLUG").required(true))
                .arg(database_url_arg()),
        )
}

async fn load_config(matches: &ArgMatches) -> Result<Config> {
    match matches.get_one::<String>("config") {
        Some(path) => {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!("Config file '{}' does not exist", path.display());
            }
            let config = parse_config_file(&path).await?;
            validate_config(&config)?;
            tracing::debug!(
                path = %path.display(),
                trusted_domains = config.embed.trusted_domains.len(),
                "loaded config"
            );
            Ok(config)
        }
        None => {
            tracing::debug!("no config file, using built-in defaults");
            Ok(Config::default())
        }
    }
}

/// Flag first, then `DATABASE_URL`, then the config file
fn resolve_database_url(config: &Config, matches: &ArgMatches) -> Result<String> {
    if let Some(url) = matches.get_one::<String>("database-url") {
        tracing::debug!(source = "--database-url", "resolved database URL");
        return Ok(url.clone());
    }
    if let Ok(url) = std::env::var("DATABASE_URL") {
        tracing::debug!(source = "DATABASE_URL", "resolved database URL");
        return Ok(url);
    }
    tracing::debug!(source = "config", "resolving database URL");
    config
        .database_url
        .clone()
        .context("No database URL: pass --database-url, set DATABASE_URL or add database_url to the config file")
}

async fn connect(config: &Config, matches: &ArgMatches) -> Result<PgStore> {
    let database_url = resolve_database_url(config, matches)?;
    PgStore::connect(&database_url)
        .await
        .context("Failed to connect to database")
}

fn embed_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let input = match matches.get_one::<String>("input") {
        Some(input) => input.clone(),
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?,
    };

    let engine = TrustEngine::from_config(&config.embed);
    let trusted = match engine.classify(&input) {
        Ok(trusted) => trusted,
        Err(err) => {
            tracing::info!(kind = ?err.kind(), "embed input rejected");
            eprintln!("✗ {}", err);
            std::process::exit(2);
        }
    };

    if matches.get_flag("html") {
        let title = matches.get_one::<String>("title").map(String::as_str);
        let options = engine.frame_defaults().clone().with_title(title);
        let frame = engine.build_frame(trusted.as_str(), &options)?;
        println!("{}", frame.to_html());
    } else {
        println!("{}", trusted);
    }

    Ok(())
}

fn slug_command(matches: &ArgMatches) -> Result<()> {
    let raw = matches
        .get_one::<String>("slug")
        .context("slug argument is required")?;

    match Slug::parse(raw) {
        Ok(slug) => {
            println!("✓ '{}' is a valid slug", slug);
            Ok(())
        }
        Err(err) => {
            eprintln!("✗ {}", err);
            std::process::exit(2);
        }
    }
}

async fn migrate_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let store = connect(config, matches).await?;
    store.migrate().await.context("Failed to apply schema")?;
    println!("✓ Schema applied");
    Ok(())
}

async fn blocks_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let profile_id = matches
        .get_one::<String>("profile")
        .context("--profile is required")?;
    let store = connect(config, matches).await?;

    let blocks = BlockReconciler::new(Arc::new(store))
        .load(profile_id)
        .await
        .with_context(|| format!("Failed to load blocks for profile '{}'", profile_id))?;

    let json = blocks
        .iter()
        .map(ContentBlock::to_json)
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn page_command(config: &Config, matches: &ArgMatches) -> Result<()> {
    let slug = matches
        .get_one::<String>("slug")
        .context("slug argument is required")?;
    let store = connect(config, matches).await?;
    let app = OneLink::new(Arc::new(store), TrustEngine::from_config(&config.embed));

    let page = app
        .public_page(slug)
        .await
        .with_context(|| format!("Failed to load page '{}'", slug))?;

    let mut json = page.to_json()?;
    json["embeds"] = serde_json::to_value(page.embed_plans(app.engine(), &MediaPlayers))?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_flag_wins_over_config() {
        let matches = build_cli()
            .try_get_matches_from([
                "onelink",
                "blocks",
                "--profile",
                "owner-1",
                "--database-url",
                "postgresql://flag/onelink",
            ])
            .unwrap();
        let (_, sub_matches) = matches.subcommand().unwrap();
        let config = Config {
            database_url: Some("postgresql://config/onelink".to_string()),
            ..Config::default()
        };

        assert_eq!(
            resolve_database_url(&config, sub_matches).unwrap(),
            "postgresql://flag/onelink"
        );
    }

    #[test]
    fn test_embed_subcommand_arguments() {
        let matches = build_cli()
            .try_get_matches_from(["onelink", "embed", "https://vimeo.com/1", "--html", "-t", "Clip"])
            .unwrap();
        let (name, sub_matches) = matches.subcommand().unwrap();
        assert_eq!(name, "embed");
        assert!(sub_matches.get_flag("html"));
        assert_eq!(
            sub_matches.get_one::<String>("title").map(String::as_str),
            Some("Clip")
        );
    }
}
