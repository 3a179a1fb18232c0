use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use tablemap::{ConnectionConfig, Hydration, PersistentMap, QueryResult, Value, codec};
use tracing::debug;

use super::{Cli, Command};

pub async fn run(cli: Cli) -> Result<()> {
    let config = match cli.url.as_deref() {
        Some(url) => ConnectionConfig::with_url(&cli.name, url),
        None => ConnectionConfig::from_env(&cli.name)?,
    };
    let hydration = if cli.lazy {
        Hydration::Lazy
    } else {
        Hydration::Eager
    };
    let config = config.hydration(hydration).max_connections(2);
    debug!("Connecting to {}", config.to_url());

    let map = PersistentMap::connect(config).context("Invalid connection settings")?;
    let mut cache: BTreeMap<String, Value> = BTreeMap::new();
    map.init(&mut cache)
        .await
        .with_context(|| format!("Failed to initialize collection '{}'", map.name()))?;

    let outcome = execute(&map, &mut cache, cli.command).await;
    map.close().await;
    outcome
}

async fn execute(
    map: &PersistentMap,
    cache: &mut BTreeMap<String, Value>,
    command: Command,
) -> Result<()> {
    match command {
        Command::Dump => {
            if map.hydration() == Hydration::Lazy {
                map.fetch_all(cache).await?;
            }
            dump(cache).print();
        }
        Command::Get { key } => match map.fetch(key.as_str()).await? {
            Some(value) => println!("{}", value),
            None => bail!("Key '{}' not found in '{}'", key, map.name()),
        },
        Command::Set { key, value, json } => {
            let value = if json {
                let parsed: serde_json::Value = serde_json::from_str(&value)
                    .with_context(|| format!("VALUE is not valid JSON: {}", value))?;
                Value::from(parsed)
            } else {
                Value::from(value)
            };
            map.set_async(key.as_str(), value).await?;
            println!("OK");
        }
        Command::Delete { key } => {
            map.delete_async(key.as_str()).await?;
            println!("OK");
        }
        Command::Has { key } => {
            println!("{}", map.has(key.as_str()).await?);
        }
        Command::Count => {
            println!("{}", map.count().await?);
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to truncate '{}' without --yes", map.name());
            }
            map.bulk_delete().await?;
            println!("Truncated {}", map.name());
        }
    }
    Ok(())
}

fn dump(cache: &BTreeMap<String, Value>) -> QueryResult {
    QueryResult::new(
        vec!["key".into(), "value".into()],
        cache
            .iter()
            .map(|(key, value)| vec![key.clone(), codec::encode(value)])
            .collect(),
    )
}
