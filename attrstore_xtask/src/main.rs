use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use attrstore_store::{
    AttributeMapApi, AttributeStore, Host, KeyValueApi, SetApi, load_or_init_config,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Load(args) => load(args).await,
        Command::Dump(args) => dump(args).await,
        Command::Stats(args) => stats(args).await,
        Command::RebuildProperties(args) => rebuild_properties(args).await,
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Maintenance utilities for attrstore datastores"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bulk-load a JSON object of owner -> { property: value } into an attribute store.
    Load(LoadArgs),
    /// Print every owner and its properties as JSON.
    Dump(DumpArgs),
    /// Report row counts for an attribute store.
    Stats(StoreArgs),
    /// Rebuild the property index from the names still in use.
    RebuildProperties(StoreArgs),
}

#[derive(Parser)]
struct StoreArgs {
    /// Directory holding attrstore.json (created with sqlite defaults if missing).
    #[arg(long, default_value = ".attrstore")]
    datastore: PathBuf,
    /// Logical name of the attribute store.
    #[arg(long)]
    name: String,
}

#[derive(Parser)]
struct LoadArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// JSON file to load.
    #[arg(long)]
    input: PathBuf,
    /// Remove existing rows before loading.
    #[arg(long, default_value_t = false)]
    clear: bool,
}

#[derive(Parser)]
struct DumpArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Write to this file instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct StoreStats {
    backend: String,
    owners: u64,
    properties: u64,
    values: u64,
    tables: Vec<String>,
}

type OwnerMap = HashMap<String, HashMap<String, String>>;

async fn open(args: &StoreArgs) -> Result<(Host, AttributeStore)> {
    let config = load_or_init_config(&args.datastore)
        .with_context(|| format!("load config under {}", args.datastore.display()))?;
    let host = Host::connect(&config, &args.datastore)
        .await
        .with_context(|| format!("connect to {} backend", config.backend_name()))?;
    let store = AttributeStore::open(&host, &args.name)
        .await
        .with_context(|| format!("open attribute store {}", args.name))?;
    Ok((host, store))
}

fn parse_owner_map(raw: &str) -> Result<OwnerMap> {
    serde_json::from_str(raw)
        .map_err(|err| anyhow!("expected owner -> {{ property: value }}: {err}"))
}

async fn load(args: LoadArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .with_context(|| format!("read {}", args.input.display()))?;
    let entries = parse_owner_map(&raw)
        .with_context(|| format!("parse {}", args.input.display()))?;
    let (_, store) = open(&args.store).await?;
    if args.clear {
        store.clear().await.context("clear attribute store")?;
    }
    let report = store.set_large_map(&entries).await.context("bulk load")?;
    println!(
        "loaded {} values into {} (new owners={} known owners={} new properties={})",
        report.values_written,
        args.store.name,
        report.new_owners,
        report.known_owners,
        report.new_properties
    );
    Ok(())
}

async fn collect(store: &AttributeStore) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut out = BTreeMap::new();
    for owner in store.owners().await? {
        let values = store
            .owner_map(&owner)
            .await
            .with_context(|| format!("read owner {owner}"))?;
        out.insert(owner, values.into_iter().collect());
    }
    Ok(out)
}

async fn dump(args: DumpArgs) -> Result<()> {
    let (_, store) = open(&args.store).await?;
    let payload = serde_json::to_string_pretty(&collect(&store).await?)?;
    match args.out {
        Some(path) => {
            fs::write(&path, payload).with_context(|| format!("write {}", path.display()))?;
            println!("dumped {} to {}", args.store.name, path.display());
        }
        None => println!("{payload}"),
    }
    Ok(())
}

async fn gather_stats(host: &Host, store: &AttributeStore) -> Result<StoreStats> {
    Ok(StoreStats {
        backend: format!("{:?}", host.backend()).to_lowercase(),
        owners: store.count().await?,
        properties: store.property_set().count().await?,
        values: store.key_value().count().await?,
        tables: vec![
            store.key_value().table().to_string(),
            store.owner_set().table().to_string(),
            store.property_set().table().to_string(),
        ],
    })
}

async fn stats(args: StoreArgs) -> Result<()> {
    let (host, store) = open(&args).await?;
    let stats = gather_stats(&host, &store).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn rebuild_properties(args: StoreArgs) -> Result<()> {
    let (_, store) = open(&args).await?;
    let before = store.property_set().count().await?;
    let after = store
        .rebuild_property_index()
        .await
        .context("rebuild property index")?;
    println!("property index for {} rebuilt: {before} -> {after} names", args.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cli_parses_load_flags() {
        let cli = Cli::parse_from([
            "xtask",
            "load",
            "--name",
            "people",
            "--input",
            "people.json",
            "--clear",
        ]);
        match cli.command {
            Command::Load(args) => {
                assert_eq!(args.store.name, "people");
                assert_eq!(args.store.datastore, PathBuf::from(".attrstore"));
                assert_eq!(args.input, PathBuf::from("people.json"));
                assert!(args.clear);
            }
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn cli_parses_rebuild_properties() {
        let cli = Cli::parse_from([
            "xtask",
            "rebuild-properties",
            "--datastore",
            "/tmp/attrs",
            "--name",
            "people",
        ]);
        match cli.command {
            Command::RebuildProperties(args) => {
                assert_eq!(args.datastore, PathBuf::from("/tmp/attrs"));
                assert_eq!(args.name, "people");
            }
            _ => panic!("expected rebuild-properties"),
        }
    }

    #[test]
    fn cli_requires_store_name() {
        assert!(Cli::try_parse_from(["xtask", "stats"]).is_err());
    }

    #[test]
    fn rejects_non_string_values() {
        assert!(parse_owner_map(r#"{"bob": {"age": 42}}"#).is_err());
        let parsed = parse_owner_map(r#"{"bob": {"age": "42"}}"#).expect("parse");
        assert_eq!(parsed["bob"]["age"], "42");
    }

    #[tokio::test]
    async fn load_then_dump_and_stats() -> Result<()> {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("people.json");
        fs::write(
            &input,
            r#"{"bob": {"age": "42", "city": "Oslo"}, "alice": {"age": "37"}}"#,
        )?;
        let store_args = StoreArgs {
            datastore: dir.path().join("store"),
            name: "people".to_string(),
        };
        load(LoadArgs {
            store: StoreArgs {
                datastore: store_args.datastore.clone(),
                name: store_args.name.clone(),
            },
            input,
            clear: false,
        })
        .await?;

        let (host, store) = open(&store_args).await?;
        let dumped = collect(&store).await?;
        assert_eq!(dumped["bob"]["city"], "Oslo");
        assert_eq!(dumped["alice"]["age"], "37");

        let stats = gather_stats(&host, &store).await?;
        assert_eq!(stats.backend, "sqlite");
        assert_eq!(stats.owners, 2);
        assert_eq!(stats.properties, 2);
        assert_eq!(stats.values, 3);

        store.del_key("bob", "city").await?;
        rebuild_properties(store_args).await?;
        assert_eq!(store.all_encountered_keys().await?, vec!["age".to_string()]);
        Ok(())
    }
}
