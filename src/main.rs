// KfdVault - Point d'entree
// Gestion de conteneurs de cles chiffres et chargement vers une radio
//
// Ce binaire est une surcouche fine : chaque commande ouvre l'App,
// appelle le modele ou le moteur keyload, puis ferme l'App (sauvegarde
// finale si la collection a ete modifiee).
//
// # Phrase de passe
// `--passphrase`, sinon la variable KFDVAULT_PASSPHRASE. Jamais stockee.
//
// # Logs
// `RUST_LOG` a priorite ; sinon la cle `log_level` de la configuration.

use clap::{Args, Parser, Subcommand};
use kfdvault::app::App;
use kfdvault::config::settings::{config_path, default_data_dir, Settings};
use kfdvault::constants::PASSPHRASE_ENV_VAR;
use kfdvault::container::entry::{KeyContainer, KeyEntry};
use kfdvault::error::{KvError, KvResult};
use kfdvault::keyload::engine::SessionOutcome;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Encrypted key container store and keyload tool")]
struct Cli {
    /// Configuration file (default: config.txt in the data directory).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the configuration.
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,

    /// Container passphrase (falls back to KFDVAULT_PASSPHRASE).
    #[arg(long, global = true)]
    passphrase: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a commented default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// List containers (`*` marks the active one).
    List,
    /// Show one container and its keys.
    Show {
        index: usize,
        /// Print key material in hex.
        #[arg(long)]
        reveal: bool,
    },
    /// Append a new empty container.
    Add(AddArgs),
    /// Delete a container.
    Remove { index: usize },
    /// Move a container to another position.
    Move { from: usize, to: usize },
    /// Make a container the active one.
    Activate { index: usize },
    /// Append a key to a container.
    AddKey(AddKeyArgs),
    /// Include or exclude a key from the next keyload.
    SelectKey {
        container: usize,
        key: usize,
        /// Exclude instead of include.
        #[arg(long)]
        off: bool,
    },
    /// Delete a key from a container.
    RemoveKey { container: usize, key: usize },
    /// Write one container to an individual encrypted file.
    Export { index: usize, path: PathBuf },
    /// Append a container read from an individual encrypted file.
    Import { path: PathBuf },
    /// List the readable container files of the data directory.
    Scan,
    /// Run a keyload session (active container by default) on the trace link.
    Keyload { index: Option<usize> },
    /// Re-encrypt the collection under a new passphrase.
    ChangePassphrase {
        #[arg(long)]
        new: String,
    },
    /// Erase every stored container and restore the built-in defaults.
    FactoryReset {
        /// Confirm the destructive reset.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct AddArgs {
    label: String,
    #[arg(long, default_value = "")]
    agency: String,
    #[arg(long, default_value = "")]
    band: String,
    #[arg(long, default_value = "")]
    algorithm: String,
    /// Administrative lock flag.
    #[arg(long)]
    locked: bool,
}

#[derive(Args, Debug)]
struct AddKeyArgs {
    container: usize,
    #[arg(long)]
    keyset: u16,
    #[arg(long)]
    key_id: u16,
    /// Algorithm identifier, decimal or 0x-prefixed hex.
    #[arg(long, value_parser = parse_algorithm)]
    algorithm: u8,
    /// Key material in hex (spaces allowed).
    #[arg(long)]
    hex: String,
    #[arg(long, default_value = "")]
    label: String,
    /// Do not select the key for keyload.
    #[arg(long)]
    unselected: bool,
}

fn parse_algorithm(s: &str) -> Result<u8, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(h) => u8::from_str_radix(h, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid algorithm id `{s}`: {e}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = resolve_config_path(&cli);
    let mut settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("kfdvault: {} ({})", e, config_path.display());
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }

    init_tracing(&settings.log_level);

    match run(cli, settings, config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("kfdvault: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `--config`, sinon config.txt dans `--data-dir` ou le repertoire par defaut.
fn resolve_config_path(cli: &Cli) -> PathBuf {
    match (&cli.config, &cli.data_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => config_path(dir),
        (None, None) => config_path(&default_data_dir()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn passphrase(cli: &Cli) -> KvResult<String> {
    cli.passphrase
        .clone()
        .or_else(|| std::env::var(PASSPHRASE_ENV_VAR).ok())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            KvError::Config(format!(
                "no passphrase: use --passphrase or set {PASSPHRASE_ENV_VAR}"
            ))
        })
}

fn run(cli: Cli, settings: Settings, config_path: PathBuf) -> KvResult<()> {
    if let Command::InitConfig { force } = cli.command {
        if config_path.exists() && !force {
            return Err(KvError::Config(format!(
                "{} already exists (use --force)",
                config_path.display()
            )));
        }
        Settings::save_default(&config_path)?;
        println!("wrote {}", config_path.display());
        return Ok(());
    }

    if let Command::FactoryReset { yes: false } = cli.command {
        return Err(KvError::Config(
            "factory reset erases every container; re-run with --yes".into(),
        ));
    }

    let secret = passphrase(&cli)?;
    let mut app = match cli.command {
        Command::FactoryReset { .. } => App::open_lenient(settings, secret)?,
        _ => App::open(settings, secret)?,
    };

    match cli.command {
        Command::InitConfig { .. } => {}
        Command::List => print_list(&app),
        Command::Show { index, reveal } => print_container(&app, index, reveal)?,
        Command::Add(args) => {
            let container = KeyContainer {
                label: args.label,
                agency: args.agency,
                band: args.band,
                default_algorithm: args.algorithm,
                locked: args.locked,
                keys: Vec::new(),
            };
            let index = app.model_mut().add(container)?;
            println!("added container {index}");
        }
        Command::Remove { index } => {
            let removed = app.model_mut().remove(index)?;
            println!("removed \"{}\"", removed.label);
        }
        Command::Move { from, to } => app.model_mut().move_container(from, to)?,
        Command::Activate { index } => app.model_mut().set_active(index)?,
        Command::AddKey(args) => {
            let key = KeyEntry::from_hex(args.keyset, args.key_id, args.algorithm, &args.hex)
                .map_err(|e| KvError::Config(format!("invalid key hex: {e}")))?
                .with_label(args.label)
                .with_selected(!args.unselected);
            let index = app.model_mut().add_key(args.container, key)?;
            println!("added key {index} to container {}", args.container);
        }
        Command::SelectKey { container, key, off } => {
            app.model_mut().set_key_selected(container, key, !off)?
        }
        Command::RemoveKey { container, key } => {
            app.model_mut().remove_key(container, key)?;
        }
        Command::Export { index, path } => {
            let written = app.export(index, &path)?;
            println!("exported container {index} to {}", written.display());
        }
        Command::Import { path } => {
            let index = app.import(&path)?;
            println!("imported as container {index}");
        }
        Command::Scan => {
            let (found, report) = app.scan()?;
            for (path, container) in &found {
                println!("{}  {}", path.display(), container.label);
            }
            println!(
                "{} file(s), {} loaded, {} unreadable",
                report.files_seen, report.loaded, report.failed
            );
        }
        Command::Keyload { index } => {
            let report = app.run_keyload(index)?;
            println!("container: {}", report.container);
            println!("wire: {}", hex::encode_upper(&report.wire_bytes));
            println!("progress: {}/{}", report.progress.0, report.progress.1);
            match report.outcome {
                SessionOutcome::Completed { sent } => println!("KEYLOAD COMPLETE ({sent} keys)"),
                SessionOutcome::Failed(e) => return Err(e.into()),
                SessionOutcome::Cancelled => println!("KEYLOAD CANCELLED"),
            }
        }
        Command::ChangePassphrase { new } => {
            app.model_mut().change_passphrase(new);
            app.save()?;
            println!("collection re-encrypted");
        }
        Command::FactoryReset { .. } => {
            app.factory_reset()?;
            println!("factory reset complete");
        }
    }

    app.close()
}

fn print_list(app: &App) {
    let active = app.model().active_index();
    for (i, s) in app.model().list().iter().enumerate() {
        println!(
            "{} {:>3}  {:<32} {:<20} {:<10} keys={} selected={}{}{}",
            if Some(i) == active { '*' } else { ' ' },
            i,
            s.label,
            s.agency,
            s.band,
            s.key_count,
            s.selected_count,
            if s.valid_for_keyload { "" } else { " [not loadable]" },
            if s.locked { " [locked]" } else { "" },
        );
    }
}

fn print_container(app: &App, index: usize, reveal: bool) -> KvResult<()> {
    let c = app.model().get(index)?;
    println!("label:     {}", c.label);
    println!("agency:    {}", c.agency);
    println!("band:      {}", c.band);
    println!("algorithm: {}", c.default_algorithm);
    println!("locked:    {}", c.locked);
    for (k, key) in c.keys.iter().enumerate() {
        let material = if reveal {
            key.key_hex()
        } else {
            format!("<{} bytes>", key.key_bytes.len())
        };
        println!(
            "  [{}] {} keyset={} key={} algo=0x{:02X} {} {}",
            k,
            if key.selected { "x" } else { " " },
            key.keyset_id,
            key.key_id,
            key.algorithm_id,
            key.label,
            material
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("0x84"), Ok(0x84));
        assert_eq!(parse_algorithm("132"), Ok(132));
        assert!(parse_algorithm("0x100").is_err());
        assert!(parse_algorithm("aes").is_err());
    }

    #[test]
    fn test_config_follows_data_dir() {
        let cli = Cli::try_parse_from(["kfdvault", "--data-dir", "/srv/kfd", "list"]).unwrap();
        assert_eq!(resolve_config_path(&cli), PathBuf::from("/srv/kfd/config.txt"));

        let cli = Cli::try_parse_from([
            "kfdvault", "--data-dir", "/srv/kfd", "--config", "/etc/kfd.txt", "list",
        ])
        .unwrap();
        assert_eq!(resolve_config_path(&cli), PathBuf::from("/etc/kfd.txt"));
    }

    #[test]
    fn test_cli_parses_commands() {
        let cli = Cli::try_parse_from(["kfdvault", "--passphrase", "pw", "keyload"]).unwrap();
        assert!(matches!(cli.command, Command::Keyload { index: None }));

        let cli = Cli::try_parse_from([
            "kfdvault", "add-key", "0", "--keyset", "1", "--key-id", "2", "--algorithm", "0xAA",
            "--hex", "00 11",
        ])
        .unwrap();
        match cli.command {
            Command::AddKey(args) => {
                assert_eq!(args.algorithm, 0xAA);
                assert_eq!(args.hex, "00 11");
                assert!(!args.unselected);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
