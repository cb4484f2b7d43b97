use anyhow::{bail, Context, Result};
use serde::Serialize;
use shortcutsmith::{
    backup::{self, BackupManager},
    checksum,
    config::AppConfig,
    keyvalues::text,
    logging::{self, Verbosity},
    shortcuts::{self, Encoding, ShortcutRecord},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

struct GlobalOptions {
    format: OutputFormat,
    verbosity: Verbosity,
    steam_root: Option<PathBuf>,
    data_dir: Option<PathBuf>,
}

enum CliCommand {
    List(PathBuf),
    Dump(PathBuf),
    Convert {
        input: PathBuf,
        output: PathBuf,
        to: Encoding,
    },
    Add(AddOptions),
    Remove {
        file: PathBuf,
        app_id: u32,
    },
    Id {
        exe: String,
        name: String,
    },
    Snapshot(PathBuf),
    Backups(String),
    Restore {
        backup: PathBuf,
        user: Option<String>,
    },
    Users,
    Paths,
    Help,
    Version,
}

struct AddOptions {
    file: PathBuf,
    name: String,
    exe: String,
    start_dir: Option<String>,
    launch_options: Option<String>,
    icon: Option<String>,
    tags: Vec<String>,
    hidden: bool,
    to: Option<Encoding>,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (global, tokens) = parse_global_options(&args)?;
    let command = parse_command(&tokens)?;
    match command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            println!("shortcutsmith v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    let mut config = match &global.data_dir {
        Some(dir) => AppConfig::load_or_create_in(dir)?,
        None => AppConfig::load_or_create()?,
    };
    if let Some(root) = global.steam_root {
        config.steam_root = Some(root);
    }
    logging::init(global.verbosity, Some(config.data_dir.as_path()))?;

    let manager = config.backup_manager();
    run_command(&config, &manager, command, global.format)
}

fn parse_global_options(args: &[String]) -> Result<(GlobalOptions, Vec<String>)> {
    let mut global = GlobalOptions {
        format: OutputFormat::Text,
        verbosity: Verbosity::Normal,
        steam_root: None,
        data_dir: None,
    };
    let mut tokens = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--format" => {
                let value = iter.next().context("--format requires a value")?;
                global.format = parse_format(value)?;
            }
            value if value.starts_with("--format=") => {
                global.format = parse_format(value.trim_start_matches("--format="))?;
            }
            "--steam-root" => {
                let value = iter.next().context("--steam-root requires a path")?;
                global.steam_root = Some(PathBuf::from(value));
            }
            "--data-dir" => {
                let value = iter.next().context("--data-dir requires a path")?;
                global.data_dir = Some(PathBuf::from(value));
            }
            "-q" | "--quiet" => global.verbosity = Verbosity::Quiet,
            "--verbose" => global.verbosity = Verbosity::Verbose,
            "--verbosity" => {
                let level = iter.next().context("--verbosity requires a level")?;
                global.verbosity = Verbosity::parse(level)
                    .with_context(|| format!("Unknown verbosity: {level}"))?;
            }
            value if value.starts_with("-v") && value[1..].chars().all(|ch| ch == 'v') => {
                global.verbosity = if value.len() > 2 {
                    Verbosity::Debug
                } else {
                    Verbosity::Verbose
                };
            }
            _ => tokens.push(arg.to_string()),
        }
    }
    Ok((global, tokens))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).with_context(|| format!("Unknown format: {value} (use json or text)"))
}

fn parse_encoding(value: &str) -> Result<Encoding> {
    Encoding::parse(value)
        .with_context(|| format!("Unknown encoding: {value} (use binary or text)"))
}

fn parse_command(tokens: &[String]) -> Result<CliCommand> {
    let Some(head) = tokens.first() else {
        return Ok(CliCommand::Help);
    };
    let rest = &tokens[1..];
    let positional = |index: usize, what: &str| -> Result<String> {
        rest.get(index)
            .cloned()
            .with_context(|| format!("{head} requires {what}"))
    };

    let command = match head.as_str() {
        "-h" | "--help" | "help" => CliCommand::Help,
        "-V" | "--version" | "version" => CliCommand::Version,
        "list" => CliCommand::List(positional(0, "a file")?.into()),
        "dump" => CliCommand::Dump(positional(0, "a file")?.into()),
        "convert" => {
            let (values, flags) = split_flags(rest)?;
            let input = values.first().context("convert requires an input file")?;
            let output = values.get(1).context("convert requires an output file")?;
            let to = flag_value(&flags, "--to").context("convert requires --to <binary|text>")?;
            CliCommand::Convert {
                input: input.into(),
                output: output.into(),
                to: parse_encoding(to)?,
            }
        }
        "add" => CliCommand::Add(parse_add(rest)?),
        "remove" => CliCommand::Remove {
            file: positional(0, "a file")?.into(),
            app_id: parse_app_id(&positional(1, "an app id")?)?,
        },
        "id" => CliCommand::Id {
            exe: positional(0, "an executable path")?,
            name: positional(1, "a display name")?,
        },
        "snapshot" => CliCommand::Snapshot(positional(0, "a file")?.into()),
        "backups" => CliCommand::Backups(positional(0, "a file or identity key")?),
        "restore" => {
            let (values, flags) = split_flags(rest)?;
            let backup = values.first().context("restore requires a snapshot file")?;
            CliCommand::Restore {
                backup: backup.into(),
                user: flag_value(&flags, "--user").map(str::to_string),
            }
        }
        "users" => CliCommand::Users,
        "paths" => CliCommand::Paths,
        other => bail!("Unknown command: {other} (see --help)"),
    };
    Ok(command)
}

/// Splits `--flag value` pairs from positional values. `--hidden` takes no value.
fn split_flags(args: &[String]) -> Result<(Vec<String>, Vec<(String, String)>)> {
    let mut values = Vec::new();
    let mut flags = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--hidden" {
            flags.push((arg.clone(), String::new()));
        } else if let Some((name, value)) = arg.split_once('=').filter(|_| arg.starts_with("--")) {
            flags.push((name.to_string(), value.to_string()));
        } else if arg.starts_with("--") {
            let value = iter
                .next()
                .with_context(|| format!("{arg} requires a value"))?;
            flags.push((arg.clone(), value.clone()));
        } else {
            values.push(arg.clone());
        }
    }
    Ok((values, flags))
}

fn flag_value<'a>(flags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    flags
        .iter()
        .rev()
        .find(|(flag, _)| flag == name)
        .map(|(_, value)| value.as_str())
}

fn parse_add(args: &[String]) -> Result<AddOptions> {
    let (values, flags) = split_flags(args)?;
    let file = values.first().context("add requires a file")?;
    let name = flag_value(&flags, "--name").context("add requires --name")?;
    let exe = flag_value(&flags, "--exe").context("add requires --exe")?;
    let to = flag_value(&flags, "--to").map(parse_encoding).transpose()?;
    Ok(AddOptions {
        file: file.into(),
        name: name.to_string(),
        exe: exe.to_string(),
        start_dir: flag_value(&flags, "--start-dir").map(str::to_string),
        launch_options: flag_value(&flags, "--options").map(str::to_string),
        icon: flag_value(&flags, "--icon").map(str::to_string),
        tags: flags
            .iter()
            .filter(|(flag, _)| flag == "--tag")
            .map(|(_, value)| value.clone())
            .collect(),
        hidden: flags.iter().any(|(flag, _)| flag == "--hidden"),
        to,
    })
}

/// Accepts the unsigned form and the signed form binary files store.
fn parse_app_id(value: &str) -> Result<u32> {
    if let Ok(id) = value.parse::<u32>() {
        return Ok(id);
    }
    value
        .parse::<i32>()
        .map(|id| id as u32)
        .with_context(|| format!("Invalid app id: {value}"))
}

fn run_command(
    config: &AppConfig,
    manager: &BackupManager,
    command: CliCommand,
    format: OutputFormat,
) -> Result<()> {
    match command {
        CliCommand::List(path) => list_shortcuts(&path, format),
        CliCommand::Dump(path) => dump_tree(&path),
        CliCommand::Convert { input, output, to } => {
            let (records, _) = load_records(&input)?;
            manager.write_with_backup_as(&output, &records, to)?;
            println!(
                "Wrote {} shortcut(s) to {} ({})",
                records.len(),
                output.display(),
                to.as_str()
            );
            Ok(())
        }
        CliCommand::Add(options) => add_shortcut(config, manager, options, format),
        CliCommand::Remove { file, app_id } => {
            let (mut records, encoding) = load_records(&file)?;
            let before = records.len();
            records.retain(|record| record.app_id != app_id);
            if records.len() == before {
                bail!("No shortcut with app id {app_id} in {}", file.display());
            }
            let encoding = encoding.unwrap_or(config.default_encoding);
            manager.write_with_backup_as(&file, &records, encoding)?;
            println!("Removed {} shortcut(s)", before - records.len());
            Ok(())
        }
        CliCommand::Id { exe, name } => show_id(&exe, &name, format),
        CliCommand::Snapshot(path) => {
            let key = backup::derive_identity_key(&path);
            match manager.snapshot(&path, &key)? {
                Some(snapshot) => println!("Snapshot: {}", snapshot.display()),
                None => println!("Nothing to snapshot at {}", path.display()),
            }
            Ok(())
        }
        CliCommand::Backups(target) => list_backups(manager, &target, format),
        CliCommand::Restore { backup, user } => {
            let key = match user {
                Some(key) => key,
                None => snapshot_owner(&backup).with_context(|| {
                    format!("cannot tell which user {} belongs to; pass --user", backup.display())
                })?,
            };
            let target = manager.restore(&backup, &key)?;
            println!("Restored {} to {}", backup.display(), target.display());
            Ok(())
        }
        CliCommand::Users => list_users(config, format),
        CliCommand::Paths => list_paths(config, manager, format),
        CliCommand::Help | CliCommand::Version => Ok(()),
    }
}

fn load_records(path: &Path) -> Result<(Vec<ShortcutRecord>, Option<Encoding>)> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    shortcuts::decode_shortcuts(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Identity key of a snapshot inside the backups tree: its parent directory.
fn snapshot_owner(backup: &Path) -> Option<String> {
    backup
        .parent()?
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
}

#[derive(Serialize)]
struct ShortcutListItem<'a> {
    #[serde(flatten)]
    record: &'a ShortcutRecord,
    launch_url: String,
}

fn list_shortcuts(path: &Path, format: OutputFormat) -> Result<()> {
    let (records, _) = load_records(path)?;
    match format {
        OutputFormat::Json => {
            let items: Vec<ShortcutListItem<'_>> = records
                .iter()
                .map(|record| ShortcutListItem {
                    record,
                    launch_url: record.launch_url(),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No shortcuts in {}", path.display());
            }
            for record in &records {
                let hidden = if record.is_hidden { " (hidden)" } else { "" };
                println!("{:>10}  {}{hidden}", record.app_id, record.app_name);
                println!("            exe: {}", record.exe);
                if !record.launch_options.is_empty() {
                    println!("            options: {}", record.launch_options);
                }
                if !record.tags.is_empty() {
                    println!("            tags: {}", record.tags.join(", "));
                }
            }
        }
    }
    Ok(())
}

fn dump_tree(path: &Path) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let Some(encoding) = Encoding::detect(&bytes) else {
        return Ok(());
    };
    let tree = shortcuts::decode_tree(&bytes, encoding)
        .with_context(|| format!("parse {}", path.display()))?;
    print!("{}", text::encode(&tree));
    Ok(())
}

fn add_shortcut(
    config: &AppConfig,
    manager: &BackupManager,
    options: AddOptions,
    format: OutputFormat,
) -> Result<()> {
    let (mut records, existing) = if options.file.exists() {
        load_records(&options.file)?
    } else {
        (Vec::new(), None)
    };
    let encoding = options
        .to
        .or(existing)
        .unwrap_or(config.default_encoding);

    let mut record = ShortcutRecord::new(options.name, options.exe);
    if let Some(start_dir) = options.start_dir {
        record.start_dir = start_dir;
    }
    if let Some(launch_options) = options.launch_options {
        record.launch_options = launch_options;
    }
    if let Some(icon) = options.icon {
        record.icon = icon;
    }
    record.tags = options.tags;
    record.is_hidden = options.hidden;

    match records.iter_mut().find(|entry| entry.app_id == record.app_id) {
        Some(entry) => *entry = record.clone(),
        None => records.push(record.clone()),
    }
    manager.write_with_backup_as(&options.file, &records, encoding)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Text => {
            println!("Added {} ({})", record.app_name, record.app_id);
            println!("Launch: {}", record.launch_url());
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct IdOutput {
    app_id: u32,
    app_id_signed: i32,
    launch_game_id: u64,
    launch_url: String,
}

fn show_id(exe: &str, name: &str, format: OutputFormat) -> Result<()> {
    let app_id = checksum::derive_shortcut_id(exe, name);
    let output = IdOutput {
        app_id,
        app_id_signed: app_id as i32,
        launch_game_id: checksum::to_launch_game_id(app_id),
        launch_url: checksum::launch_url(app_id),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("App id: {} ({})", output.app_id, output.app_id_signed);
            println!("Launch id: {}", output.launch_game_id);
            println!("URL: {}", output.launch_url);
        }
    }
    Ok(())
}

fn list_backups(manager: &BackupManager, target: &str, format: OutputFormat) -> Result<()> {
    let key = if target.contains(['/', '\\']) || Path::new(target).exists() {
        backup::derive_identity_key(Path::new(target))
    } else {
        target.to_string()
    };
    let snapshots = manager.list_snapshots(&key)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshots)?),
        OutputFormat::Text => {
            println!("Snapshots for {key} (keeping {}):", manager.retention());
            if snapshots.is_empty() {
                println!("  none");
            }
            for snapshot in &snapshots {
                println!(
                    "  {}  {:>8} B  {}",
                    snapshot.fingerprint,
                    snapshot.size,
                    snapshot.path.display()
                );
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct UserItem {
    id: String,
    shortcuts_path: String,
    has_shortcuts: bool,
}

fn list_users(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let Some(layout) = config.steam_layout() else {
        bail!("No Steam installation found; pass --steam-root");
    };
    let users: Vec<UserItem> = layout
        .user_ids()
        .into_iter()
        .map(|id| {
            let path = layout.shortcuts_path(&id);
            UserItem {
                has_shortcuts: path.exists(),
                shortcuts_path: path.display().to_string(),
                id,
            }
        })
        .collect();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&users)?),
        OutputFormat::Text => {
            for user in &users {
                let marker = if user.has_shortcuts { "" } else { " (no shortcuts)" };
                println!("{}  {}{marker}", user.id, user.shortcuts_path);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct PathsOutput {
    data_dir: String,
    backups_dir: String,
    steam_root: Option<String>,
    default_encoding: Encoding,
    backup_retention: usize,
}

fn list_paths(config: &AppConfig, manager: &BackupManager, format: OutputFormat) -> Result<()> {
    let output = PathsOutput {
        data_dir: config.data_dir.display().to_string(),
        backups_dir: manager.backups_root().display().to_string(),
        steam_root: manager
            .layout()
            .map(|layout| layout.root().display().to_string()),
        default_encoding: config.default_encoding,
        backup_retention: manager.retention(),
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Text => {
            println!("Data dir: {}", output.data_dir);
            println!("Backups: {}", output.backups_dir);
            match &output.steam_root {
                Some(root) => println!("Steam root: {root}"),
                None => println!("Steam root: not found"),
            }
            println!("Default encoding: {}", output.default_encoding.as_str());
            println!("Snapshots kept: {}", output.backup_retention);
        }
    }
    Ok(())
}

fn print_help() {
    println!("shortcutsmith v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  shortcutsmith list <file>                    List shortcuts");
    println!("  shortcutsmith dump <file>                    Print the raw tree as text");
    println!("  shortcutsmith convert <in> <out> --to <enc>  Rewrite in binary or text form");
    println!("  shortcutsmith add <file> --name <n> --exe <path>");
    println!("        [--start-dir <dir>] [--options <opts>] [--icon <path>]");
    println!("        [--tag <tag>]... [--hidden] [--to <enc>]");
    println!("  shortcutsmith remove <file> <appid>          Remove a shortcut");
    println!("  shortcutsmith id <exe> <name>                Show derived app id");
    println!("  shortcutsmith snapshot <file>                Snapshot a file now");
    println!("  shortcutsmith backups <file|user>            List snapshots");
    println!("  shortcutsmith restore <snapshot> [--user <id>]");
    println!("  shortcutsmith users                          List Steam users");
    println!("  shortcutsmith paths                          Show resolved paths");
    println!();
    println!("Global options:");
    println!("  --format <json|text>            Output format");
    println!("  --steam-root <path>             Steam installation to use");
    println!("  --data-dir <path>               Config and backups location");
    println!("  -q, --quiet                     Errors only");
    println!("  -v, -vv                         Increase verbosity");
    println!("  --verbosity <level>             quiet | normal | verbose | debug");
    println!("  -h, --help                      Show help");
    println!("  -V, --version                   Show version");
}
