use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eventforge::config::AppConfig;
use eventforge::matcher::{self, Convention};
use eventforge::project::record::RecordId;
use eventforge::project::{Collection, ProjectIndex};
use eventforge::session::{Selection, Session};
use eventforge::settings::Settings;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eventforge", version, about = "Populate audio-middleware projects from template events")]
struct Cli {
    /// Project directory (or the project file inside it)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CollectionArg {
    Folder,
    Bank,
    Bus,
    Asset,
    Event,
}

impl From<CollectionArg> for Collection {
    fn from(arg: CollectionArg) -> Self {
        match arg {
            CollectionArg::Folder => Collection::Folder,
            CollectionArg::Bank => Collection::Bank,
            CollectionArg::Bus => Collection::Bus,
            CollectionArg::Asset => Collection::AssetFolder,
            CollectionArg::Event => Collection::Event,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CreateKind {
    Folder,
    Bank,
    Bus,
    Asset,
}

/// Naming convention; falls back to the last values used.
#[derive(Args, Clone)]
struct ConventionArgs {
    /// Filename prefix, e.g. "Mechaflora"
    #[arg(long)]
    prefix: Option<String>,

    /// Character name, e.g. "Weak_Ranged"
    #[arg(long)]
    character: Option<String>,
}

/// Where new events go. Folders, banks and buses accept either an
/// identifier or a path like `event:/SFX/Enemies`.
#[derive(Args, Clone)]
struct TargetArgs {
    /// Destination folder for new events
    #[arg(short, long)]
    destination: Option<String>,

    /// Bank new events are assigned to
    #[arg(long)]
    bank: Option<String>,

    /// Bus new events are routed to
    #[arg(long)]
    bus: Option<String>,

    /// Asset-relative folder for imported audio
    #[arg(long)]
    asset_folder: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a hierarchy (folders, banks, buses, asset folders or events)
    Tree {
        #[arg(value_enum, default_value = "event")]
        collection: CollectionArg,
    },

    /// List the events in a folder and its subfolders
    Events {
        /// Folder identifier or path
        #[arg(default_value = "event:/")]
        folder: String,
    },

    /// Group audio files into events by naming convention
    Match {
        /// Directory of audio files (defaults to the last one used)
        audio_dir: Option<PathBuf>,

        #[command(flatten)]
        convention: ConventionArgs,

        /// Also reconcile against the templates in this folder
        #[arg(long)]
        templates: Option<String>,
    },

    /// Clone a template event, optionally filling it with audio files
    Clone {
        /// Template event identifier or path
        template: String,

        /// Name of the new event
        name: String,

        /// Audio files to import into the new event
        audio: Vec<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Match a directory of audio to templates and create every matched event
    Populate {
        /// Directory of audio files (defaults to the last one used)
        audio_dir: Option<PathBuf>,

        #[command(flatten)]
        convention: ConventionArgs,

        /// Folder holding the template events
        #[arg(long)]
        templates: Option<String>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Build an import request for the external authoring tool
    Request {
        /// Directory of audio files (defaults to the last one used)
        audio_dir: Option<PathBuf>,

        #[command(flatten)]
        convention: ConventionArgs,

        /// Folder holding the template events
        #[arg(long)]
        templates: Option<String>,

        #[command(flatten)]
        target: TargetArgs,

        /// Write the request here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hand the request to the configured tool and report its result
        #[arg(long)]
        run: bool,
    },

    /// Create a folder, bank, bus or asset folder
    Create {
        #[arg(value_enum)]
        kind: CreateKind,

        name: String,

        /// Parent identifier or path (defaults to the master root)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Rename a record
    Rename {
        #[arg(value_enum)]
        collection: CollectionArg,

        /// Identifier or path
        target: String,

        name: String,
    },

    /// Delete a record (refused while anything still depends on it)
    Delete {
        #[arg(value_enum)]
        collection: CollectionArg,

        /// Identifier or path
        target: String,
    },

    /// Register an audio file with the project
    RegisterAudio {
        file: PathBuf,

        /// Asset-relative path (defaults to the file name)
        #[arg(long)]
        asset_path: Option<String>,
    },
}

/// First value present: command line, then last used, then config default.
fn pick(given: Option<String>, remembered: &Option<String>, default: &Option<String>) -> Option<String> {
    given.or_else(|| remembered.clone()).or_else(|| default.clone())
}

fn convention(args: ConventionArgs, settings: &mut Settings) -> Result<Convention> {
    let prefix = args
        .prefix
        .or_else(|| settings.prefix.clone())
        .context("No --prefix given and none remembered")?;
    let character = args
        .character
        .or_else(|| settings.character.clone())
        .context("No --character given and none remembered")?;
    let conv = Convention::new(&prefix, &character).context("Invalid naming convention")?;
    settings.prefix = Some(prefix);
    settings.character = Some(character);
    Ok(conv)
}

fn audio_dir(given: Option<PathBuf>, settings: &mut Settings) -> Result<PathBuf> {
    let dir = given
        .or_else(|| settings.audio_dir.clone())
        .context("No audio directory given and none remembered")?;
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    settings.audio_dir = Some(dir.clone());
    Ok(dir)
}

fn resolve(index: &ProjectIndex, collection: Collection, text: &str) -> Result<RecordId> {
    index
        .resolve(collection, text)
        .with_context(|| format!("Cannot find {} '{}'", collection.label(), text))
}

/// Destination, bank, bus and asset folder for new events.
struct Targets {
    destination: RecordId,
    bank: Option<RecordId>,
    bus: Option<RecordId>,
    asset_folder: String,
}

fn targets(
    index: &ProjectIndex,
    target: &TargetArgs,
    settings: &mut Settings,
    config: &AppConfig,
) -> Result<Targets> {
    let destination = pick(target.destination.clone(), &settings.destination, &None)
        .context("No --destination folder given and none remembered")?;
    let bank = pick(target.bank.clone(), &settings.bank, &config.defaults.bank);
    let bus = pick(target.bus.clone(), &settings.bus, &config.defaults.bus);
    let asset_folder = pick(
        target.asset_folder.clone(),
        &settings.asset_folder,
        &config.defaults.asset_folder,
    )
    .unwrap_or_default();

    let targets = Targets {
        destination: resolve(index, Collection::Folder, &destination)?,
        bank: bank.as_deref().map(|b| resolve(index, Collection::Bank, b)).transpose()?,
        bus: bus.as_deref().map(|b| resolve(index, Collection::Bus, b)).transpose()?,
        asset_folder: asset_folder.clone(),
    };

    settings.destination = Some(destination);
    settings.bank = bank;
    settings.bus = bus;
    settings.asset_folder = Some(asset_folder);
    Ok(targets)
}

fn selection(
    index: &ProjectIndex,
    templates: Option<String>,
    target: &TargetArgs,
    settings: &mut Settings,
    config: &AppConfig,
) -> Result<Selection> {
    let templates = pick(templates, &settings.template_folder, &None)
        .context("No --templates folder given and none remembered")?;
    let template_folder = resolve(index, Collection::Folder, &templates)?;
    let targets = targets(index, target, settings, config)?;
    settings.template_folder = Some(templates);
    Ok(Selection {
        template_folder,
        destination: targets.destination,
        bank: targets.bank,
        bus: targets.bus,
        asset_folder: targets.asset_folder,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();
    let settings_path = eventforge::config::default_settings_path();
    let mut settings = Settings::load(&settings_path);

    // Resolve project path: CLI > last used > config
    let project_path = cli.project.clone().or_else(|| settings.project.clone()).or(config.project.clone());

    let open = |path: &Option<PathBuf>| -> Result<ProjectIndex> {
        let path = path
            .as_ref()
            .context("No project given. Pass --project or set project in config.")?;
        log::info!("Project: {}", path.display());
        ProjectIndex::load(path).with_context(|| format!("Failed to load project {}", path.display()))
    };

    match cli.command {
        Commands::Tree { collection } => {
            let index = open(&project_path)?;
            let collection = Collection::from(collection);
            let root = match collection {
                Collection::Folder | Collection::Event => index.roots().event_folder.clone(),
                Collection::Bank => index.roots().bank_folder.clone(),
                Collection::AssetFolder => index.roots().asset_folder.clone(),
                Collection::Bus => index.master_bus().context("Project has no master bus")?,
            };
            println!("{}", index.display_path(collection, &root));
            for entry in index.tree(collection, &root).iter().skip(1) {
                println!("{}{}  {}", "  ".repeat(entry.depth), entry.name, entry.id);
            }
        }

        Commands::Events { folder } => {
            let index = open(&project_path)?;
            let folder = resolve(&index, Collection::Folder, &folder)?;
            let events = index.events_in_folder(&folder)?;
            if events.is_empty() {
                println!("No events in {}.", index.display_path(Collection::Folder, &folder));
            } else {
                println!("{:<60} {}", "Event", "Id");
                println!("{}", "-".repeat(100));
                for event in events {
                    println!("{:<60} {}", index.display_path(Collection::Event, &event.id), event.id);
                }
            }
        }

        Commands::Match { audio_dir: dir, convention: conv_args, templates } => {
            let conv = convention(conv_args, &mut settings)?;
            let dir = audio_dir(dir, &mut settings)?;
            let templates = templates.or_else(|| settings.template_folder.clone());

            match (templates, &project_path) {
                (Some(templates), Some(_)) => {
                    let index = open(&project_path)?;
                    let folder = resolve(&index, Collection::Folder, &templates)?;
                    let session = Session::new(
                        index,
                        Selection {
                            template_folder: folder.clone(),
                            destination: folder,
                            bank: None,
                            bus: None,
                            asset_folder: String::new(),
                        },
                    )?;
                    let rec = session.analyze(&dir, &conv)?;
                    println!("Matched {} events:", rec.assignments.len());
                    for a in &rec.assignments {
                        println!(
                            "  {:<40} <- {} ({} files)",
                            a.event_name,
                            session.index.display_path(Collection::Event, &a.template),
                            a.files.len()
                        );
                    }
                    print_names("Templates without audio", rec.orphan_events.iter().map(|(n, _)| n.as_str()));
                    print_names("Groups without a template", rec.orphan_groups.keys().map(String::as_str));
                    print_names("Orphan files", rec.orphan_files.iter().map(|f| f.filename.as_str()));
                    settings.template_folder = Some(templates);
                }
                _ => {
                    let files = eventforge::scanner::collect_audio_files(&dir);
                    let result = matcher::match_files_to_events(files, &conv);
                    println!("{} event groups:", result.groups.len());
                    for (name, files) in &result.groups {
                        println!("  {:<40} {} files", name, files.len());
                    }
                    print_names("Orphan files", result.orphans.iter().map(|f| f.filename.as_str()));
                }
            }
        }

        Commands::Clone { template, name, audio, target } => {
            let mut index = open(&project_path)?;
            let template = resolve(&index, Collection::Event, &template)?;
            let targets = targets(&index, &target, &mut settings, &config)?;
            let request = eventforge::cloner::CloneRequest {
                template,
                new_name: name,
                new_id: None,
                destination: targets.destination,
                bank: targets.bank,
                bus: targets.bus,
                audio_files: audio,
                asset_folder: targets.asset_folder,
            };
            let outcome = index.clone_event(&request).context("Clone failed")?;
            println!(
                "Created {} {} ({} records, {} audio files)",
                index.display_path(Collection::Event, &outcome.event),
                outcome.event,
                outcome.records,
                outcome.audio_files.len()
            );
            print_paths("Skipped unreadable audio", &outcome.skipped_audio);
        }

        Commands::Populate { audio_dir: dir, convention: conv_args, templates, target } => {
            let index = open(&project_path)?;
            let conv = convention(conv_args, &mut settings)?;
            let dir = audio_dir(dir, &mut settings)?;
            let selection = selection(&index, templates, &target, &mut settings, &config)?;
            let mut session = Session::new(index, selection)?;

            let report = session.populate(&dir, &conv).context("Populate failed")?;
            println!(
                "Populate complete: {} created, {} already present, {} failed",
                report.created.len(),
                report.skipped.len(),
                report.failures.len()
            );
            for (name, id) in &report.created {
                println!("  + {:<40} {}", name, id);
            }
            print_names("Already present", report.skipped.iter().map(String::as_str));
            print_names("Templates without audio", report.orphan_events.iter().map(String::as_str));
            print_names("Orphan files", report.orphan_files.iter().map(|f| f.filename.as_str()));
            print_paths("Unreadable audio", &report.unreadable_audio);
            for (name, error) in &report.failures {
                println!("  ! {}: {}", name, error);
            }
        }

        Commands::Request { audio_dir: dir, convention: conv_args, templates, target, output, run } => {
            let index = open(&project_path)?;
            let conv = convention(conv_args, &mut settings)?;
            let dir = audio_dir(dir, &mut settings)?;
            let selection = selection(&index, templates, &target, &mut settings, &config)?;
            let session = Session::new(index, selection)?;

            let request = session.plan_request(&dir, &conv)?;
            let json = eventforge::request::to_json(&request).context("Failed to serialize request")?;
            match &output {
                Some(path) => {
                    std::fs::write(path, &json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Wrote {} entries to {}", request.entries.len(), path.display());
                }
                None if !run => println!("{json}"),
                None => {}
            }

            if run {
                let tool = config.tool_invocation();
                let outcome = eventforge::bridge::run_import(&tool, &request)
                    .with_context(|| format!("{} failed", tool.program))?;
                match outcome.report {
                    Some(report) => {
                        println!("Imported {}, failed {}", report.imported, report.failed);
                        for message in &report.messages {
                            println!("  {}", message);
                        }
                    }
                    None => println!("{} finished but reported no result; check the project.", tool.program),
                }
            }
        }

        Commands::Create { kind, name, parent } => {
            let mut index = open(&project_path)?;
            let (collection, id) = match kind {
                CreateKind::Folder => {
                    let parent = parent.map(|p| resolve(&index, Collection::Folder, &p)).transpose()?;
                    (Collection::Folder, index.create_folder(&name, parent.as_ref())?)
                }
                CreateKind::Bank => {
                    let parent = parent.map(RecordId::from);
                    (Collection::Bank, index.create_bank(&name, parent.as_ref())?)
                }
                CreateKind::Bus => {
                    let parent = parent.map(|p| resolve(&index, Collection::Bus, &p)).transpose()?;
                    (Collection::Bus, index.create_bus(&name, parent.as_ref())?)
                }
                CreateKind::Asset => {
                    let parent = parent
                        .map(|p| resolve(&index, Collection::AssetFolder, &p))
                        .transpose()?;
                    (Collection::AssetFolder, index.create_asset_folder(&name, parent.as_ref())?)
                }
            };
            println!("Created {} {}", index.display_path(collection, &id), id);
        }

        Commands::Rename { collection, target, name } => {
            let mut index = open(&project_path)?;
            let collection = Collection::from(collection);
            let id = resolve(&index, collection, &target)?;
            index.rename(collection, &id, &name).context("Rename failed")?;
            println!("Renamed to {}", index.display_path(collection, &id));
        }

        Commands::Delete { collection, target } => {
            let mut index = open(&project_path)?;
            let collection = Collection::from(collection);
            let id = resolve(&index, collection, &target)?;
            let path = index.display_path(collection, &id);
            index.delete(collection, &id).context("Delete failed")?;
            println!("Deleted {} {}", path, id);
        }

        Commands::RegisterAudio { file, asset_path } => {
            let mut index = open(&project_path)?;
            let asset_path = match asset_path {
                Some(p) => p,
                None => file_name(&file)?,
            };
            let id = index
                .create_audio_file_record(&file, &asset_path)
                .with_context(|| format!("Failed to register {}", file.display()))?;
            println!("Registered {} as {}", asset_path, id);
        }
    }

    settings.project = project_path;
    if let Err(e) = settings.save(&settings_path) {
        log::warn!("Could not remember settings: {}", e);
    }

    Ok(())
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("{} has no file name", path.display()))
}

fn print_names<'a>(title: &str, names: impl Iterator<Item = &'a str>) {
    let names: Vec<&str> = names.collect();
    if names.is_empty() {
        return;
    }
    println!();
    println!("{} ({}):", title, names.len());
    for name in names {
        println!("  {}", name);
    }
}

fn print_paths(title: &str, paths: &[PathBuf]) {
    print_names(title, paths.iter().filter_map(|p| p.to_str()));
}
