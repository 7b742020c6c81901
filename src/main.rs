use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use poselog::backup::{self, ImportMode};
use poselog::config::Config;
use poselog::db::{
    find_or_create_default_project, PhotoRepository, ProjectRepository, SchemaMigrator,
};
use poselog::logging;
use poselog::settings::{SessionFlags, SettingsStore};

enum Command {
    Init,
    Stats,
    Export { file: PathBuf },
    Import {
        file: PathBuf,
        project: Option<String>,
        skip_existing: bool,
    },
    Reset { yes: bool },
}

struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = None;
    let mut file = None;
    let mut project = None;
    let mut skip_existing = false;
    let mut yes = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("poselog {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--config requires a path argument");
                }
            }
            "--project" => {
                if i + 1 < args.len() {
                    project = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    bail!("--project requires a project id argument");
                }
            }
            "--skip-existing" => skip_existing = true,
            "--yes" => yes = true,
            "init" | "stats" | "export" | "import" | "reset" if command.is_none() => {
                command = Some(args[i].clone());
            }
            other if command.is_some() && file.is_none() && !other.starts_with('-') => {
                file = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let command = match command.as_deref() {
        Some("init") => Command::Init,
        Some("stats") => Command::Stats,
        Some("export") => Command::Export {
            file: file.context("export requires a file argument")?,
        },
        Some("import") => Command::Import {
            file: file.context("import requires a file argument")?,
            project,
            skip_existing,
        },
        Some("reset") => Command::Reset { yes },
        _ => {
            print_help();
            std::process::exit(1);
        }
    };

    Ok(Args {
        config_path,
        command,
    })
}

fn print_help() {
    println!(
        r#"poselog - photo journal storage engine

USAGE:
    poselog [OPTIONS] <COMMAND>

COMMANDS:
    init                       Create or migrate the database, then exit
    stats                      Show photo and project counts
    export FILE                Write a backup document to FILE
    import FILE                Read a backup document from FILE
        --project ID           Project for photos without one (default: the
                               "My Photos" project)
        --skip-existing        Skip records whose id already exists
    reset --yes                Delete and recreate the database (destroys data)

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    POSELOG_LOG         Log level (trace, debug, info, warn, error)"#
    );
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let config = match args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init(None)?;

    let settings = SettingsStore::new(&config.settings_path);
    let session = SessionFlags::new(&config.session_dir);
    let migrator = SchemaMigrator::new(&config.db_path, settings, session);

    if let Command::Reset { yes } = args.command {
        if !yes {
            bail!("reset destroys all data; pass --yes to confirm");
        }
        migrator.reset_database().context("database reset failed")?;
        println!("Database reset complete.");
        return Ok(());
    }

    migrator
        .ensure_up_to_date()
        .context("database migration failed; run `poselog reset --yes` to start over")?;

    let photos = PhotoRepository::new(&config.db_path);
    let projects = ProjectRepository::new(&config.db_path);

    match args.command {
        Command::Init => {
            println!("Database ready at {}", config.db_path.display());
        }
        Command::Stats => {
            let all_projects = projects.find_all()?;
            let all_photos = photos.find_all()?;
            println!("{} photos in {} projects", all_photos.len(), all_projects.len());
            for project in &all_projects {
                let count = photos.find_by_project_id(&project.id)?.len();
                println!("  {:30} {:>5} photos  ({})", project.name, count, project.id);
            }
        }
        Command::Export { file } => {
            let document = backup::export_document(&photos, &projects)?;
            std::fs::write(&file, backup::encode(&document)?)
                .with_context(|| format!("cannot write backup to {}", file.display()))?;
            println!(
                "Exported {} photos and {} projects to {}",
                document.photos.len(),
                document.projects.len(),
                file.display()
            );
        }
        Command::Import {
            file,
            project,
            skip_existing,
        } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read backup from {}", file.display()))?;
            let document = backup::decode(&json)?;
            if document.photos.len() > config.backup.max_photos {
                bail!(
                    "backup holds {} photos, more than the configured limit of {}",
                    document.photos.len(),
                    config.backup.max_photos
                );
            }

            let fallback = match project {
                Some(id) => id,
                None => find_or_create_default_project(&projects)?.id,
            };
            let mode = if skip_existing {
                ImportMode::SkipExisting
            } else {
                ImportMode::Strict
            };
            let report = backup::import_document(&document, &photos, &projects, &fallback, mode)?;
            println!(
                "Imported {} photos ({} skipped), {} projects ({} skipped)",
                report.photos_imported,
                report.photos_skipped,
                report.projects_imported,
                report.projects_skipped
            );
        }
        Command::Reset { .. } => unreachable!("handled before migration"),
    }

    Ok(())
}
