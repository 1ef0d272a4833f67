//! Configuration management

use crate::ledger;
use crate::scanner::ExcludeMatcher;
use crate::types::BackupError;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the optional config file inside the state directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Incremental photo and video backup
#[derive(Parser, Debug)]
#[command(name = "shoebox")]
#[command(version, about = "Incremental photo and video backup, organized by month")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Backup arguments when no subcommand is given
    #[command(flatten)]
    pub backup: BackupArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Copy new media from the source into the destination (default)
    Backup(BackupArgs),

    /// Show recent runs recorded in a destination
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct BackupArgs {
    /// Directory to back up (e.g. a mounted phone)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Backup destination root
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Glob of source paths to skip (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// TOML config file (default: <dest>/.shoebox/config.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Print the run record as JSON instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// Backup destination root
    #[arg(short, long, default_value = ".")]
    pub dest: PathBuf,

    /// Number of runs to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Print runs as JSON
    #[arg(long)]
    pub json: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the binary was asked to do.
#[derive(Debug, Clone)]
pub enum Invocation {
    Backup(Config),
    History(HistoryArgs),
}

impl Invocation {
    pub fn verbose(&self) -> bool {
        match self {
            Invocation::Backup(config) => config.verbose,
            Invocation::History(args) => args.verbose,
        }
    }
}

impl TryFrom<Cli> for Invocation {
    type Error = BackupError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        match cli.command {
            Some(Command::History(mut args)) => {
                args.verbose |= cli.backup.verbose;
                Ok(Invocation::History(args))
            }
            Some(Command::Backup(mut args)) => {
                args.verbose |= cli.backup.verbose;
                Ok(Invocation::Backup(Config::try_from(args)?))
            }
            None => Ok(Invocation::Backup(Config::try_from(cli.backup)?)),
        }
    }
}

/// Values read from a TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub exclude: Vec<String>,
    pub progress: Option<bool>,
    pub verbose: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, BackupError> {
        let text = fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&text)
            .map_err(|e| BackupError::Config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// `<dest>/.shoebox/config.toml`, when it exists.
    pub fn discover(dest: &Path) -> Result<Option<Self>, BackupError> {
        let path = ledger::state_dir(dest).join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Validated settings for one backup run
#[derive(Debug, Clone)]
pub struct Config {
    /// Source directory
    pub source: PathBuf,

    /// Destination root
    pub destination: PathBuf,

    /// Exclude patterns (globs), file values first
    pub exclude: Vec<String>,

    /// Draw progress bars
    pub progress: bool,

    /// Emit the run record as JSON
    pub json: bool,

    /// Debug logging
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            exclude: Vec::new(),
            progress: true,
            json: false,
            verbose: false,
        }
    }
}

impl TryFrom<BackupArgs> for Config {
    type Error = BackupError;

    fn try_from(args: BackupArgs) -> Result<Self, Self::Error> {
        let source = args
            .source
            .ok_or_else(|| BackupError::Config("Missing --source <DIR>".to_string()))?;
        let destination = args
            .dest
            .ok_or_else(|| BackupError::Config("Missing --dest <DIR>".to_string()))?;

        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::discover(&destination)?.unwrap_or_default(),
        };

        let mut exclude = file.exclude;
        exclude.extend(args.exclude);

        let config = Config {
            source,
            destination,
            exclude,
            progress: !args.no_progress && file.progress.unwrap_or(true),
            json: args.json,
            verbose: args.verbose || file.verbose.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), BackupError> {
        check_dir(&self.source, "Source")?;
        check_dir(&self.destination, "Destination")?;

        let same = match (fs::canonicalize(&self.source), fs::canonicalize(&self.destination)) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.source == self.destination,
        };
        if same {
            return Err(BackupError::Config(
                "Source and destination cannot be the same".to_string(),
            ));
        }

        self.exclude_matcher().map(|_| ())
    }

    /// Compile the exclude globs.
    pub fn exclude_matcher(&self) -> Result<ExcludeMatcher, BackupError> {
        ExcludeMatcher::new(&self.exclude)
    }
}

fn check_dir(path: &Path, role: &str) -> Result<(), BackupError> {
    if !path.exists() {
        return Err(BackupError::Config(format!(
            "{} directory does not exist: {}",
            role,
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(BackupError::Config(format!(
            "{} is not a directory: {}",
            role,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(source: &Path, dest: &Path) -> BackupArgs {
        BackupArgs {
            source: Some(source.to_path_buf()),
            dest: Some(dest.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_parses_top_level_backup() {
        let cli = Cli::try_parse_from(["shoebox", "-s", "/mnt/phone", "-d", "/backup", "--exclude", "*.AAE"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.backup.source, Some(PathBuf::from("/mnt/phone")));
        assert_eq!(cli.backup.exclude, vec!["*.AAE".to_string()]);
    }

    #[test]
    fn test_cli_parses_history() {
        let cli = Cli::try_parse_from(["shoebox", "history", "-d", "/backup", "--limit", "3"]).unwrap();
        match cli.command {
            Some(Command::History(h)) => {
                assert_eq!(h.dest, PathBuf::from("/backup"));
                assert_eq!(h.limit, 3);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_missing_source_flag() {
        let err = Config::try_from(BackupArgs::default()).unwrap_err();
        assert!(err.to_string().contains("--source"));
    }

    #[test]
    fn test_nonexistent_source_rejected() {
        let dest = TempDir::new().unwrap();
        let err = Config::try_from(args(Path::new("/nonexistent/phone"), dest.path())).unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("Source directory does not exist"));
    }

    #[test]
    fn test_source_file_rejected() {
        let dest = TempDir::new().unwrap();
        let file = dest.path().join("photo.jpg");
        fs::write(&file, b"x").unwrap();
        let other = TempDir::new().unwrap();

        let err = Config::try_from(args(&file, other.path())).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_same_source_and_destination_rejected() {
        let dir = TempDir::new().unwrap();
        let dotted = dir.path().join(".");
        let err = Config::try_from(args(dir.path(), &dotted)).unwrap_err();
        assert!(err.to_string().contains("cannot be the same"));
    }

    #[test]
    fn test_discovered_file_config_merges_with_flags() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let state = ledger::state_dir(dest.path());
        fs::create_dir_all(&state).unwrap();
        fs::write(
            state.join(CONFIG_FILE),
            "exclude = [\"*.AAE\"]\nprogress = false\nverbose = true\n",
        )
        .unwrap();

        let mut cli_args = args(source.path(), dest.path());
        cli_args.exclude = vec!["Screenshots".to_string()];
        let config = Config::try_from(cli_args).unwrap();

        assert_eq!(config.exclude, vec!["*.AAE".to_string(), "Screenshots".to_string()]);
        assert!(!config.progress);
        assert!(config.verbose);
    }

    #[test]
    fn test_no_progress_flag_wins() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut cli_args = args(source.path(), dest.path());
        cli_args.no_progress = true;

        let config = Config::try_from(cli_args).unwrap();
        assert!(!config.progress);
    }

    #[test]
    fn test_unknown_config_key_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shoebox.toml");
        fs::write(&path, "threads = 8\n").unwrap();

        let err = FileConfig::load(&path).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }

    #[test]
    fn test_invalid_exclude_glob_rejected() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        let mut cli_args = args(source.path(), dest.path());
        cli_args.exclude = vec!["[oops".to_string()];

        let err = Config::try_from(cli_args).unwrap_err();
        assert!(err.to_string().contains("Invalid exclude pattern"));
    }
}
