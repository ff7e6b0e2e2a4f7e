/// This module holds structs and helpers for parameters and configuration
use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;
use structopt::clap::AppSettings;
use tracing::debug;

// Courtesy of structopt_flags crate
#[derive(structopt::StructOpt, Debug, Clone)]
pub struct QuietVerbose {
    /// Increase the output's verbosity level
    ///
    /// Pass many times to increase verbosity level, up to 3.
    #[structopt(
        name = "quietverbose",
        long = "verbose",
        short = "v",
        parse(from_occurrences),
        conflicts_with = "quietquiet",
        global = true
    )]
    verbosity_level: u8,

    /// Decrease the output's verbosity level.
    ///
    /// Used once, it will set error log level.
    /// Used twice, will silent the log completely
    #[structopt(
        name = "quietquiet",
        long = "quiet",
        short = "q",
        parse(from_occurrences),
        conflicts_with = "quietverbose",
        global = true
    )]
    quiet_level: u8,
}

impl Default for QuietVerbose {
    fn default() -> Self {
        QuietVerbose {
            verbosity_level: 1,
            quiet_level: 0,
        }
    }
}

impl Serialize for QuietVerbose {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.get_level_filter())
    }
}

fn de_from_str<'de, D>(deserializer: D) -> Result<QuietVerbose, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let (verbosity_level, quiet_level) = match s.to_ascii_lowercase().as_ref() {
        "off" => (0, 2),
        "error" => (0, 1),
        "warn" => (0, 0),
        "info" => (1, 0),
        "debug" => (2, 0),
        _ => (3, 0),
    };
    Ok(QuietVerbose {
        verbosity_level,
        quiet_level,
    })
}

impl QuietVerbose {
    /// Level filter string usable by `tracing_subscriber::EnvFilter`.
    pub fn get_level_filter(&self) -> &str {
        let quiet: i8 = if self.quiet_level > 1 {
            2
        } else {
            self.quiet_level as i8
        };
        let verbose: i8 = if self.verbosity_level > 2 {
            3
        } else {
            self.verbosity_level as i8
        };
        match verbose - quiet {
            -2 => "Off",
            -1 => "Error",
            0 => "Warn",
            1 => "Info",
            2 => "Debug",
            _ => "Trace",
        }
    }
}

#[derive(structopt::StructOpt, Serialize, Deserialize, Debug)]
/// Privileged shell and file-manager bridge for the dirstat UI
///
/// Reads method calls (JSON, one per line) on stdin and answers each one on
/// stdout: `runCommand` executes a command through the privileged launcher,
/// `openInFileManager` hands a path to the platform file manager.
#[structopt(global_settings(&[AppSettings::ColoredHelp, AppSettings::ColorAuto]))]
pub struct Args {
    /// privileged launcher command line
    ///
    /// The command string of each `runCommand` call is appended as one
    /// argument, so `su -c` yields `su -c <command>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[structopt(short, long, env)]
    pub launcher: Option<String>,

    /// deadline for one privileged command, in seconds
    ///
    /// 0 disables the deadline: a hung command then blocks its caller
    /// indefinitely, as the legacy bridge did.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[structopt(short, long, env)]
    pub timeout: Option<u64>,

    /// file-manager opener command line
    ///
    /// The path of each `openInFileManager` call is appended as one
    /// argument.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[structopt(short, long, env)]
    pub opener: Option<String>,

    #[structopt(flatten)]
    #[serde(deserialize_with = "de_from_str")]
    pub verbose: QuietVerbose,
}

impl Default for Args {
    fn default() -> Args {
        let res = Args {
            launcher: Some("su -c".into()),
            timeout: Some(0),
            #[cfg(target_os = "linux")]
            opener: Some("xdg-open".into()),
            #[cfg(target_os = "macos")]
            opener: Some("open".into()),
            #[cfg(target_os = "windows")]
            opener: Some("explorer".into()),
            verbose: QuietVerbose {
                verbosity_level: 1,
                quiet_level: 0,
            },
        };
        debug!("Args::default : {:#?}", res);
        res
    }
}

/// Privileged runner configuration.
#[derive(Debug)]
pub struct RunnerConfig {
    /// Launcher words, e.g. `["su", "-c"]`.
    pub launcher: Vec<String>,
    /// Deadline for one command; `None` blocks indefinitely.
    pub timeout: Option<Duration>,
}

/// File-manager launch configuration.
#[derive(Debug)]
pub struct FileManagerConfig {
    /// Opener words, e.g. `["xdg-open"]`.
    pub opener: Vec<String>,
}

/// Validated application configuration, derived from merged [`Args`].
#[derive(Debug)]
pub struct AppConfig {
    /// Privileged runner settings.
    pub runner: RunnerConfig,
    /// File-manager launch settings.
    pub file_manager: FileManagerConfig,
    /// Logging verbosity.
    pub verbose: QuietVerbose,
}

impl Args {
    /// Validate merged arguments into an [`AppConfig`].
    pub fn validate(self) -> Result<AppConfig> {
        let launcher_str = self.launcher.context("Launcher is not defined")?;
        let launcher = shell_words::split(&launcher_str)
            .with_context(|| format!("Parsing launcher command line '{launcher_str}'"))?;
        anyhow::ensure!(!launcher.is_empty(), "Launcher command line is empty");

        let opener_str = self.opener.context("Opener is not defined")?;
        let opener = shell_words::split(&opener_str)
            .with_context(|| format!("Parsing opener command line '{opener_str}'"))?;
        anyhow::ensure!(!opener.is_empty(), "Opener command line is empty");

        let timeout = match self.timeout.context("Timeout is not defined")? {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(AppConfig {
            runner: RunnerConfig { launcher, timeout },
            file_manager: FileManagerConfig { opener },
            verbose: self.verbose,
        })
    }
}

/// Merge configuration Default → config file → command line args.
///
/// `config_file` is usually [`default_config_file`]; a missing file is
/// simply skipped by figment.
pub fn merge_args(cli: Args, config_file: Option<PathBuf>) -> Result<Args> {
    let mut figment = Figment::from(Serialized::defaults(Args::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment
        .merge(Serialized::defaults(cli))
        .extract()
        .context("Merging configuration")
}

/// OS-specific path of the optional `config.toml`.
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("net", "dirstat", "dirstat-bridge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}


#[cfg(test)]
mod merge_args_should {
    use super::*;
    use mktemp::Temp;
    use std::fs;
    use structopt::StructOpt;

    #[test]
    fn layer_file_over_defaults_and_cli_over_file() -> Result<()> {
        let temp = Temp::new_file().unwrap().to_path_buf();
        fs::write(&temp, "launcher = \"doas sh -c\"\ntimeout = 20\n")?;

        // No CLI override: the file wins over defaults.
        let cli = Args::from_iter(["dirstat-bridge"]);
        let merged = merge_args(cli, Some(temp.clone()))?;
        assert_eq!(merged.launcher.as_deref(), Some("doas sh -c"));
        assert_eq!(merged.timeout, Some(20));

        // CLI override wins over the file.
        let cli = Args::from_iter(["dirstat-bridge", "--timeout", "5"]);
        let merged = merge_args(cli, Some(temp))?;
        assert_eq!(merged.launcher.as_deref(), Some("doas sh -c"));
        assert_eq!(merged.timeout, Some(5));
        Ok(())
    }

    #[test]
    fn keep_defaults_when_file_is_missing() -> Result<()> {
        let cli = Args::from_iter(["dirstat-bridge"]);
        let merged = merge_args(cli, Some(PathBuf::from("/nonexistent/config.toml")))?;
        assert_eq!(merged.launcher.as_deref(), Some("su -c"));
        assert_eq!(merged.timeout, Some(0));
        Ok(())
    }
}
