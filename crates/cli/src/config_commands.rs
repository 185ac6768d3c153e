use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
};

use tunepress_config::{Severity, TunepressConfig, default_config_template, validate};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors/warnings.
    Check,
    /// Write a commented starter config file.
    Init {
        /// Target file. Defaults to `tunepress.toml` in the user config dir.
        #[arg(long)]
        path: Option<PathBuf>,
        /// Port written into the template.
        #[arg(long, default_value_t = 5000)]
        port: u16,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config(
    action: ConfigAction,
    config: &TunepressConfig,
    source: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Check => check(config, source),
        ConfigAction::Init { path, port, force } => {
            let path = match path {
                Some(path) => path,
                None => tunepress_config::config_dir()
                    .context("no user config directory on this platform")?
                    .join("tunepress.toml"),
            };
            init(&path, port, force)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &TunepressConfig, source: Option<&Path>) -> Result<()> {
    match source {
        Some(path) => eprintln!("Checking {}\n", path.display()),
        None => eprintln!("No config file found; checking defaults.\n"),
    }

    let diagnostics = validate(config);
    for d in &diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;
    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init(path: &Path, port: u16, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, default_config_template(port))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/tunepress.toml");

        init(&path, 6100, false).unwrap();
        let loaded = tunepress_config::load_config(&path).unwrap();
        assert_eq!(loaded.server.port, 6100);

        assert!(init(&path, 6200, false).is_err());
        init(&path, 6200, true).unwrap();
        assert_eq!(tunepress_config::load_config(&path).unwrap().server.port, 6200);
    }
}
