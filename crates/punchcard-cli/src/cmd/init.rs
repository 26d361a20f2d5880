use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use punchcard_core::config::{PROJECT_DIR, default_project_config_toml};
use punchcard_core::db::{DB_FILE_NAME, DEFAULT_BUSY_TIMEOUT, open_store};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing `config.toml` with the defaults.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "punchcard.db\npunchcard.db-*\n";

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub project_dir: String,
    pub config_written: bool,
    pub database: String,
}

/// Execute `punch init`. Creates the project skeleton:
///
/// ```text
/// .punchcard/
///   config.toml    (default classifier and store settings)
///   punchcard.db   (shift store, schema migrated)
///   .gitignore     (punchcard.db*)
/// ```
///
/// Running it again leaves an existing config alone unless `--force` is set.
///
/// # Errors
///
/// Returns an error if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, project_root: &Path, output: OutputMode) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join("config.toml");
    let config_written = args.force || !config_path.exists();
    if config_written {
        std::fs::write(&config_path, default_project_config_toml()?)
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
    }

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = dir.join(DB_FILE_NAME);
    open_store(&db_path, DEFAULT_BUSY_TIMEOUT)?;
    tracing::info!(path = %db_path.display(), "shift store ready");

    let result = InitOutput {
        project_dir: dir.display().to_string(),
        config_written,
        database: db_path.display().to_string(),
    };

    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "initialized {}", r.project_dir),
        |r, w| {
            pretty_section(w, "Initialized punchcard project")?;
            pretty_kv(w, "Directory", &r.project_dir)?;
            pretty_kv(
                w,
                "Config",
                if r.config_written { "written" } else { "kept existing" },
            )?;
            pretty_kv(w, "Database", &r.database)?;
            writeln!(w)?;
            writeln!(w, "Next: punch in <employee>")
        },
    )
}
