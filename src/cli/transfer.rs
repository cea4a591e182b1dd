//! tl import / export / sync command implementations.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::Globals;
use crate::error::{Error, Result};
use crate::import::{export_issues, export_lines, plan_import, read_issue_file, ImportCounts};
use crate::lock::write_atomic;
use crate::output::{emit_success, HumanOutput};

#[derive(Serialize)]
struct ImportOutput {
    from: PathBuf,
    #[serde(flatten)]
    counts: ImportCounts,
}

#[derive(Serialize)]
struct ExportOutput {
    to: PathBuf,
    exported: usize,
}

#[derive(Serialize)]
struct SyncOutput {
    to: PathBuf,
    exported: usize,
    staged: PathBuf,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub fn run_import(globals: &Globals, from: &Path) -> Result<()> {
    let from = absolute(from)?;
    let store = globals.store()?;
    let stamp = globals.stamp(&store);
    let incoming = read_issue_file(&from)?;

    let counts = store.mutate_with(|graph| {
        let plan = plan_import(graph, &stamp, &incoming)?;
        Ok((plan.events, plan.counts))
    })?;

    let mut human = HumanOutput::new(format!("tl import: {}", from.display()));
    human.push_summary("imported", counts.imported.to_string());
    human.push_summary("updated", counts.updated.to_string());
    human.push_summary("skipped", counts.skipped.to_string());
    human.push_summary("dependencies", counts.dependencies.to_string());
    emit_success(globals.output, "import", &ImportOutput { from, counts }, Some(&human))
}

fn export_to(globals: &Globals, to: &Path) -> Result<usize> {
    let store = globals.store()?;
    let graph = store.load()?;
    let exported = export_issues(&graph).len();
    write_atomic(to, export_lines(&graph)?.as_bytes())?;
    Ok(exported)
}

pub fn run_export(globals: &Globals, to: &Path) -> Result<()> {
    let to = absolute(to)?;
    let exported = export_to(globals, &to)?;

    let mut human = HumanOutput::new(format!("tl export: {}", to.display()));
    human.push_summary("exported", exported.to_string());
    emit_success(globals.output, "export", &ExportOutput { to, exported }, Some(&human))
}

pub fn run_sync(globals: &Globals, to: &Path) -> Result<()> {
    let to = absolute(to)?;
    let exported = export_to(globals, &to)?;
    let staged = stage(&to)?;
    tracing::debug!(path = %staged.display(), exported, "staged export");

    let mut human = HumanOutput::new(format!("tl sync: {}", to.display()));
    human.push_summary("exported", exported.to_string());
    human.push_summary("staged", staged.display().to_string());
    emit_success(
        globals.output,
        "sync",
        &SyncOutput {
            to,
            exported,
            staged,
        },
        Some(&human),
    )
}

/// Add `path` to the index of the git repository that contains it.
/// Returns the path relative to the work tree.
fn stage(path: &Path) -> Result<PathBuf> {
    let path = std::fs::canonicalize(path)?;
    let parent = path.parent().unwrap_or(&path);
    let repo = git2::Repository::discover(parent)?;
    let workdir = repo.workdir().ok_or_else(|| {
        Error::InvalidArgument(format!(
            "cannot stage {} in a bare repository",
            path.display()
        ))
    })?;
    let workdir = std::fs::canonicalize(workdir)?;
    let relative = path
        .strip_prefix(&workdir)
        .map_err(|_| {
            Error::InvalidArgument(format!(
                "{} is outside the work tree {}",
                path.display(),
                workdir.display()
            ))
        })?
        .to_path_buf();

    let mut index = repo.index()?;
    index.add_path(&relative)?;
    index.write()?;
    Ok(relative)
}
