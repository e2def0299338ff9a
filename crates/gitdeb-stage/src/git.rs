//! Repository export through `git archive`

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use gitdeb_core::error::{Error, Result};
use gitdeb_core::SubmoduleRecord;
use tar::{Archive, EntryType};
use tracing::debug;

use crate::runner::{ToolCommand, ToolRunner};

const GIT: &str = "git";

/// Shell snippet `git submodule foreach` runs in each initialized submodule
const SUBMODULE_RECORD_FORMAT: &str = r#"printf '%s\t%s\t%s\n' "$name" "$displaypath" "$sha1""#;

/// Export the tree of `treeish` in `repository` into `dest_dir`
pub fn archive_tree(
    runner: &dyn ToolRunner,
    repository: &Path,
    treeish: &str,
    dest_dir: &Path,
) -> Result<()> {
    let command = ToolCommand::new(GIT)
        .args(["archive", "--format=tar", treeish])
        .current_dir(repository);

    let output = runner.output(&command)?;
    if !output.success() {
        return Err(Error::ExportError {
            repository: repository.to_path_buf(),
            reason: format!("git archive {treeish} failed: {}", output.stderr.trim()),
            exit_code: Some(output.exit_code),
        });
    }

    std::fs::create_dir_all(dest_dir)?;
    let unpacked = unpack(&output.stdout, dest_dir).map_err(|e| {
        Error::export(repository, format!("failed to unpack archive into {dest_dir:?}: {e}"))
    })?;

    debug!("Exported {} entries from {} ({})", unpacked, repository.display(), treeish);
    Ok(())
}

fn unpack(tar_data: &[u8], dest_dir: &Path) -> std::io::Result<usize> {
    let mut archive = Archive::new(Cursor::new(tar_data));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        // git archive writes the commit id into a pax global header
        if entry.header().entry_type() == EntryType::XGlobalHeader {
            continue;
        }
        entry.unpack_in(dest_dir)?;
        count += 1;
    }
    Ok(count)
}

/// List every initialized submodule of `repository`, recursively, parents first
pub fn list_submodules(runner: &dyn ToolRunner, repository: &Path) -> Result<Vec<SubmoduleRecord>> {
    let command = ToolCommand::new(GIT)
        .args(["submodule", "foreach", "--quiet", "--recursive", SUBMODULE_RECORD_FORMAT])
        .current_dir(repository);

    let output = runner.output(&command)?;
    if !output.success() {
        return Err(Error::ExportError {
            repository: repository.to_path_buf(),
            reason: format!("listing submodules failed: {}", output.stderr.trim()),
            exit_code: Some(output.exit_code),
        });
    }

    output
        .stdout_text()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            parse_submodule_line(line).ok_or_else(|| {
                Error::export(repository, format!("unexpected submodule record: {line:?}"))
            })
        })
        .collect()
}

fn parse_submodule_line(line: &str) -> Option<SubmoduleRecord> {
    let mut fields = line.splitn(3, '\t');
    let name = fields.next()?.trim();
    let path = PathBuf::from(fields.next()?.trim());
    let commit_id = fields.next()?.trim();

    if name.is_empty() || commit_id.is_empty() || !is_nested_path(&path) {
        return None;
    }
    Some(SubmoduleRecord::new(name, path, commit_id))
}

fn is_nested_path(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}
