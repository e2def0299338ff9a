//! Debian tooling: changelog metadata, the package build command and `.deb` inspection

use std::collections::BTreeMap;
use std::path::Path;

use gitdeb_core::error::{Error, Result};
use gitdeb_core::PackageMetadata;
use tracing::debug;

use crate::runner::{ToolCommand, ToolRunner};

/// Flag that restricts `dpkg-buildpackage` to the source package
pub const SOURCE_ONLY_FLAG: &str = "-S";

const PARSE_CHANGELOG: &str = "dpkg-parsechangelog";
const DPKG_DEB: &str = "dpkg-deb";

/// Read source name and version from a changelog with `dpkg-parsechangelog`
pub fn read_package_metadata(runner: &dyn ToolRunner, changelog: &Path) -> Result<PackageMetadata> {
    if !changelog.is_file() {
        return Err(Error::config(format!("changelog not found: {changelog:?}")));
    }

    let source = changelog_field(runner, changelog, "Source")?;
    let version = changelog_field(runner, changelog, "Version")?;
    debug!("Changelog {} names {} {}", changelog.display(), source, version);

    PackageMetadata::new(source, version)
}

fn changelog_field(runner: &dyn ToolRunner, changelog: &Path, field: &str) -> Result<String> {
    let mut command = ToolCommand::new(PARSE_CHANGELOG)
        .arg("-l")
        .arg(changelog.to_string_lossy())
        .args(["-S", field]);
    if let Some(dir) = changelog.parent() {
        command = command.current_dir(dir);
    }

    let output = runner.output(&command)?;
    if !output.success() {
        return Err(Error::ExternalToolFailure {
            tool: PARSE_CHANGELOG.to_string(),
            exit_code: output.exit_code,
        });
    }
    Ok(output.stdout_text().trim().to_string())
}

/// Build the packaging command run inside the staging directory
pub fn packaging_command(
    tool: &str,
    extra_args: &[String],
    build_binaries: bool,
    package_src_dir: &Path,
) -> ToolCommand {
    let mut command = ToolCommand::new(tool).args(extra_args.iter().cloned());
    if !build_binaries {
        command = command.arg(SOURCE_ONLY_FLAG);
    }
    command.current_dir(package_src_dir)
}

/// Read the control fields of a binary package with `dpkg-deb -f`
pub fn describe_deb(runner: &dyn ToolRunner, deb: &Path) -> Result<BTreeMap<String, String>> {
    let command = ToolCommand::new(DPKG_DEB)
        .arg("-f")
        .arg(deb.to_string_lossy())
        .args(["Package", "Version", "Architecture"]);

    let output = runner.output(&command)?;
    if !output.success() {
        return Err(Error::ExternalToolFailure {
            tool: DPKG_DEB.to_string(),
            exit_code: output.exit_code,
        });
    }
    Ok(parse_control_fields(&output.stdout_text()))
}

fn parse_control_fields(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}
