//! Pipeline tests against a recording mock of the external tools

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gitdeb_core::{
    Error, ExclusionRule, ExclusionSet, PackageMetadata, Result, RewriteRule, StagingRequest,
};
use gitdeb_stage::{
    Confirm, FixedAnswer, PackageStager, StagingPlan, ToolCommand, ToolOutput, ToolRunner,
    REPORT_FILE_NAME, SOURCE_ONLY_FLAG,
};
use tempfile::TempDir;

type StatusHook = Arc<dyn Fn(&ToolCommand) -> i32 + Send + Sync>;

/// Mock runner that serves `git` and `dpkg-*` from canned data
#[derive(Clone, Default)]
struct MockRunner {
    /// Every command run, in order
    calls: Arc<Mutex<Vec<ToolCommand>>>,
    /// Files served by `git archive`, keyed by repository directory
    trees: HashMap<PathBuf, Vec<(String, String)>>,
    /// Lines printed by `git submodule foreach`
    submodule_lines: Vec<String>,
    /// Exit code of `git archive`
    archive_exit: i32,
    /// Behaviour of the packaging tool
    on_status: Option<StatusHook>,
}

impl MockRunner {
    fn new() -> Self {
        Self::default()
    }

    fn with_tree(mut self, repository: &Path, files: &[(&str, &str)]) -> Self {
        self.trees.insert(
            repository.to_path_buf(),
            files.iter().map(|(p, c)| (p.to_string(), c.to_string())).collect(),
        );
        self
    }

    fn with_submodule(mut self, name: &str, path: &str, sha: &str) -> Self {
        self.submodule_lines.push(format!("{name}\t{path}\t{sha}"));
        self
    }

    fn with_status(mut self, hook: impl Fn(&ToolCommand) -> i32 + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(hook));
        self
    }

    fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    fn archive_calls(&self) -> Vec<ToolCommand> {
        self.calls().into_iter().filter(|c| c.has_args(&["archive"])).collect()
    }

    fn tar_of(files: &[(String, String)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }
}

impl ToolRunner for MockRunner {
    fn output(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.calls.lock().unwrap().push(command.clone());

        if command.program == "git" && command.has_args(&["archive"]) {
            if self.archive_exit != 0 {
                return Ok(ToolOutput {
                    exit_code: self.archive_exit,
                    stderr: "fatal: not a valid object name".to_string(),
                    ..Default::default()
                });
            }
            let dir = command.current_dir.clone().unwrap_or_default();
            let files = self.trees.get(&dir).cloned().unwrap_or_default();
            return Ok(ToolOutput { stdout: Self::tar_of(&files), ..Default::default() });
        }

        if command.program == "git" && command.has_args(&["submodule", "foreach"]) {
            let mut stdout = self.submodule_lines.join("\n");
            stdout.push('\n');
            return Ok(ToolOutput { stdout: stdout.into_bytes(), ..Default::default() });
        }

        if command.program == "dpkg-parsechangelog" {
            let field = command.args.last().cloned().unwrap_or_default();
            let value = if field == "Source" { "engine\n" } else { "1:3.16.0-1\n" };
            return Ok(ToolOutput { stdout: value.as_bytes().to_vec(), ..Default::default() });
        }

        Ok(ToolOutput::default())
    }

    fn status(&self, command: &ToolCommand) -> Result<i32> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(self.on_status.as_ref().map(|hook| hook(command)).unwrap_or(0))
    }
}

/// Confirm implementation that counts how often it was asked
#[derive(Clone, Default)]
struct CountingConfirm {
    asked: Arc<AtomicUsize>,
    answer: bool,
}

impl Confirm for CountingConfirm {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

fn stager_with(runner: MockRunner) -> PackageStager {
    PackageStager::new(Arc::new(runner)).with_confirm(Box::new(FixedAnswer(false)))
}

fn list_dir(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(path)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_declined_prompt_leaves_directory_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let build_root = temp_dir.path().join("build-deb");
    fs::create_dir_all(build_root.join("old-pkg")).unwrap();
    fs::write(build_root.join("old-pkg/file"), "keep me").unwrap();

    let confirm = CountingConfirm { answer: false, ..Default::default() };
    let asked = confirm.asked.clone();
    let stager = PackageStager::new(Arc::new(MockRunner::new())).with_confirm(Box::new(confirm));

    let err = stager.prepare_clean_directory(&build_root, false).unwrap_err();

    assert!(matches!(err, Error::AbortedByUser { ref path } if path == &build_root));
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(fs::read_to_string(build_root.join("old-pkg/file")).unwrap(), "keep me");
}

#[test]
fn test_always_yes_clears_without_prompting() {
    let temp_dir = TempDir::new().unwrap();
    let build_root = temp_dir.path().join("build-deb");
    fs::create_dir_all(build_root.join("nested/deeper")).unwrap();
    fs::write(build_root.join("stale.dsc"), "old").unwrap();

    let confirm = CountingConfirm { answer: false, ..Default::default() };
    let asked = confirm.asked.clone();
    let stager = PackageStager::new(Arc::new(MockRunner::new())).with_confirm(Box::new(confirm));

    stager.prepare_clean_directory(&build_root, true).unwrap();

    assert_eq!(asked.load(Ordering::SeqCst), 0);
    assert!(build_root.is_dir());
    assert!(list_dir(&build_root).is_empty());
}

#[test]
fn test_confirmed_prompt_clears_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("junk"), "x").unwrap();

    let stager =
        PackageStager::new(Arc::new(MockRunner::new())).with_confirm(Box::new(FixedAnswer(true)));
    stager.prepare_clean_directory(temp_dir.path(), false).unwrap();

    assert!(list_dir(temp_dir.path()).is_empty());
}

#[test]
fn test_export_runs_one_archive_per_repository() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("src");
    let dest = temp_dir.path().join("stage");

    let runner = MockRunner::new()
        .with_tree(&source, &[("setup.py", "setup()"), ("debian/control", "Source: engine")])
        .with_tree(&source.join("lib/hazardlib"), &[("hazard.py", "pass")])
        .with_tree(&source.join("lib/hazardlib/vendor/gsim"), &[("gsim.py", "pass")])
        .with_tree(&source.join("docs/theme"), &[("theme.css", "body{}")])
        .with_submodule("hazardlib", "lib/hazardlib", "1111111111111111")
        .with_submodule("gsim", "lib/hazardlib/vendor/gsim", "2222222222222222")
        .with_submodule("theme", "docs/theme", "3333333333333333");

    let stager = stager_with(runner.clone());
    let submodules = stager.export_repository(&source, &dest).unwrap();

    assert_eq!(submodules.len(), 3);
    let archives = runner.archive_calls();
    assert_eq!(archives.len(), submodules.len() + 1);

    assert_eq!(archives[0].current_dir.as_deref(), Some(source.as_path()));
    assert_eq!(archives[0].args.last().map(String::as_str), Some("HEAD"));
    for (call, submodule) in archives[1..].iter().zip(&submodules) {
        assert_eq!(call.current_dir, Some(source.join(&submodule.path)));
        assert_eq!(call.args.last(), Some(&submodule.commit_id));
    }

    assert!(dest.join("setup.py").exists());
    assert!(dest.join("debian/control").exists());
    assert!(dest.join("lib/hazardlib/hazard.py").exists());
    assert!(dest.join("lib/hazardlib/vendor/gsim/gsim.py").exists());
    assert!(dest.join("docs/theme/theme.css").exists());
}

#[test]
fn test_export_without_submodules() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("src");
    let runner = MockRunner::new().with_tree(&source, &[("README", "hi")]);

    let submodules = stager_with(runner.clone())
        .export_repository(&source, &temp_dir.path().join("stage"))
        .unwrap();

    assert!(submodules.is_empty());
    assert_eq!(runner.archive_calls().len(), 1);
}

#[test]
fn test_export_failure_carries_git_exit_code() {
    let temp_dir = TempDir::new().unwrap();
    let runner = MockRunner { archive_exit: 128, ..MockRunner::new() };

    let err = stager_with(runner)
        .export_repository(temp_dir.path(), &temp_dir.path().join("stage"))
        .unwrap_err();

    assert!(matches!(err, Error::ExportError { exit_code: Some(128), .. }));
    assert_eq!(err.exit_code(), 128);
}

#[test]
fn test_rewrite_moves_license() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("LICENSE"), "AGPL").unwrap();

    stager_with(MockRunner::new())
        .apply_rewrites(temp_dir.path(), &[RewriteRule::new("LICENSE", "pkg/LICENSE")])
        .unwrap();

    assert!(!temp_dir.path().join("LICENSE").exists());
    assert_eq!(fs::read_to_string(temp_dir.path().join("pkg/LICENSE")).unwrap(), "AGPL");
}

#[test]
fn test_rewrite_missing_source_names_path() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("README"), "x").unwrap();

    let rules = vec![RewriteRule::new("README", "doc/README"), RewriteRule::new("LICENSE", "pkg/LICENSE")];
    let err = stager_with(MockRunner::new()).apply_rewrites(temp_dir.path(), &rules).unwrap_err();

    match err {
        Error::RewriteError { path, .. } => assert_eq!(path, PathBuf::from("LICENSE")),
        other => panic!("unexpected error: {other}"),
    }
    // rules before the failing one stay applied
    assert!(temp_dir.path().join("doc/README").exists());
}

#[cfg(unix)]
#[test]
fn test_rewrite_through_symlinked_directory_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let stage = temp_dir.path().join("stage");
    let outside = temp_dir.path().join("outside");
    fs::create_dir_all(&stage).unwrap();
    fs::create_dir_all(outside.join("docs")).unwrap();
    fs::write(outside.join("docs/NOTES"), "secret").unwrap();
    fs::write(stage.join("LICENSE"), "AGPL").unwrap();
    std::os::unix::fs::symlink("../outside", stage.join("pkg")).unwrap();

    let stager = stager_with(MockRunner::new());

    let err = stager
        .apply_rewrites(&stage, &[RewriteRule::new("LICENSE", "pkg/LICENSE")])
        .unwrap_err();
    assert!(matches!(err, Error::RewriteError { ref path, .. } if path == Path::new("pkg/LICENSE")));
    assert!(!outside.join("LICENSE").exists());
    assert!(stage.join("LICENSE").exists());

    let err = stager
        .apply_rewrites(&stage, &[RewriteRule::new("pkg/docs/NOTES", "NOTES")])
        .unwrap_err();
    assert!(matches!(err, Error::RewriteError { .. }));
    assert!(outside.join("docs/NOTES").exists());
    assert!(!stage.join("NOTES").exists());

    // moving the link itself stays inside the staging directory
    stager.apply_rewrites(&stage, &[RewriteRule::new("pkg", "vendor/pkg")]).unwrap();
    assert!(fs::symlink_metadata(stage.join("vendor/pkg")).unwrap().file_type().is_symlink());
}

#[test]
fn test_exclusion_without_matches_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir(temp_dir.path().join("openquake")).unwrap();
    fs::write(temp_dir.path().join("setup.py"), "setup()").unwrap();
    let before = list_dir(temp_dir.path());

    let set = ExclusionSet::new(&[ExclusionRule::Glob("*.pyc".into())], ["debian"]).unwrap();
    let removed = stager_with(MockRunner::new()).apply_exclusions(temp_dir.path(), &set).unwrap();

    assert!(removed.is_empty());
    assert_eq!(list_dir(temp_dir.path()), before);
}

#[test]
fn test_exclusions_spare_protected_entries() {
    let temp_dir = TempDir::new().unwrap();
    for dir in ["debian", "docs", "openquake", "utils"] {
        fs::create_dir(temp_dir.path().join(dir)).unwrap();
    }
    fs::write(temp_dir.path().join(".travis.yml"), "").unwrap();

    let set = ExclusionSet::new(
        &[ExclusionRule::Regex("^(?!openquake$).*".into())],
        ["debian"],
    );
    // look-around is not supported by the regex crate
    assert!(set.is_err());

    let set = ExclusionSet::new(
        &[
            ExclusionRule::Name("docs".into()),
            ExclusionRule::Name("debian".into()),
            ExclusionRule::Glob(".*".into()),
            ExclusionRule::Regex("util.".into()),
        ],
        ["debian"],
    )
    .unwrap();
    let removed = stager_with(MockRunner::new()).apply_exclusions(temp_dir.path(), &set).unwrap();

    assert_eq!(removed, vec![".travis.yml", "docs", "utils"]);
    assert_eq!(list_dir(temp_dir.path()), vec!["debian", "openquake"]);
}

#[test]
fn test_source_only_flag_follows_binaries_switch() {
    let temp_dir = TempDir::new().unwrap();
    let runner = MockRunner::new();
    let stager = stager_with(runner.clone());

    stager.invoke_packaging_tool(temp_dir.path(), false).unwrap();
    stager.invoke_packaging_tool(temp_dir.path(), true).unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].program, "dpkg-buildpackage");
    assert!(calls[0].args.iter().any(|a| a == SOURCE_ONLY_FLAG));
    assert!(!calls[1].args.iter().any(|a| a == SOURCE_ONLY_FLAG));
    assert_eq!(calls[1].current_dir.as_deref(), Some(temp_dir.path()));
}

#[test]
fn test_packaging_exit_code_is_propagated() {
    let temp_dir = TempDir::new().unwrap();
    let runner = MockRunner::new().with_status(|_| 2);

    let err = stager_with(runner)
        .with_packaging_tool("debuild", vec![])
        .invoke_packaging_tool(temp_dir.path(), true)
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ExternalToolFailure { ref tool, exit_code: 2 } if tool == "debuild"
    ));
    assert_eq!(err.exit_code(), 2);
}

fn engine_fixture(temp_dir: &TempDir) -> (PathBuf, PathBuf, MockRunner) {
    let source = temp_dir.path().join("oq-engine");
    let build_root = temp_dir.path().join("build-deb");
    fs::create_dir_all(source.join("debian")).unwrap();
    fs::write(source.join("debian/changelog"), "engine (1:3.16.0-1) unstable; urgency=low\n").unwrap();

    let runner = MockRunner::new()
        .with_tree(
            &source,
            &[
                ("packaging/debian/control", "Source: engine"),
                ("openquake/__init__.py", ""),
                ("README.md", "readme"),
                ("CONTRIBUTING.md", "contributing"),
            ],
        )
        .with_tree(&source.join("oq-libs"), &[("libs.py", "")])
        .with_submodule("oq-libs", "oq-libs", "abcdef0123456789");

    (source, build_root, runner)
}

fn engine_plan() -> StagingPlan {
    StagingPlan {
        rewrites: vec![RewriteRule::new("packaging/debian", "debian")],
        exclusions: ExclusionSet::new(
            &[ExclusionRule::Glob("*.md".into()), ExclusionRule::Name("packaging".into())],
            ["debian"],
        )
        .unwrap(),
    }
}

#[test]
fn test_full_run_writes_report() {
    let temp_dir = TempDir::new().unwrap();
    let (source, build_root, runner) = engine_fixture(&temp_dir);

    let runner = runner.with_status(|command| {
        let stage = command.current_dir.clone().unwrap();
        assert!(stage.join("debian/control").exists(), "packaging ran before rewrites");
        assert!(!stage.join("README.md").exists(), "packaging ran before exclusions");
        let build_root = stage.parent().unwrap();
        fs::write(build_root.join("engine_3.16.0-1.dsc"), "dsc").unwrap();
        fs::write(build_root.join("engine_3.16.0.orig.tar.gz"), "tgz").unwrap();
        0
    });
    let stager = stager_with(runner.clone());

    let package = stager.read_package_metadata(&source.join("debian/changelog")).unwrap();
    assert_eq!(package, PackageMetadata::new("engine", "1:3.16.0-1").unwrap());

    let request = StagingRequest::new(&source, &build_root, &package.dir_name()).with_always_yes(true);
    let report = stager.run(&request, &package, &engine_plan()).unwrap();

    assert_eq!(request.package_src_dir(), build_root.join("engine-3.16.0"));
    assert_eq!(report.submodules.len(), 1);
    assert_eq!(report.removed_entries, vec!["CONTRIBUTING.md", "README.md", "packaging"]);
    assert_eq!(report.artifacts.len(), 2);
    assert!(build_root.join(REPORT_FILE_NAME).exists());
    assert!(build_root.join("engine-3.16.0/oq-libs/libs.py").exists());

    let programs: Vec<String> = runner
        .calls()
        .iter()
        .map(|c| format!("{} {}", c.program, c.args.first().cloned().unwrap_or_default()))
        .collect();
    assert_eq!(
        programs,
        vec![
            "dpkg-parsechangelog -l",
            "dpkg-parsechangelog -l",
            "git archive",
            "git submodule",
            "git archive",
            "dpkg-buildpackage -us",
        ]
    );
}

#[test]
fn test_failed_run_leaves_partial_state_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let (source, build_root, runner) = engine_fixture(&temp_dir);
    let stager = stager_with(runner.with_status(|_| 3));

    let package = PackageMetadata::new("engine", "3.16.0-1").unwrap();
    let request = StagingRequest::new(&source, &build_root, &package.dir_name()).with_always_yes(true);
    let err = stager.run(&request, &package, &engine_plan()).unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(build_root.join("engine-3.16.0/debian/control").exists());
    assert!(!build_root.join(REPORT_FILE_NAME).exists());
}

#[test]
fn test_failed_run_cleans_up_when_asked() {
    let temp_dir = TempDir::new().unwrap();
    let (source, build_root, runner) = engine_fixture(&temp_dir);
    let stager = stager_with(runner).with_cleanup_on_failure(true);

    let package = PackageMetadata::new("engine", "3.16.0-1").unwrap();
    let request = StagingRequest::new(&source, &build_root, &package.dir_name()).with_always_yes(true);
    let plan = StagingPlan {
        rewrites: vec![RewriteRule::new("no/such/dir", "debian")],
        ..engine_plan()
    };

    let err = stager.run(&request, &package, &plan).unwrap_err();
    assert!(matches!(err, Error::RewriteError { .. }));
    assert!(!build_root.exists());
}

#[test]
fn test_aborted_run_keeps_existing_build_root() {
    let temp_dir = TempDir::new().unwrap();
    let (source, build_root, runner) = engine_fixture(&temp_dir);
    fs::create_dir_all(&build_root).unwrap();
    fs::write(build_root.join("previous.deb"), "old").unwrap();

    let stager = stager_with(runner.clone()).with_cleanup_on_failure(true);
    let package = PackageMetadata::new("engine", "3.16.0-1").unwrap();
    let request = StagingRequest::new(&source, &build_root, &package.dir_name());

    let err = stager.run(&request, &package, &engine_plan()).unwrap_err();
    assert!(err.is_aborted());
    assert!(build_root.join("previous.deb").exists());
    assert!(runner.calls().is_empty());
}
