//! End-to-end release runs against fake executors and scripted confirmations.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDate;
use keel_config::{ArtifactConfig, Config, MatcherKind, Occurrence};
use keel_core::{
    BumpKind, CancelFlag, CommandOutput, CommandSpec, Confirm, CoreError, ErrorKind, Executor,
    NOTES_FILE, ReleaseFailure, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome,
    ReleaseReport, ReleaseState, StepKind,
};
use tempfile::TempDir;

const POM: &str = "<project>
  <artifactId>widget</artifactId>
  <version>0.3.1</version>
  <dependencies>
    <dependency><artifactId>other</artifactId><version>0.3.1</version></dependency>
  </dependencies>
</project>
";

const README: &str = "# widget

```xml
<version>0.3.1</version>
```

Gradle users: `<version>0.3.1</version>` as well.
";

const CHANGELOG: &str = "# Changelog

## [Unreleased]

### Added
- Thread dump diffing across snapshots
### Fixed

## [0.3.1] - 2024-02-01

### Fixed
- Parser handles tabs

[Unreleased]: https://github.com/acme/widget/compare/v0.3.1...HEAD
[0.3.1]: https://github.com/acme/widget/compare/v0.3.0...v0.3.1
";

const FILES: [&str; 3] = ["pom.xml", "README.md", "CHANGELOG.md"];

/// Records every command; fails, hides or cancels on matching prefixes.
#[derive(Default)]
struct FakeExecutor {
    calls: RefCell<Vec<String>>,
    fail: Vec<&'static str>,
    missing: Vec<&'static str>,
    cancel_on: Option<(&'static str, CancelFlag)>,
}

impl FakeExecutor {
    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn ran(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, command: &CommandSpec, _cwd: &Path) -> io::Result<CommandOutput> {
        let line = command.to_string();
        self.calls.borrow_mut().push(line.clone());

        if self.missing.contains(&command.program.as_str()) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "program not found"));
        }
        if let Some((prefix, flag)) = &self.cancel_on {
            if line.starts_with(prefix) {
                flag.cancel();
            }
        }
        if self.fail.iter().any(|p| line.starts_with(p)) {
            return Ok(CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(CommandOutput::default())
    }
}

/// Answers prompts from a queue, then yes.
#[derive(Default)]
struct ScriptedConfirm {
    answers: RefCell<VecDeque<bool>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedConfirm {
    fn answering(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers.borrow_mut().pop_front().unwrap_or(true)
    }
}

fn artifact(path: &str, occurrence: Occurrence) -> ArtifactConfig {
    ArtifactConfig {
        path: path.to_string(),
        search: "<version>{version}</version>".to_string(),
        replace: None,
        matcher: MatcherKind::Literal,
        occurrence,
        optional: false,
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.version.source = "pom.xml".to_string();
    config.version.pattern = Some(r"<version>([^<]+)</version>".to_string());
    config.artifacts = vec![
        artifact("pom.xml", Occurrence::First),
        artifact("README.md", Occurrence::All),
    ];
    config.commands.test = vec!["mvn".to_string(), "test".to_string()];
    config.commands.build = vec!["mvn".to_string(), "package".to_string()];
    config.commands.deploy = vec!["mvn".to_string(), "deploy".to_string()];
    config
}

fn project(changelog: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("pom.xml"), POM).unwrap();
    fs::write(dir.path().join("README.md"), README).unwrap();
    fs::write(dir.path().join("CHANGELOG.md"), changelog).unwrap();
    dir
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn snapshot(dir: &Path) -> Vec<Vec<u8>> {
    FILES.iter().map(|f| fs::read(dir.join(f)).unwrap()).collect()
}

fn run(
    dir: &Path,
    config: &Config,
    options: ReleaseOptions,
    executor: &FakeExecutor,
    confirm: &ScriptedConfirm,
    cancel: CancelFlag,
) -> Result<ReleaseOutcome, ReleaseFailure> {
    let orchestrator =
        ReleaseOrchestrator::new(dir, config, options, executor, confirm).with_cancel(cancel);
    let plan = orchestrator.prepare().unwrap();
    orchestrator.execute(&plan)
}

fn release(dir: &Path, executor: &FakeExecutor, confirm: &ScriptedConfirm) -> ReleaseReport {
    let outcome = run(
        dir,
        &config(),
        ReleaseOptions::new(BumpKind::Minor, date()),
        executor,
        confirm,
        CancelFlag::new(),
    )
    .unwrap();
    match outcome {
        ReleaseOutcome::Released(report) => report,
        ReleaseOutcome::Aborted => panic!("release was aborted"),
    }
}

fn fail(dir: &Path, executor: &FakeExecutor, cancel: CancelFlag) -> ReleaseFailure {
    run(
        dir,
        &config(),
        ReleaseOptions::new(BumpKind::Minor, date()),
        executor,
        &ScriptedConfirm::default(),
        cancel,
    )
    .unwrap_err()
}

#[test]
fn minor_release_rewrites_artifacts_and_promotes_changelog() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor::default();
    let confirm = ScriptedConfirm::default();

    let report = release(dir.path(), &executor, &confirm);
    assert_eq!(report.previous.to_string(), "0.3.1");
    assert_eq!(report.version.to_string(), "0.4.0");
    assert_eq!(report.tag, "v0.4.0");
    assert!(report.skipped.is_empty());

    let pom = fs::read_to_string(dir.path().join("pom.xml")).unwrap();
    assert!(pom.contains("  <version>0.4.0</version>\n"));
    assert!(pom.contains("<artifactId>other</artifactId><version>0.3.1</version>"));

    let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
    assert_eq!(readme.matches("<version>0.4.0</version>").count(), 2);
    assert!(!readme.contains("0.3.1"));

    let changelog = fs::read_to_string(dir.path().join("CHANGELOG.md")).unwrap();
    assert!(changelog.contains(
        "## [Unreleased]\n\n### Added\n### Changed\n### Deprecated\n### Removed\n### Fixed\n### Security\n\n## [0.4.0] - 2024-03-15\n"
    ));
    assert_eq!(changelog.matches("## [Unreleased]").count(), 1);
    assert!(changelog.contains("[0.4.0]: https://github.com/acme/widget/compare/v0.3.1...v0.4.0"));

    assert!(!dir.path().join(".release-backup").exists());
    assert!(!dir.path().join(NOTES_FILE).exists());

    let calls = executor.calls();
    assert_eq!(
        &calls[..10],
        [
            "mvn test",
            "mvn package",
            "mvn deploy",
            "git add pom.xml README.md CHANGELOG.md",
            "git commit -m 'Bump version to 0.4.0'",
            "git tag -a v0.4.0 -m 'Release 0.4.0'",
            "git push",
            "git push --tags",
            "gh --version",
            "gh auth status",
        ]
    );
    assert!(calls[10].starts_with("gh release create v0.4.0 --title 'Release 0.4.0' --notes-file "));
    assert_eq!(calls.len(), 11);

    assert_eq!(report.live.len(), 4);
    assert_eq!(confirm.prompts.borrow().len(), 2);
}

#[test]
fn failing_tests_restore_every_file() {
    let dir = project(CHANGELOG);
    let before = snapshot(dir.path());
    let executor = FakeExecutor {
        fail: vec!["mvn test"],
        ..FakeExecutor::default()
    };

    let failure = fail(dir.path(), &executor, CancelFlag::new());
    assert_eq!(failure.error.kind(), ErrorKind::Step);
    assert_eq!(failure.state, ReleaseState::FilesMutated);
    assert!(failure.rolled_back);
    assert!(failure.restore.as_ref().unwrap().is_complete());
    assert!(!failure.is_irreversible());
    assert!(failure.local_effects.is_empty());
    assert!(failure.backup_dir.is_none());

    assert_eq!(snapshot(dir.path()), before);
    assert!(!dir.path().join(".release-backup").exists());
    assert_eq!(executor.calls(), ["mvn test"]);
    assert!(!executor.ran("git"));

    let CoreError::Step(step) = &failure.error else {
        panic!("expected a step failure, got {:?}", failure.error);
    };
    assert_eq!(step.step, StepKind::Test);
    assert_eq!(step.output.as_ref().unwrap().stderr, "simulated failure");
}

#[test]
fn missing_release_host_is_a_warning() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor {
        missing: vec!["gh"],
        ..FakeExecutor::default()
    };

    let report = release(dir.path(), &executor, &ScriptedConfirm::default());
    assert!(executor.ran("git commit"));
    assert!(executor.ran("git tag -a v0.4.0"));
    assert!(executor.ran("git push --tags"));
    assert!(!executor.ran("gh release"));

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, StepKind::Publish);
    assert!(report.warnings.iter().any(|w| w.starts_with("publish skipped")));
    assert!(!dir.path().join(NOTES_FILE).exists());
}

#[test]
fn unauthenticated_release_host_is_skipped() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor {
        fail: vec!["gh auth"],
        ..FakeExecutor::default()
    };

    let report = release(dir.path(), &executor, &ScriptedConfirm::default());
    assert!(!executor.ran("gh release"));
    assert_eq!(report.skipped[0].0, StepKind::Publish);
    assert!(report.skipped[0].1.contains("auth login"));
}

#[test]
fn failed_publish_is_a_warning_and_removes_notes() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor {
        fail: vec!["gh release"],
        ..FakeExecutor::default()
    };

    let report = release(dir.path(), &executor, &ScriptedConfirm::default());
    assert!(executor.ran("gh release create"));
    assert_eq!(report.skipped[0].0, StepKind::Publish);
    assert!(!dir.path().join(NOTES_FILE).exists());
    assert!(!dir.path().join(".release-backup").exists());
}

#[test]
fn empty_pending_section_aborts_before_backup() {
    let changelog = "# Changelog\n\n## [Unreleased]\n\n### Added\n### Changed\n\n## [0.3.1] - 2024-02-01\n- old\n";
    let dir = project(changelog);
    let before = snapshot(dir.path());
    let executor = FakeExecutor::default();
    let confirm = ScriptedConfirm::default();

    let failure = run(
        dir.path(),
        &config(),
        ReleaseOptions::new(BumpKind::Minor, date()),
        &executor,
        &confirm,
        CancelFlag::new(),
    )
    .unwrap_err();

    assert_eq!(failure.error.kind(), ErrorKind::Validation);
    assert!(matches!(
        failure.error,
        CoreError::PendingTooShort { found: 0, required: 20 }
    ));
    assert_eq!(failure.state, ReleaseState::VersionComputed);
    assert!(!failure.rolled_back);
    assert!(!dir.path().join(".release-backup").exists());
    assert_eq!(snapshot(dir.path()), before);
    assert!(executor.calls().is_empty());
    assert!(confirm.prompts.borrow().is_empty());
}

#[test]
fn push_failure_after_deploy_is_irreversible() {
    let dir = project(CHANGELOG);
    let before = snapshot(dir.path());
    let executor = FakeExecutor {
        fail: vec!["git push"],
        ..FakeExecutor::default()
    };

    let failure = fail(dir.path(), &executor, CancelFlag::new());
    assert!(failure.is_irreversible());
    assert_eq!(failure.live, ["package 0.4.0 deployed"]);
    assert_eq!(
        failure.local_effects,
        ["commit \"Bump version to 0.4.0\"", "tag v0.4.0"]
    );
    assert_eq!(failure.state, ReleaseState::Tagged);
    assert!(failure.rolled_back);
    assert_eq!(snapshot(dir.path()), before);
    assert!(!executor.ran("git push --tags"));
    assert!(!executor.ran("gh"));
}

#[test]
fn declining_to_continue_touches_nothing() {
    let dir = project(CHANGELOG);
    let before = snapshot(dir.path());
    let executor = FakeExecutor::default();

    let outcome = run(
        dir.path(),
        &config(),
        ReleaseOptions::new(BumpKind::Minor, date()),
        &executor,
        &ScriptedConfirm::answering(&[false]),
        CancelFlag::new(),
    )
    .unwrap();

    assert!(matches!(outcome, ReleaseOutcome::Aborted));
    assert_eq!(snapshot(dir.path()), before);
    assert!(executor.calls().is_empty());
    assert!(!dir.path().join(".release-backup").exists());
}

#[test]
fn declining_deploy_skips_only_deploy() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor::default();

    let report = release(dir.path(), &executor, &ScriptedConfirm::answering(&[true, false]));
    assert!(!executor.ran("mvn deploy"));
    assert!(executor.ran("git push --tags"));
    assert_eq!(report.skipped, [(StepKind::Deploy, "declined by operator".to_string())]);
    assert!(!report.completed.contains(&StepKind::Deploy));
}

#[test]
fn unmatched_artifact_rolls_back() {
    let dir = project(CHANGELOG);
    fs::write(dir.path().join("README.md"), "# widget\n\nNo version here.\n").unwrap();
    let before = snapshot(dir.path());
    let executor = FakeExecutor::default();

    let failure = fail(dir.path(), &executor, CancelFlag::new());
    assert_eq!(failure.error.kind(), ErrorKind::Mutation);
    assert_eq!(
        failure.error.to_string(),
        "artifacts not updated: README.md (pattern not matched)"
    );
    assert_eq!(failure.state, ReleaseState::BackedUp);
    assert!(failure.rolled_back);
    assert_eq!(snapshot(dir.path()), before);
    assert!(executor.calls().is_empty());
}

#[test]
fn optional_artifact_failure_is_a_warning() {
    let dir = project(CHANGELOG);
    fs::remove_file(dir.path().join("README.md")).unwrap();
    let mut config = config();
    config.artifacts[1].optional = true;
    let executor = FakeExecutor::default();

    let outcome = run(
        dir.path(),
        &config,
        ReleaseOptions::new(BumpKind::Minor, date()),
        &executor,
        &ScriptedConfirm::default(),
        CancelFlag::new(),
    )
    .unwrap();

    let ReleaseOutcome::Released(report) = outcome else {
        panic!("release was aborted");
    };
    assert_eq!(report.artifacts.applied_count(), 1);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("README.md (file not found)"))
    );
    assert!(executor.ran("git add pom.xml CHANGELOG.md"));
}

#[test]
fn interrupt_before_boundary_restores() {
    let dir = project(CHANGELOG);
    let before = snapshot(dir.path());
    let cancel = CancelFlag::new();
    let executor = FakeExecutor {
        cancel_on: Some(("mvn package", cancel.clone())),
        ..FakeExecutor::default()
    };

    let failure = fail(dir.path(), &executor, cancel);
    assert!(matches!(failure.error, CoreError::Interrupted));
    assert_eq!(failure.state, ReleaseState::Built);
    assert!(failure.rolled_back);
    assert!(!failure.is_irreversible());
    assert_eq!(snapshot(dir.path()), before);
    assert!(!executor.ran("mvn deploy"));
    assert!(!dir.path().join(".release-backup").exists());
}

#[test]
fn interrupt_after_boundary_stops_and_keeps_backup() {
    let dir = project(CHANGELOG);
    let cancel = CancelFlag::new();
    let executor = FakeExecutor {
        cancel_on: Some(("mvn deploy", cancel.clone())),
        ..FakeExecutor::default()
    };

    let failure = fail(dir.path(), &executor, cancel);
    assert!(matches!(failure.error, CoreError::Interrupted));
    assert_eq!(failure.state, ReleaseState::Deployed);
    assert!(!failure.rolled_back);
    assert!(failure.is_irreversible());

    let backup_dir = failure.backup_dir.unwrap();
    assert!(backup_dir.exists());
    assert!(!executor.ran("git"));

    let pom = fs::read_to_string(dir.path().join("pom.xml")).unwrap();
    assert!(pom.contains("<version>0.4.0</version>"));
}

#[test]
fn leftover_backup_directory_blocks_release() {
    let dir = project(CHANGELOG);
    let stale = dir.path().join(".release-backup");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("00-pom.xml"), "from a crashed run").unwrap();
    let before = snapshot(dir.path());
    let executor = FakeExecutor::default();

    let failure = fail(dir.path(), &executor, CancelFlag::new());
    assert!(matches!(failure.error, CoreError::StaleBackup(_)));
    assert_eq!(snapshot(dir.path()), before);
    assert_eq!(
        fs::read_to_string(stale.join("00-pom.xml")).unwrap(),
        "from a crashed run"
    );
    assert!(executor.calls().is_empty());
}

#[test]
fn skipped_tests_and_disabled_remote_steps() {
    let dir = project(CHANGELOG);
    let executor = FakeExecutor::default();
    let options = ReleaseOptions {
        run_tests: false,
        deploy: false,
        push: false,
        publish: false,
        ..ReleaseOptions::new(BumpKind::Major, date())
    };

    let outcome = run(
        dir.path(),
        &config(),
        options,
        &executor,
        &ScriptedConfirm::default(),
        CancelFlag::new(),
    )
    .unwrap();

    let ReleaseOutcome::Released(report) = outcome else {
        panic!("release was aborted");
    };
    assert_eq!(report.version.to_string(), "1.0.0");
    assert!(report.live.is_empty());
    assert_eq!(
        executor.calls(),
        [
            "mvn package",
            "git add pom.xml README.md CHANGELOG.md",
            "git commit -m 'Bump version to 1.0.0'",
            "git tag -a v1.0.0 -m 'Release 1.0.0'",
        ]
    );
}

#[test]
fn changelog_artifact_keeps_substitution_and_promotion() {
    let changelog = CHANGELOG.replace(
        "# Changelog\n",
        "# Changelog\n\nInstall with `npm i widget@0.3.1`.\n",
    );
    let dir = project(&changelog);
    let mut config = config();
    config.artifacts.push(ArtifactConfig {
        search: "widget@{version}".to_string(),
        ..artifact("CHANGELOG.md", Occurrence::All)
    });
    let executor = FakeExecutor::default();

    let outcome = run(
        dir.path(),
        &config,
        ReleaseOptions::new(BumpKind::Minor, date()),
        &executor,
        &ScriptedConfirm::default(),
        CancelFlag::new(),
    )
    .unwrap();
    assert!(matches!(outcome, ReleaseOutcome::Released(_)));

    let written = fs::read_to_string(dir.path().join("CHANGELOG.md")).unwrap();
    assert!(written.contains("Install with `npm i widget@0.4.0`."));
    assert!(written.contains("## [0.4.0] - 2024-03-15\n"));
    assert!(written.contains("[0.4.0]: https://github.com/acme/widget/compare/v0.3.1...v0.4.0"));
    assert_eq!(written.matches("## [Unreleased]").count(), 1);
    assert!(executor.ran("git add pom.xml README.md CHANGELOG.md"));
}
