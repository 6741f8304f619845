//! Helper backend tests against a scripted stand-in for the external tool.
#![cfg(unix)]

mod common;

use common::*;
use model_archive::archive::HelperBackend;
use model_archive::{ArchiveBackend, ArchiveError, HelperConfig, Operation, OperationsDocument};
use serde_json::json;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const LISTING: &str =
    r#"{"files":{"wlsdeploy/applications/todo.war":{},"wlsdeploy/stores/mystore/":{}}}"#;

struct FakeHelper {
    root: TempDir,
}

impl FakeHelper {
    /// Records its arguments and `JAVA_HOME`, copies the input document and
    /// answers with `listing`, then exits with `exit_code`.
    fn new(listing: &str, exit_code: i32) -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("log")).unwrap();
        fs::create_dir_all(root.path().join("work")).unwrap();

        let script = format!(
            r#"#!/bin/sh
log_dir='{log}'
printf '%s\n' "$@" > "$log_dir/args.txt"
printf '%s' "$JAVA_HOME" > "$log_dir/java_home.txt"
input=''
output=''
while [ $# -gt 0 ]; do
  case "$1" in
    -input_json_file) input="$2"; shift ;;
    -output_json_file) output="$2"; shift ;;
  esac
  shift
done
if [ -n "$input" ]; then cp "$input" "$log_dir/input.json"; fi
if [ -n "$output" ]; then printf '%s' '{listing}' > "$output"; fi
echo 'helper finished'
exit {exit_code}
"#,
            log = root.path().join("log").display(),
            listing = listing,
            exit_code = exit_code,
        );
        let executable = root.path().join("helper.sh");
        fs::write(&executable, script).unwrap();
        fs::set_permissions(&executable, fs::Permissions::from_mode(0o755)).unwrap();

        Self { root }
    }

    fn executable(&self) -> PathBuf {
        self.root.path().join("helper.sh")
    }

    fn work_dir(&self) -> PathBuf {
        self.root.path().join("work")
    }

    fn backend(&self) -> HelperBackend {
        HelperBackend::new(
            HelperConfig::new(self.executable(), "/opt/java/jdk-17"),
            Some(self.work_dir()),
        )
    }

    fn args(&self) -> Option<Vec<String>> {
        fs::read_to_string(self.root.path().join("log").join("args.txt"))
            .ok()
            .map(|raw| raw.lines().map(str::to_string).collect())
    }

    fn log_file(&self, name: &str) -> String {
        fs::read_to_string(self.root.path().join("log").join(name)).unwrap()
    }

    fn work_files(&self) -> usize {
        fs::read_dir(self.work_dir()).unwrap().count()
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> &'a str {
    let index = args.iter().position(|arg| arg == flag).unwrap();
    &args[index + 1]
}

fn archive_in(dir: &Path) -> PathBuf {
    create_test_zip(dir, "app.zip", &[("wlsdeploy/applications/todo.war", "war")])
}

#[tokio::test]
async fn test_update_passes_operations_and_environment() {
    let helper = FakeHelper::new(LISTING, 0);
    let project = TempDir::new().unwrap();
    let archive = archive_in(project.path());
    let source = write_source_file(project.path(), "todo.war", b"war");
    let operations = vec![
        Operation::remove("wlsdeploy/applications/todo.war"),
        Operation::add("wlsdeploy/applications/todo.war", &source),
        Operation::add_directory("wlsdeploy/stores/mystore/"),
    ];

    let tree = helper
        .backend()
        .apply_and_describe(&archive, &operations)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&tree).unwrap(),
        json!({
            "wlsdeploy": {
                "applications": { "todo.war": "" },
                "stores": { "mystore": {} }
            }
        })
    );

    let args = helper.args().unwrap();
    assert_eq!(&args[..2], &["wktui".to_string(), "update".to_string()]);
    assert_eq!(value_after(&args, "-archive_file"), archive.to_str().unwrap());
    assert!(value_after(&args, "-input_json_file").ends_with(".json"));
    assert!(value_after(&args, "-output_json_file").ends_with(".json"));
    assert_eq!(helper.log_file("java_home.txt"), "/opt/java/jdk-17");

    let document: OperationsDocument =
        serde_json::from_str(&helper.log_file("input.json")).unwrap();
    assert_eq!(document.operations, operations);

    assert_eq!(helper.work_files(), 0);
}

#[tokio::test]
async fn test_exit_code_one_counts_as_success() {
    let helper = FakeHelper::new(LISTING, 1);
    let project = TempDir::new().unwrap();
    let archive = archive_in(project.path());

    let tree = helper
        .backend()
        .apply_and_describe(&archive, &[Operation::add_directory("wlsdeploy/stores/mystore/")])
        .await
        .unwrap();

    assert!(!tree.is_empty());
    assert_eq!(helper.work_files(), 0);
}

#[tokio::test]
async fn test_failing_exit_code_is_reported_and_cleaned_up() {
    let helper = FakeHelper::new(LISTING, 2);
    let project = TempDir::new().unwrap();
    let archive = archive_in(project.path());

    let error = helper
        .backend()
        .apply_operations(&archive, &[Operation::remove("wlsdeploy/applications/")])
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ArchiveError::ExternalProcess {
            exit_code: Some(2),
            ..
        }
    ));
    assert_eq!(helper.work_files(), 0);
}

#[tokio::test]
async fn test_list_existing_archive() {
    let helper = FakeHelper::new(LISTING, 0);
    let project = TempDir::new().unwrap();
    let archive = archive_in(project.path());
    let backend = helper.backend();

    let mut names: Vec<String> = backend
        .list_entries(&archive)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["wlsdeploy/applications/todo.war", "wlsdeploy/stores/mystore/"]
    );

    let args = helper.args().unwrap();
    assert_eq!(&args[..2], &["wktui".to_string(), "list".to_string()]);
    assert!(!args.iter().any(|arg| arg == "-input_json_file"));
    assert_eq!(helper.work_files(), 0);
}

#[tokio::test]
async fn test_list_missing_archive_does_not_spawn() {
    let helper = FakeHelper::new(LISTING, 0);
    let project = TempDir::new().unwrap();

    let tree = helper
        .backend()
        .entry_tree(&project.path().join("absent.zip"))
        .await
        .unwrap();

    assert!(tree.is_empty());
    assert!(helper.args().is_none());
}

#[tokio::test]
async fn test_source_errors_raised_before_spawning() {
    let helper = FakeHelper::new(LISTING, 0);
    let project = TempDir::new().unwrap();
    let archive = archive_in(project.path());

    let error = helper
        .backend()
        .apply_operations(
            &archive,
            &[Operation::add("lib/x.jar", project.path().join("missing.jar"))],
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ArchiveError::SourcePath { .. }));
    assert!(helper.args().is_none());
    assert_eq!(helper.work_files(), 0);
}

#[tokio::test]
async fn test_missing_executable_is_external_process_error() {
    let project = TempDir::new().unwrap();
    let work = project.path().join("work");
    let archive = archive_in(project.path());
    let backend = HelperBackend::new(
        HelperConfig::new(project.path().join("no-such-helper"), "/opt/java"),
        Some(work.clone()),
    );

    let error = backend
        .apply_operations(&archive, &[Operation::remove("wlsdeploy/")])
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ArchiveError::ExternalProcess {
            exit_code: None,
            ..
        }
    ));
    assert_eq!(fs::read_dir(&work).unwrap().count(), 0);
}
