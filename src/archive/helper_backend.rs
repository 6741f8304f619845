use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::Builder;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::archive_backend::{validate_operations, ArchiveBackend, BackendKind};
use super::path_tree::EntryTree;
use crate::error::{ArchiveError, Result};
use crate::infrastructure::config::HelperConfig;
use crate::models::{ArchiveEntry, Operation, OperationsDocument};
use crate::utils::{parent_dir, remove_temp_file_best_effort};

/// `{ "files": { "<entry path>": ..., ... } }` written by the helper.
#[derive(Debug, Default, Deserialize)]
struct HelperOutput {
    #[serde(default)]
    files: serde_json::Map<String, serde_json::Value>,
}

impl HelperOutput {
    fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

/**
 * 外部归档助手后端
 *
 * Delegates listing and mutation to an external helper process:
 *
 * ```text
 * <executable> <prefix..> update -archive_file <a> -input_json_file <in> -output_json_file <out>
 * <executable> <prefix..> list -archive_file <a> -output_json_file <out>
 * ```
 *
 * The JSON work files live next to the archive unless a temp directory is
 * configured, and are removed whatever the outcome.
 */
#[derive(Debug, Clone)]
pub struct HelperBackend {
    config: HelperConfig,
    temp_dir: Option<PathBuf>,
}

impl HelperBackend {
    pub fn new(config: HelperConfig, temp_dir: Option<PathBuf>) -> Self {
        Self { config, temp_dir }
    }

    fn work_dir(&self, archive: &Path) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(|| parent_dir(archive))
    }

    /// Reserve a uniquely named work file; the caller owns its removal.
    async fn reserve_work_file(&self, archive: &Path, prefix: &str) -> Result<PathBuf> {
        let dir = self.work_dir(archive);
        tokio::fs::create_dir_all(&dir).await?;
        let (_, path) = Builder::new()
            .prefix(prefix)
            .suffix(".json")
            .tempfile_in(&dir)
            .and_then(|file| file.keep().map_err(|e| e.error))?;
        Ok(path)
    }

    async fn run_helper(&self, verb: &str, args: Vec<OsString>) -> Result<()> {
        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.command_prefix)
            .arg(verb)
            .args(&args)
            .env("JAVA_HOME", &self.config.java_home)
            .stdin(Stdio::null());

        debug!(
            executable = %self.config.executable.display(),
            args = ?args,
            java_home = %self.config.java_home.display(),
            verb,
            "Invoking archive helper"
        );

        let output = command.output().await.map_err(|e| {
            ArchiveError::external_process(
                format!(
                    "failed to start {}: {}",
                    self.config.executable.display(),
                    e
                ),
                None,
            )
        })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(verb, "helper: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            warn!(verb, "helper: {}", line);
        }

        match output.status.code() {
            Some(code) if self.config.success_exit_codes.contains(&code) => Ok(()),
            Some(code) => Err(ArchiveError::external_process(
                format!("{} exited with code {}", verb, code),
                Some(code),
            )),
            None => Err(ArchiveError::external_process(
                format!("{} was terminated by a signal", verb),
                None,
            )),
        }
    }

    async fn read_output(&self, output_file: &Path) -> Result<HelperOutput> {
        let raw = match tokio::fs::read_to_string(output_file).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HelperOutput::default()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(HelperOutput::default());
        }
        serde_json::from_str(&raw).map_err(|e| {
            ArchiveError::external_process(
                format!(
                    "failed to parse helper output {}: {}",
                    output_file.display(),
                    e
                ),
                None,
            )
        })
    }

    async fn list_output(&self, archive: &Path) -> Result<HelperOutput> {
        match tokio::fs::metadata(archive).await {
            Ok(metadata) if metadata.is_dir() => {
                return Err(ArchiveError::archive_read(
                    archive,
                    "path is a directory, not an archive file",
                ))
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HelperOutput::default()),
            Err(e) => return Err(ArchiveError::archive_read(archive, e.to_string())),
        }

        let output_file = self.reserve_work_file(archive, "output_json_file-").await?;
        let _cleanup = scopeguard::guard(output_file.clone(), |path| {
            remove_temp_file_best_effort(&path);
        });

        let args = vec![
            OsString::from("-archive_file"),
            archive.as_os_str().to_os_string(),
            OsString::from("-output_json_file"),
            output_file.as_os_str().to_os_string(),
        ];
        self.run_helper("list", args).await?;
        self.read_output(&output_file).await
    }
}

#[async_trait]
impl ArchiveBackend for HelperBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Helper
    }

    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>> {
        let output = self.list_output(archive).await?;
        Ok(output.entry_names().map(ArchiveEntry::from_name).collect())
    }

    async fn apply_operations(&self, archive: &Path, operations: &[Operation]) -> Result<()> {
        self.apply_and_describe(archive, operations).await.map(|_| ())
    }

    async fn entry_tree(&self, archive: &Path) -> Result<EntryTree> {
        let output = self.list_output(archive).await?;
        Ok(EntryTree::build(output.entry_names()))
    }

    /// `update` already reports the resulting listing; no second `list` run.
    async fn apply_and_describe(
        &self,
        archive: &Path,
        operations: &[Operation],
    ) -> Result<EntryTree> {
        validate_operations(archive, operations).await?;

        let input_file = self.reserve_work_file(archive, "input_json_file-").await?;
        let output_file = self.reserve_work_file(archive, "output_json_file-").await;
        let _cleanup = scopeguard::guard(
            (input_file.clone(), output_file.as_ref().ok().cloned()),
            |(input, output)| {
                remove_temp_file_best_effort(&input);
                if let Some(output) = output {
                    remove_temp_file_best_effort(&output);
                }
            },
        );
        let output_file = output_file?;

        let document = OperationsDocument::new(operations.to_vec());
        let json = serde_json::to_string_pretty(&document)?;
        tokio::fs::write(&input_file, json).await.map_err(|e| {
            ArchiveError::external_process(
                format!(
                    "failed to write helper input file {}: {}",
                    input_file.display(),
                    e
                ),
                None,
            )
        })?;

        let args = vec![
            OsString::from("-archive_file"),
            archive.as_os_str().to_os_string(),
            OsString::from("-input_json_file"),
            input_file.as_os_str().to_os_string(),
            OsString::from("-output_json_file"),
            output_file.as_os_str().to_os_string(),
        ];
        self.run_helper("update", args).await?;

        let output = self.read_output(&output_file).await?;
        info!(
            archive = %archive.display(),
            operations = operations.len(),
            entries = output.files.len(),
            "Archive updated by helper"
        );
        Ok(EntryTree::build(output.entry_names()))
    }
}
