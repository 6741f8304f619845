//! Shared zip reading and writing helpers
//!
//! Everything in here is blocking; backends run it inside
//! `tokio::task::spawn_blocking`.

use std::fs::File;
use std::io::{self, BufReader, Seek, Write};
use std::path::Path;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::source_walker::PlannedEntry;
use crate::error::{ArchiveError, Result};
use crate::models::ArchiveEntry;

/// Entries larger than this need zip64 headers.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Open an existing archive for reading.
///
/// `Ok(None)` when the file does not exist.
pub fn open_archive(archive: &Path) -> Result<Option<ZipArchive<BufReader<File>>>> {
    let metadata = match std::fs::metadata(archive) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ArchiveError::archive_read(archive, e.to_string())),
    };
    if metadata.is_dir() {
        return Err(ArchiveError::archive_read(
            archive,
            "path is a directory, not an archive file",
        ));
    }

    let file = File::open(archive).map_err(|e| ArchiveError::archive_read(archive, e.to_string()))?;
    let zip = ZipArchive::new(BufReader::new(file))
        .map_err(|e| ArchiveError::archive_read(archive, format!("not a valid zip file: {}", e)))?;
    Ok(Some(zip))
}

/// Read the raw entry names of an archive in central directory order.
pub fn read_entry_names(archive: &Path) -> Result<Vec<String>> {
    let Some(mut zip) = open_archive(archive)? else {
        return Ok(Vec::new());
    };

    let mut names = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| read_error(archive, index, e))?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

/// Async listing used by the in-process backends.
pub async fn list_archive_entries(archive: &Path) -> Result<Vec<ArchiveEntry>> {
    let path = archive.to_path_buf();
    let names = tokio::task::spawn_blocking(move || read_entry_names(&path))
        .await
        .map_err(|e| ArchiveError::archive_read(archive, format!("listing task failed: {}", e)))??;
    Ok(names.into_iter().map(ArchiveEntry::from_name).collect())
}

pub fn read_error(archive: &Path, index: usize, error: ZipError) -> ArchiveError {
    ArchiveError::archive_read(archive, format!("failed to read entry {}: {}", index, error))
}

/// Options for newly written entries.
pub fn entry_options(compression_level: Option<i64>) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(compression_level)
}

/// Write one planned entry, streaming file content from disk.
pub fn write_planned_entry<W: Write + Seek>(
    writer: &mut ZipWriter<W>,
    entry: &PlannedEntry,
    options: SimpleFileOptions,
) -> io::Result<()> {
    match entry {
        PlannedEntry::Directory { path } => {
            writer.add_directory(path.as_str(), options)?;
        }
        PlannedEntry::File { path, source } => {
            let mut input = File::open(source)?;
            let size = input.metadata()?.len();
            writer.start_file(path.as_str(), options.large_file(size >= ZIP64_THRESHOLD))?;
            io::copy(&mut input, writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_zip(path: &Path, names: &[&str]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for name in names {
            if name.ends_with('/') {
                writer.add_directory(*name, options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(name.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_read_entry_names_in_order() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("app.zip");
        write_zip(&archive, &["b.txt", "lib/", "a.txt"]);

        assert_eq!(read_entry_names(&archive).unwrap(), vec!["b.txt", "lib/", "a.txt"]);
    }

    #[test]
    fn test_missing_archive_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_entry_names(&dir.path().join("none.zip")).unwrap().is_empty());
    }

    #[test]
    fn test_directory_and_garbage_are_read_errors() {
        let dir = TempDir::new().unwrap();
        let error = read_entry_names(dir.path()).unwrap_err();
        assert!(matches!(error, ArchiveError::ArchiveRead { .. }));

        let garbage = dir.path().join("garbage.zip");
        fs::write(&garbage, b"definitely not a zip").unwrap();
        let error = read_entry_names(&garbage).unwrap_err();
        assert!(matches!(error, ArchiveError::ArchiveRead { .. }));
    }

    #[test]
    fn test_write_planned_entries() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.txt");
        fs::write(&source, b"payload").unwrap();
        let archive = dir.path().join("out.zip");

        let mut writer = ZipWriter::new(File::create(&archive).unwrap());
        let options = entry_options(Some(9));
        write_planned_entry(
            &mut writer,
            &PlannedEntry::Directory {
                path: "stores/s1/".to_string(),
            },
            options,
        )
        .unwrap();
        write_planned_entry(
            &mut writer,
            &PlannedEntry::File {
                path: "apps/a.txt".to_string(),
                source,
            },
            options,
        )
        .unwrap();
        writer.finish().unwrap();

        let mut zip = ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        assert_eq!(read_entry_names(&archive).unwrap(), vec!["stores/s1/", "apps/a.txt"]);
        let mut content = String::new();
        io::Read::read_to_string(&mut zip.by_name("apps/a.txt").unwrap(), &mut content).unwrap();
        assert_eq!(content, "payload");
    }
}
