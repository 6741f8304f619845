//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use model_archive::{ArchiveBackend, BackendKind, EngineConfig};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Entry contents keyed by name; directories map to `None`.
pub type ZipContents = BTreeMap<String, Option<Vec<u8>>>;

/// Helper function to create a test ZIP archive.
///
/// Names ending with `/` become directory entries; files alternate between
/// stored and deflated so both survive copying.
pub fn create_test_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let zip_path = dir.join(name);
    let file = fs::File::create(&zip_path).unwrap();
    let mut zip = ZipWriter::new(file);

    for (index, (entry_name, content)) in entries.iter().enumerate() {
        let method = if index % 2 == 0 {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        if entry_name.ends_with('/') {
            zip.add_directory(*entry_name, options).unwrap();
        } else {
            zip.start_file(*entry_name, options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();

    zip_path
}

/// Decompressed contents of every entry.
pub fn read_zip(path: &Path) -> ZipContents {
    let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut contents = ZipContents::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).unwrap();
        let name = entry.name().to_string();
        if entry.is_dir() {
            contents.insert(name, None);
        } else {
            let mut buffer = Vec::new();
            entry.read_to_end(&mut buffer).unwrap();
            contents.insert(name, Some(buffer));
        }
    }
    contents
}

/// Entry names in archive order.
pub fn zip_names(path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect::<Vec<_>>()
}

/// Compressed bytes, method and CRC of each entry, as stored on disk.
pub fn raw_records(path: &Path) -> BTreeMap<String, (CompressionMethod, u32, Vec<u8>)> {
    let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut records = BTreeMap::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index_raw(index).unwrap();
        let mut raw = Vec::new();
        entry.read_to_end(&mut raw).unwrap();
        records.insert(
            entry.name().to_string(),
            (entry.compression(), entry.crc32(), raw),
        );
    }
    records
}

/// A source directory laid out as `{a.txt, sub/b.txt}`.
pub fn create_source_tree(dir: &Path) -> PathBuf {
    let root = dir.join("source");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), b"alpha").unwrap();
    fs::write(root.join("sub").join("b.txt"), b"beta").unwrap();
    root
}

pub fn write_source_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

pub fn config_for(kind: BackendKind, temp_dir: Option<PathBuf>) -> EngineConfig {
    EngineConfig {
        backend: kind,
        temp_dir,
        ..EngineConfig::default()
    }
}

pub fn backend_for(kind: BackendKind, temp_dir: Option<PathBuf>) -> Box<dyn ArchiveBackend> {
    model_archive::create_backend(&config_for(kind, temp_dir)).unwrap()
}
