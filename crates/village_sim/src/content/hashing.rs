use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    pub xml_file_count: usize,
    pub hash_hex: String,
}

/// SHA-256 over every XML file's relative path and bytes, in path order.
pub fn hash_xml_inputs(dir: &Path) -> io::Result<ContentHash> {
    let xml_files = collect_xml_files(dir)?;
    let mut hasher = Sha256::new();
    for (normalized_rel, abs_path) in &xml_files {
        let bytes = fs::read(abs_path)?;
        hasher.update(normalized_rel.as_bytes());
        hasher.update([0u8]);
        hasher.update(&bytes);
    }

    Ok(ContentHash {
        xml_file_count: xml_files.len(),
        hash_hex: to_hex_lower(&hasher.finalize()),
    })
}

/// `*.xml` files under `dir` as (normalized relative path, absolute path),
/// sorted by relative path.
pub(crate) fn collect_xml_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::<(String, PathBuf)>::new();
    collect_recursive(dir, dir, &mut files)?;
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<(String, PathBuf)>,
) -> io::Result<()> {
    for entry in fs::read_dir(current)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
            continue;
        }
        if !is_xml_file(&path) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        files.push((normalize_rel_path(rel), path.clone()));
    }
    Ok(())
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
