//! Manifest decoding and flattening
//!
//! A manifest is the JSON document a mirror publishes for one content
//! version:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "host": "http://mirror.example/mod",
//!   "files": {
//!     "a.txt": { "hash": "<sha1 hex>", "size": 12 },
//!     "sub": { "b.txt": { "hash": "<sha1 hex>" } }
//!   }
//! }
//! ```
//!
//! Any object carrying a `hash` key is a file; every other object is a
//! directory. Each file is served gzipped at
//! `{host}/{version}/{path}/{name}.gz`.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirrorsync_core::VersionOrdinal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ManifestError;

const SEPARATORS: [char; 2] = ['/', '\\'];

/// A decoded manifest as served by one mirror
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Content version published by the mirror
    pub version: VersionOrdinal,

    /// Base URL that file URLs are built from
    pub host: String,

    /// Remote file hierarchy
    pub tree: ManifestTree,

    /// Time from sending the request until response headers arrived
    pub latency: Duration,

    /// URL the manifest was fetched from
    pub source: String,
}

#[derive(Deserialize)]
struct ManifestDocument {
    version: String,
    host: String,
    files: Map<String, Value>,
}

impl Manifest {
    /// Decode a manifest body
    pub fn from_slice(
        body: &[u8],
        source: impl Into<String>,
        latency: Duration,
    ) -> Result<Self, ManifestError> {
        let document: ManifestDocument = serde_json::from_slice(body)?;
        let tree = ManifestTree::from_json(&document.files)?;

        Ok(Self {
            version: VersionOrdinal::parse(&document.version),
            host: document.host,
            tree,
            latency,
            source: source.into(),
        })
    }

    /// Every file in the manifest, with download URLs for this version
    pub fn files(&self) -> Flatten<'_> {
        self.tree.flatten(&self.host, self.version.as_str())
    }

    /// Number of files in the manifest
    pub fn file_count(&self) -> usize {
        self.tree.file_count()
    }
}

/// A node in the remote file hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestNode {
    Directory(BTreeMap<String, ManifestNode>),
    File { hash: String, size: Option<u64> },
}

/// The remote file hierarchy, immutable once decoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestTree {
    root: BTreeMap<String, ManifestNode>,
}

impl ManifestTree {
    /// Build a tree from the manifest's `files` object
    ///
    /// Rejects nodes that are not objects, non-string hashes, path segments
    /// that would escape the destination root and files without a name. Two
    /// files landing on the same destination path, or a file whose path is
    /// also needed as a directory, are rejected as duplicates.
    pub fn from_json(files: &Map<String, Value>) -> Result<Self, ManifestError> {
        let mut seen = Destinations::default();
        let root = decode_directory(files, "", &mut seen)?;
        Ok(Self { root })
    }

    /// Top-level entries
    pub fn root(&self) -> &BTreeMap<String, ManifestNode> {
        &self.root
    }

    /// Lazily flatten into one [`FileRecord`] per file
    pub fn flatten<'a>(&'a self, host: &'a str, version: &'a str) -> Flatten<'a> {
        Flatten {
            host,
            version,
            stack: vec![(String::new(), self.root.iter())],
        }
    }

    pub fn file_count(&self) -> usize {
        fn count(nodes: &BTreeMap<String, ManifestNode>) -> usize {
            nodes
                .values()
                .map(|node| match node {
                    ManifestNode::Directory(children) => count(children),
                    ManifestNode::File { .. } => 1,
                })
                .sum()
        }
        count(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }
}

fn decode_directory(
    entries: &Map<String, Value>,
    prefix: &str,
    seen: &mut Destinations,
) -> Result<BTreeMap<String, ManifestNode>, ManifestError> {
    let mut nodes = BTreeMap::new();

    for (name, value) in entries {
        let location = join_path(prefix, name);
        check_segments(&location)?;

        let object = value
            .as_object()
            .ok_or_else(|| ManifestError::malformed(&location, "expected an object"))?;

        let node = match object.get("hash") {
            Some(hash) => {
                let hash = hash
                    .as_str()
                    .ok_or_else(|| ManifestError::malformed(&location, "hash is not a string"))?;
                let size = match object.get("size") {
                    None | Some(Value::Null) => None,
                    Some(size) => Some(size.as_u64().ok_or_else(|| {
                        ManifestError::malformed(&location, "size is not a non-negative integer")
                    })?),
                };

                seen.claim_file(&location)?;

                ManifestNode::File {
                    hash: hash.to_string(),
                    size,
                }
            }
            None => ManifestNode::Directory(decode_directory(object, &location, seen)?),
        };

        nodes.insert(name.clone(), node);
    }

    Ok(nodes)
}

/// Destination paths claimed so far, split into files and the directories
/// those files need
#[derive(Default)]
struct Destinations {
    files: HashSet<String>,
    directories: HashSet<String>,
}

impl Destinations {
    fn claim_file(&mut self, location: &str) -> Result<(), ManifestError> {
        match location.rsplit(SEPARATORS).next() {
            Some(name) if !name.is_empty() && name != "." => {}
            _ => return Err(ManifestError::malformed(location, "file name is empty")),
        }

        let destination = normalize_path(location);
        if self.directories.contains(&destination) || !self.files.insert(destination.clone()) {
            return Err(ManifestError::DuplicatePath { path: destination });
        }

        for (end, _) in destination.match_indices('/') {
            let directory = &destination[..end];
            if self.files.contains(directory) {
                return Err(ManifestError::DuplicatePath {
                    path: directory.to_string(),
                });
            }
            self.directories.insert(directory.to_string());
        }
        Ok(())
    }
}

fn check_segments(location: &str) -> Result<(), ManifestError> {
    for segment in location.split(SEPARATORS) {
        if segment == ".." || segment.contains(':') {
            return Err(ManifestError::malformed(
                location,
                "path escapes the destination directory",
            ));
        }
    }
    Ok(())
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn normalize_path(path: &str) -> String {
    path.split(SEPARATORS)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the download URL for a file
///
/// Empty segments are skipped, backslashes become `/`, and spaces are
/// encoded as `%20`.
///
/// ```rust
/// use mirrorsync_update::manifest::file_url;
///
/// assert_eq!(
///     file_url("http://m.example/mod/", "1.0", "sub dir", "b.txt"),
///     "http://m.example/mod/1.0/sub%20dir/b.txt.gz"
/// );
/// assert_eq!(file_url("http://m", "2", "", "a"), "http://m/2/a.gz");
/// ```
pub fn file_url(host: &str, version: &str, path: &str, name: &str) -> String {
    let file_name = format!("{}.gz", name);
    let mut url = host.trim_end_matches(SEPARATORS).to_string();

    let segments = std::iter::once(version)
        .chain(path.split(SEPARATORS))
        .chain(std::iter::once(file_name.as_str()));

    for segment in segments {
        let segment = segment.trim_matches(SEPARATORS);
        if segment.is_empty() {
            continue;
        }
        url.push('/');
        url.push_str(segment);
    }

    url.replace('\\', "/").replace(' ', "%20")
}

/// One file to validate and possibly download
///
/// A record moves from the validate queue to the download queue; it is owned
/// by one queue at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// `/`-joined ancestor directories, empty at the root
    pub path: String,

    /// File name
    pub name: String,

    /// Expected SHA-1 of the decompressed content
    pub hash: String,

    /// Download URL
    pub url: String,

    /// Size hint from the manifest
    pub size: Option<u64>,

    /// Download attempts made so far
    pub attempts: u32,
}

impl FileRecord {
    /// Path relative to the destination root, `/`-separated
    pub fn relative_path(&self) -> String {
        normalize_path(&join_path(&self.path, &self.name))
    }

    /// Absolute destination under `root`
    pub fn destination(&self, root: &Path) -> PathBuf {
        let mut destination = root.to_path_buf();
        for segment in self.relative_path().split('/') {
            destination.push(segment);
        }
        destination
    }
}

/// Iterator returned by [`ManifestTree::flatten`]
pub struct Flatten<'a> {
    host: &'a str,
    version: &'a str,
    stack: Vec<(String, btree_map::Iter<'a, String, ManifestNode>)>,
}

impl Iterator for Flatten<'_> {
    type Item = FileRecord;

    fn next(&mut self) -> Option<FileRecord> {
        loop {
            let (prefix, entries) = self.stack.last_mut()?;

            match entries.next() {
                None => {
                    self.stack.pop();
                }
                Some((name, ManifestNode::Directory(children))) => {
                    let path = join_path(prefix, name);
                    self.stack.push((path, children.iter()));
                }
                Some((name, ManifestNode::File { hash, size })) => {
                    return Some(FileRecord {
                        url: file_url(self.host, self.version, prefix, name),
                        path: prefix.clone(),
                        name: name.clone(),
                        hash: hash.clone(),
                        size: *size,
                        attempts: 0,
                    });
                }
            }
        }
    }
}
