//! Builder for manifest documents

use mirrorsync_update::fetch::sha1_hex;
use serde_json::{json, Map, Value};

/// Fluent builder producing manifest JSON
///
/// File paths use `/` and create intermediate directories.
pub struct ManifestBuilder {
    version: String,
    host: String,
    files: Map<String, Value>,
}

impl ManifestBuilder {
    pub fn new(version: &str, host: &str) -> Self {
        Self {
            version: version.to_string(),
            host: host.to_string(),
            files: Map::new(),
        }
    }

    /// Add a file whose hash is the SHA-1 of `content`
    pub fn file(self, path: &str, content: &[u8]) -> Self {
        let hash = sha1_hex(content);
        self.file_with_hash(path, &hash)
    }

    /// Add a file with an explicit hash
    pub fn file_with_hash(mut self, path: &str, hash: &str) -> Self {
        let segments: Vec<&str> = path.split('/').collect();
        let (name, dirs) = segments.split_last().expect("non-empty path");

        let mut node = &mut self.files;
        for dir in dirs {
            node = node
                .entry(dir.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .expect("directory node");
        }
        node.insert(name.to_string(), json!({ "hash": hash }));
        self
    }

    pub fn build(&self) -> Value {
        json!({
            "version": self.version,
            "host": self.host,
            "files": self.files,
        })
    }
}
