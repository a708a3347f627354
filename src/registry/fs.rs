//! Filesystem registry backend
//!
//! Keys are split on `/` and each segment becomes one directory level, so a
//! key like `/registry/pods/web` is stored at `%_/registry/pods/web/%` under
//! the root and a prefix scan only walks the subtree the prefix names. The
//! value file is always called `%`, which no escaped segment can be.
//! Writes go to a temporary file first and are renamed into place, so
//! readers never see a partial value.

use super::{KeyValue, Registry};
use crate::error::{Result, RudderError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const TEMP_PREFIX: &str = ".tmp-";
const VALUE_FILE: &str = "%";
const EMPTY_SEGMENT: &str = "%_";

/// Registry backed by a local directory
#[derive(Debug, Clone)]
pub struct FsRegistry {
    root: PathBuf,
}

impl FsRegistry {
    /// Open (and create if needed) a registry rooted at `root`
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn segments_dir<'k>(&self, segments: impl IntoIterator<Item = &'k str>) -> PathBuf {
        let mut path = self.root.clone();
        for segment in segments {
            path.push(encode_segment(segment));
        }
        path
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.segments_dir(key.split('/')).join(VALUE_FILE)
    }
}

#[async_trait]
impl Registry for FsRegistry {
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        // Complete segments of the prefix pick the subtree to walk
        let start: Vec<String> = match prefix.rfind('/') {
            Some(idx) => prefix[..idx].split('/').map(str::to_string).collect(),
            None => Vec::new(),
        };

        let mut pending = vec![(self.segments_dir(start.iter().map(String::as_str)), start)];
        let mut result = Vec::new();

        while let Some((dir, segments)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(unavailable(e)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(unavailable)? {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };

                if name == VALUE_FILE {
                    if segments.is_empty() {
                        continue;
                    }
                    let key = segments.join("/");
                    if !key.starts_with(prefix) {
                        continue;
                    }
                    match fs::read(entry.path()).await {
                        Ok(value) => result.push(KeyValue { key, value }),
                        // Raced with a rename; the key is simply not there any more
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(unavailable(e)),
                    }
                    continue;
                }

                if name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                let Some(segment) = decode_segment(name) else {
                    continue;
                };
                if entry.file_type().await.map_err(unavailable)?.is_dir() {
                    let mut child = segments.clone();
                    child.push(segment);
                    pending.push((entry.path(), child));
                }
            }
        }

        result.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(result)
    }

    async fn get_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.value_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let target = self.value_path(key);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).await.map_err(unavailable)?;
        }

        let temp = self.root.join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4()));
        let mut file = fs::File::create(&temp).await.map_err(unavailable)?;
        file.write_all(&value).await.map_err(unavailable)?;
        file.sync_all().await.map_err(unavailable)?;
        drop(file);

        fs::rename(&temp, &target).await.map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(e: std::io::Error) -> RudderError {
    RudderError::RegistryUnavailable(e.to_string())
}

/// Escape one key segment into a directory name.
///
/// `%` is always escaped, so `%` and `%_` never come out of here. A leading
/// `.` is escaped too, which keeps `.`, `..` and temporary file names out.
fn encode_segment(segment: &str) -> String {
    if segment.is_empty() {
        return EMPTY_SEGMENT.to_string();
    }

    let mut out = String::with_capacity(segment.len());
    for (i, c) in segment.chars().enumerate() {
        match c {
            '%' => out.push_str("%25"),
            '\0' => out.push_str("%00"),
            '.' if i == 0 => out.push_str("%2E"),
            c => out.push(c),
        }
    }
    out
}

/// Reverse of [`encode_segment`]; `None` for names this backend did not write
fn decode_segment(name: &str) -> Option<String> {
    if name == EMPTY_SEGMENT {
        return Some(String::new());
    }

    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let escape = rest.get(idx..idx + 3)?;
        match escape {
            "%25" => out.push('%'),
            "%00" => out.push('\0'),
            "%2E" => out.push('.'),
            _ => return None,
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);

    Some(out)
}
