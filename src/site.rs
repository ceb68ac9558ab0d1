//! Static content table for the public directory.
//!
//! The directory is walked once at startup. Every file is routed by its path
//! relative to the root, and each `index.html` additionally answers for its
//! directory with and without a trailing slash.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFile {
    pub path: PathBuf,
    pub content_type: String,
}

impl StaticFile {
    fn new(path: PathBuf) -> Self {
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .to_string();
        Self { path, content_type }
    }
}

#[derive(Debug, Default)]
pub struct StaticSite {
    routes: FxHashMap<String, StaticFile>,
}

impl StaticSite {
    pub fn scan(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref();
        let mut site = Self::default();
        let mut to_scan = VecDeque::from([root.to_path_buf()]);
        // Canonical directories already walked. Symlinks are followed, so a
        // link back to an ancestor would otherwise loop forever.
        let mut visited = FxHashSet::default();

        while let Some(dir) = to_scan.pop_front() {
            if !visited.insert(std::fs::canonicalize(&dir)?) {
                debug!("skipping {}: already indexed", dir.display());
                continue;
            }
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                let metadata = match std::fs::metadata(&path) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        debug!("skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                if metadata.is_dir() {
                    to_scan.push_back(path);
                } else if metadata.is_file() {
                    if let Ok(rel) = path.strip_prefix(root) {
                        site.insert(rel, path.clone());
                    }
                } else {
                    debug!("skipping {}: not a regular file", path.display());
                }
            }
        }

        info!(
            "Indexed {} routes under {}.",
            site.routes.len(),
            root.display()
        );
        Ok(site)
    }

    fn insert(&mut self, rel: &Path, path: PathBuf) {
        let segments: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some((file_name, parents)) = segments.split_last() else {
            return;
        };

        let file = StaticFile::new(path);
        let route = format!("/{}", segments.join("/"));
        debug!("route {} -> {}", route, file.path.display());

        if file_name == "index.html" {
            if parents.is_empty() {
                self.routes.insert("/".to_string(), file.clone());
            } else {
                let dir = format!("/{}", parents.join("/"));
                self.routes.insert(format!("{dir}/"), file.clone());
                self.routes.insert(dir, file.clone());
            }
        }
        self.routes.insert(route, file);
    }

    /// Looks up an already percent-decoded request path.
    pub fn lookup(&self, path: &str) -> Option<&StaticFile> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
