use super::Script;
use crate::error::ScriptError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const SCRIPT_EXTENSION: &str = "rhai";

/// Reads `<base_dir>/<name>.rhai` and caches parsed scripts by name.
///
/// The cache lock is never held across file I/O.
#[derive(Debug)]
pub struct ScriptLoader {
    base_dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<Script>>>,
}

impl ScriptLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Cache first, then disk. A trailing `.rhai` is accepted.
    pub async fn load(&self, name: &str) -> Result<Arc<Script>, ScriptError> {
        let name = normalize_name(name)?;
        if let Some(script) = self.get(name) {
            return Ok(script);
        }

        let path = self.base_dir.join(format!("{name}.{SCRIPT_EXTENSION}"));
        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(ScriptError::NotFound {
                    name: name.to_string(),
                    path: path.display().to_string(),
                });
            }
            Err(source) => {
                return Err(ScriptError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
        self.read_and_cache(name, &path).await
    }

    /// Load an arbitrary script file, cached under its file stem.
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<Arc<Script>, ScriptError> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| ScriptError::InvalidName(path.display().to_string()))?;
        let name = normalize_name(stem)?.to_string();
        self.read_and_cache(&name, path).await
    }

    /// Scan the directory for `*.rhai` files, sorted by name.
    ///
    /// Unreadable files are logged and skipped; a missing directory yields an
    /// empty list.
    pub async fn list(&self) -> Result<Vec<Arc<Script>>, ScriptError> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ScriptError::Io {
                    path: self.base_dir.display().to_string(),
                    source,
                });
            }
        };

        let mut scripts = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(ScriptError::Io {
                        path: self.base_dir.display().to_string(),
                        source,
                    });
                }
            };
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION) {
                continue;
            }
            if entry.file_type().await.is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            match self.load_file(&path).await {
                Ok(script) => scripts.push(script),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable script");
                }
            }
        }

        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }

    /// Drop the cache and re-scan. Returns the number of scripts found.
    pub async fn reload(&self) -> Result<usize, ScriptError> {
        self.lock().clear();
        let count = self.list().await?.len();
        tracing::info!(count, dir = %self.base_dir.display(), "scripts reloaded");
        Ok(count)
    }

    /// Cache lookup only, no I/O.
    pub fn get(&self, name: &str) -> Option<Arc<Script>> {
        let name = name.strip_suffix(".rhai").unwrap_or(name);
        self.lock().get(name).cloned()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    async fn read_and_cache(&self, name: &str, path: &Path) -> Result<Arc<Script>, ScriptError> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ScriptError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let script = Arc::new(Script::new(name, path, source));
        self.lock().insert(name.to_string(), Arc::clone(&script));
        tracing::debug!(script = name, path = %path.display(), "script loaded");
        Ok(script)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Script>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Strip an optional `.rhai` suffix and reject anything that could leave the
/// script directory.
pub fn normalize_name(name: &str) -> Result<&str, ScriptError> {
    let bare = name.strip_suffix(".rhai").unwrap_or(name);
    if bare.is_empty()
        || bare.starts_with('.')
        || bare.contains(['/', '\\', '\0'])
        || bare.contains("..")
    {
        return Err(ScriptError::InvalidName(name.to_string()));
    }
    Ok(bare)
}
