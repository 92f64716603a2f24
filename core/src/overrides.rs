//! Loading override artifacts from static registrations and manifest
//! directories.
//!
//! Manifest directories are scanned in lexical file-name order. An artifact
//! that cannot be read or parsed is dropped and reported; the others load.
//! A method or attribute name declared by two artifacts is a configuration
//! error, whichever order they were found in.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::artifact::{CustomMethod, HandlerCatalog, OverrideArtifact, MANIFEST_SUFFIX};
use crate::error::{ConfigError, OverrideLoadError};

#[derive(Debug, Default)]
pub struct MethodOverrideLoader {
    artifacts: Vec<OverrideArtifact>,
    directories: Vec<(PathBuf, Arc<HandlerCatalog>)>,
}

/// The artifacts that loaded, and the ones that did not.
#[derive(Debug, Default)]
pub struct LoadedOverrides {
    pub artifacts: Vec<OverrideArtifact>,
    pub errors: Vec<OverrideLoadError>,
}

impl LoadedOverrides {
    /// Every override method with the artifact that declares it.
    pub fn methods(&self) -> impl Iterator<Item = (&str, &CustomMethod)> {
        self.artifacts
            .iter()
            .flat_map(|a| a.methods().iter().map(move |m| (a.name(), m)))
    }

    /// All artifact attributes, merged.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.artifacts
            .iter()
            .flat_map(|a| a.attributes().iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl MethodOverrideLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: OverrideArtifact) {
        self.artifacts.push(artifact);
    }

    pub fn push_directory(&mut self, dir: impl Into<PathBuf>, catalog: Arc<HandlerCatalog>) {
        self.directories.push((dir.into(), catalog));
    }

    pub fn load(self) -> Result<LoadedOverrides, ConfigError> {
        let mut loaded = LoadedOverrides {
            artifacts: self.artifacts,
            errors: Vec::new(),
        };

        for (dir, catalog) in &self.directories {
            load_directory(dir, catalog, &mut loaded);
        }

        check_unique(&loaded.artifacts)?;

        for err in &loaded.errors {
            tracing::warn!(artifact = %err.artifact, reason = %err.reason, "skipping override artifact");
        }
        tracing::debug!(
            loaded = loaded.artifacts.len(),
            failed = loaded.errors.len(),
            "loaded override artifacts"
        );
        Ok(loaded)
    }
}

fn load_directory(dir: &Path, catalog: &HandlerCatalog, loaded: &mut LoadedOverrides) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "no override directory");
            return;
        }
        Err(err) => {
            loaded.errors.push(OverrideLoadError {
                artifact: dir.display().to_string(),
                reason: err.to_string(),
            });
            return;
        }
    };

    let mut manifests: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                loaded.errors.push(OverrideLoadError {
                    artifact: dir.display().to_string(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let file_name = match entry.file_name().into_string() {
            Ok(file_name) => file_name,
            Err(raw) => {
                let lossy = raw.to_string_lossy().into_owned();
                if lossy.ends_with(MANIFEST_SUFFIX) {
                    loaded.errors.push(OverrideLoadError {
                        artifact: lossy,
                        reason: "file name is not valid UTF-8".to_string(),
                    });
                }
                continue;
            }
        };
        if let Some(name) = file_name.strip_suffix(MANIFEST_SUFFIX) {
            manifests.push((name.to_string(), entry.path()));
        }
    }
    manifests.sort();

    for (name, path) in manifests {
        let result = std::fs::read_to_string(&path)
            .map_err(|e| OverrideLoadError {
                artifact: name.clone(),
                reason: e.to_string(),
            })
            .and_then(|raw| OverrideArtifact::from_manifest(&name, &raw, catalog));
        match result {
            Ok(artifact) => loaded.artifacts.push(artifact),
            Err(err) => loaded.errors.push(err),
        }
    }
}

fn check_unique(artifacts: &[OverrideArtifact]) -> Result<(), ConfigError> {
    let mut artifact_names = BTreeSet::new();
    let mut declared: BTreeMap<&str, &str> = BTreeMap::new();

    for artifact in artifacts {
        let owner = artifact.name();
        if !artifact_names.insert(owner) {
            return Err(duplicate(owner, owner, owner));
        }
        let names = artifact
            .methods()
            .iter()
            .map(|m| m.name.as_str())
            .chain(artifact.attributes().keys().map(String::as_str));
        for name in names {
            if let Some(first) = declared.insert(name, owner) {
                return Err(duplicate(name, first, owner));
            }
        }
    }
    Ok(())
}

fn duplicate(name: &str, first: &str, second: &str) -> ConfigError {
    ConfigError::DuplicateOverride {
        name: name.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Signature;
    use crate::client::MethodContext;
    use crate::synth::{CallArgs, Response};
    use tempfile::TempDir;

    fn noop(_: &MethodContext<'_>, _: &CallArgs) -> Result<Response, crate::error::ClientError> {
        Ok(Response::Raw(Value::Null))
    }

    fn catalog() -> Arc<HandlerCatalog> {
        Arc::new(HandlerCatalog::new().register("noop", noop))
    }

    fn write(dir: &TempDir, file: &str, body: &str) {
        std::fs::write(dir.path().join(file), body).unwrap();
    }

    #[test]
    fn loads_manifests_in_lexical_order_and_skips_other_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.override.json", r#"{"methods": [{"name": "b", "handler": "noop"}]}"#);
        write(&dir, "a.override.json", r#"{"methods": [{"name": "a", "handler": "noop"}]}"#);
        write(&dir, "methods.json", r#"{"a": {"endpoint": "a"}}"#);

        let mut loader = MethodOverrideLoader::new();
        loader.push_directory(dir.path(), catalog());
        let loaded = loader.load().unwrap();

        let names: Vec<_> = loaded.artifacts.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(loaded.errors.is_empty());
    }

    #[test]
    fn malformed_manifest_degrades_to_load_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.override.json", r#"{"methods": [{"name": "good", "handler": "noop"}]}"#);
        write(&dir, "bad.override.json", "{ this is not json");

        let mut loader = MethodOverrideLoader::new();
        loader.push_directory(dir.path(), catalog());
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.artifacts.len(), 1);
        assert_eq!(loaded.errors.len(), 1);
        assert_eq!(loaded.errors[0].artifact, "bad");
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_manifest_name_is_reported() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        write(&dir, "good.override.json", r#"{"methods": [{"name": "good", "handler": "noop"}]}"#);
        std::fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.override.json")), "{}").unwrap();
        std::fs::write(dir.path().join(OsStr::from_bytes(b"notes\xff.txt")), "").unwrap();

        let mut loader = MethodOverrideLoader::new();
        loader.push_directory(dir.path(), catalog());
        let loaded = loader.load().unwrap();

        assert_eq!(loaded.artifacts.len(), 1);
        assert_eq!(loaded.errors.len(), 1);
        assert!(loaded.errors[0].artifact.ends_with(".override.json"));
        assert!(loaded.errors[0].reason.contains("UTF-8"));
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let mut loader = MethodOverrideLoader::new();
        loader.push_directory(dir.path().join("absent"), catalog());
        let loaded = loader.load().unwrap();
        assert!(loaded.artifacts.is_empty());
        assert!(loaded.errors.is_empty());
    }

    #[test]
    fn same_method_in_two_artifacts_is_rejected() {
        let mut loader = MethodOverrideLoader::new();
        loader.push(OverrideArtifact::new("first").method("lookup", Signature::new(), noop));
        loader.push(OverrideArtifact::new("second").method("lookup", Signature::new(), noop));

        let err = loader.load().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateOverride { ref name, ref first, ref second }
                if name == "lookup" && first == "first" && second == "second"
        ));
    }

    #[test]
    fn same_attribute_in_two_artifacts_is_rejected() {
        let mut loader = MethodOverrideLoader::new();
        loader.push(OverrideArtifact::new("first").attribute("limit", 1));
        loader.push(OverrideArtifact::new("second").attribute("limit", 2));
        assert!(matches!(loader.load(), Err(ConfigError::DuplicateOverride { .. })));
    }

    #[test]
    fn static_and_manifest_artifact_with_same_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "verify_email.override.json", "{}");

        let mut loader = MethodOverrideLoader::new();
        loader.push(OverrideArtifact::new("verify_email"));
        loader.push_directory(dir.path(), catalog());
        assert!(matches!(loader.load(), Err(ConfigError::DuplicateOverride { .. })));
    }

    #[test]
    fn methods_and_attributes_are_flattened() {
        let mut loader = MethodOverrideLoader::new();
        loader.push(
            OverrideArtifact::new("tools")
                .method("ping", Signature::new(), noop)
                .attribute("version", 2),
        );
        let loaded = loader.load().unwrap();
        let methods: Vec<_> = loaded.methods().map(|(a, m)| (a, m.name.as_str())).collect();
        assert_eq!(methods, vec![("tools", "ping")]);
        assert_eq!(loaded.attributes()["version"], 2);
    }
}
