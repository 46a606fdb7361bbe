// Copyright (c) 2025 Obrador Contributors
//
// This file is part of Obrador.
//
// Licensed under the MIT License. See the LICENSE file in the repository root
// for full license text.

//! In-process artifact registry (C11): persists versioned forecaster/scoring
//! artifacts on disk with an atomically-updated `latest/<kind>` pointer and a
//! `registry.json` recording metrics per version. Writes go through a
//! single-writer path (the training job that calls [`Registry::publish`]);
//! reads ([`Registry::latest`], [`Registry::load_latest_bytes`]) never see a
//! partially-written file because the pointer swap and the metadata update
//! are both write-to-temp-then-rename.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use obrador_types::{ObradorError, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
    pub metrics: serde_json::Value,
    pub training_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KindEntry {
    latest: Option<ArtifactRecord>,
    versions: Vec<ArtifactRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryFile {
    #[serde(flatten)]
    kinds: BTreeMap<String, KindEntry>,
}

#[derive(Debug)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("latest"))
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("creating registry directory: {e}")))?;
        Ok(Self { root })
    }

    fn registry_file_path(&self) -> PathBuf {
        self.root.join("registry.json")
    }

    fn read_registry(&self) -> Result<RegistryFile> {
        let path = self.registry_file_path();
        if !path.exists() {
            return Ok(RegistryFile::default());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("reading registry.json: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("parsing registry.json: {e}")))
    }

    fn write_registry_atomically(&self, registry: &RegistryFile) -> Result<()> {
        let final_path = self.registry_file_path();
        let tmp_path = self.root.join("registry.json.tmp");
        let content = serde_json::to_string_pretty(registry)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("serializing registry.json: {e}")))?;
        fs::write(&tmp_path, content)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("writing registry.json.tmp: {e}")))?;
        fs::rename(&tmp_path, &final_path)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("renaming registry.json.tmp: {e}")))?;
        Ok(())
    }

    /// Writes a new versioned artifact, updates the `latest/<kind>` pointer
    /// by write-to-temp-then-rename, and appends the version to
    /// `registry.json`. A prediction that read the old pointer before this
    /// call completes finishes against the old bytes without error (§5).
    pub fn publish(
        &self,
        kind: &str,
        ext: &str,
        bytes: &[u8],
        metrics: serde_json::Value,
        training_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<ArtifactRecord> {
        let timestamp = Utc::now();
        let versioned_name = format!("{kind}_{}.{ext}", timestamp.format("%Y%m%dT%H%M%SZ"));
        let versioned_path = self.root.join(&versioned_name);
        fs::write(&versioned_path, bytes)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("writing artifact {versioned_name}: {e}")))?;

        let pointer_path = self.root.join("latest").join(format!("{kind}.{ext}"));
        let pointer_tmp = self.root.join("latest").join(format!("{kind}.{ext}.tmp"));
        fs::write(&pointer_tmp, bytes)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("writing latest pointer tmp: {e}")))?;
        fs::rename(&pointer_tmp, &pointer_path)
            .map_err(|e| ObradorError::Other(anyhow::anyhow!("renaming latest pointer: {e}")))?;

        let record = ArtifactRecord {
            kind: kind.to_owned(),
            timestamp,
            path: versioned_path.display().to_string(),
            metrics,
            training_window,
        };

        let mut registry = self.read_registry()?;
        let entry = registry.kinds.entry(kind.to_owned()).or_default();
        entry.versions.push(record.clone());
        entry.latest = Some(record.clone());
        self.write_registry_atomically(&registry)?;

        info!(kind, path = %record.path, "published artifact");
        Ok(record)
    }

    pub fn latest(&self, kind: &str) -> Result<Option<ArtifactRecord>> {
        let registry = self.read_registry()?;
        Ok(registry.kinds.get(kind).and_then(|e| e.latest.clone()))
    }

    pub fn versions(&self, kind: &str) -> Result<Vec<ArtifactRecord>> {
        let registry = self.read_registry()?;
        Ok(registry.kinds.get(kind).map(|e| e.versions.clone()).unwrap_or_default())
    }

    /// Reads the bytes behind the `latest/<kind>` pointer directly,
    /// bypassing `registry.json` — the lock-free read path named in §4.11.
    pub fn load_latest_bytes(&self, kind: &str, ext: &str) -> Result<Vec<u8>> {
        let pointer_path = self.latest_pointer_path(kind, ext);
        fs::read(&pointer_path)
            .map_err(|e| ObradorError::ModelNotTrained(format!("reading latest/{kind}.{ext}: {e}")))
    }

    pub fn latest_pointer_path(&self, kind: &str, ext: &str) -> PathBuf {
        self.root.join("latest").join(format!("{kind}.{ext}"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();

        let record = registry
            .publish("forecaster", "bin", b"model-bytes", serde_json::json!({"mae": 0.04}), None)
            .unwrap();

        let latest = registry.latest("forecaster").unwrap().unwrap();
        assert_eq!(latest.path, record.path);
        assert_eq!(latest.metrics["mae"], 0.04);

        let bytes = registry.load_latest_bytes("forecaster", "bin").unwrap();
        assert_eq!(bytes, b"model-bytes");
    }

    #[test]
    fn second_publish_keeps_old_version_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();

        registry
            .publish("scoring_regressor", "json", b"v1", serde_json::json!({}), None)
            .unwrap();
        registry
            .publish("scoring_regressor", "json", b"v2", serde_json::json!({}), None)
            .unwrap();

        let versions = registry.versions("scoring_regressor").unwrap();
        assert_eq!(versions.len(), 2);
        let latest = registry.load_latest_bytes("scoring_regressor", "json").unwrap();
        assert_eq!(latest, b"v2");
    }

    #[test]
    fn missing_artifact_reports_model_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path()).unwrap();
        let err = registry.load_latest_bytes("forecaster", "bin").unwrap_err();
        assert!(matches!(err, ObradorError::ModelNotTrained(_)));
    }
}
