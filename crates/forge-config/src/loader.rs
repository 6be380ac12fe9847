use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::{CapabilitySource, Config};

/// File formats accepted for configuration and capability descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            "toml" => Ok(Format::Toml),
            other => bail!("unsupported file extension {other:?} for {}", path.display()),
        }
    }
}

/// Parse `path` into a JSON value regardless of its on-disk format so that
/// layers of different formats can be merged.
fn read_value(path: &Path) -> anyhow::Result<Value> {
    let format = Format::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value = match format {
        Format::Yaml => serde_yaml::from_str::<Value>(&text)
            .with_context(|| format!("parsing {}", path.display()))?,
        Format::Json => serde_json::from_str::<Value>(&text)
            .with_context(|| format!("parsing {}", path.display()))?,
        Format::Toml => {
            let t: toml::Value = toml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            serde_json::to_value(t)?
        }
    };
    Ok(value)
}

fn from_value<T: DeserializeOwned>(value: Value, path: &Path) -> anyhow::Result<T> {
    serde_json::from_value(value).with_context(|| format!("decoding {}", path.display()))
}

/// Load a single configuration file.
pub fn load_file(path: &Path) -> anyhow::Result<Config> {
    debug!(path = %path.display(), "loading config");
    let mut config: Config = from_value(read_value(path)?, path)?;
    config.capability_files = resolve_relative(path, config.capability_files);
    Ok(config)
}

/// Load configuration by deep-merging `paths` in order; later files win.
pub fn load_layers(paths: &[&Path]) -> anyhow::Result<Config> {
    let mut merged = Value::Object(serde_json::Map::new());
    for path in paths {
        debug!(path = %path.display(), "loading config layer");
        merge_value(&mut merged, read_value(path)?);
    }
    let config = serde_json::from_value(merged).context("decoding merged configuration")?;
    Ok(config)
}

/// Load one capability descriptor file and stamp it with its origin.
pub fn load_capability_file(path: &Path) -> anyhow::Result<CapabilitySource> {
    let path = expand_path(path);
    let mut source: CapabilitySource = from_value(read_value(&path)?, &path)?;
    source.source_file = Some(path);
    Ok(source)
}

/// Expand a leading `~` and environment variables in `path`.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

/// Capability files listed in a config file are relative to that file.
fn resolve_relative(config_path: &Path, files: Vec<PathBuf>) -> Vec<PathBuf> {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    files
        .into_iter()
        .map(|f| {
            let f = expand_path(&f);
            if f.is_relative() { base.join(f) } else { f }
        })
        .collect()
}

/// Deep-merge `src` into `dst`; src wins on scalar and array conflicts.
fn merge_value(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => {
            for (k, v) in s {
                let entry = d.entry(k).or_insert(Value::Object(serde_json::Map::new()));
                merge_value(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::{CapabilityKind, StrategyKind};

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn merge_scalar_src_wins() {
        let mut dst = json!({"x": 1});
        merge_value(&mut dst, json!({"x": 2}));
        assert_eq!(dst["x"], 2);
    }

    #[test]
    fn merge_nested_objects_keeps_untouched_keys() {
        let mut dst = json!({"conversation": {"strategy": "summarizing", "summary_ratio": 0.3}});
        merge_value(&mut dst, json!({"conversation": {"summary_ratio": 0.5}}));
        assert_eq!(dst["conversation"]["strategy"], "summarizing");
        assert_eq!(dst["conversation"]["summary_ratio"], 0.5);
    }

    #[test]
    fn load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "agent.yaml",
            "model: litellm:gpt-4o\nconversation:\n  strategy: summarizing\n",
        );
        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.model, "litellm:gpt-4o");
        assert_eq!(cfg.conversation.strategy, StrategyKind::Summarizing);
        assert_eq!(cfg.conversation.preserve_recent_messages, 10);
    }

    #[test]
    fn load_layers_mixes_formats() {
        let dir = tempfile::tempdir().unwrap();
        let base = write_file(&dir, "base.toml", "model = \"ollama:llama3\"\n[loader]\nmax_concurrency = 5\n");
        let over = write_file(&dir, "over.json", r#"{"model": "ollama:qwen2"}"#);
        let cfg = load_layers(&[&base, &over]).unwrap();
        assert_eq!(cfg.model, "ollama:qwen2");
        assert_eq!(cfg.loader.max_concurrency, 5);
    }

    #[test]
    fn capability_file_records_its_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "fs.json",
            r#"{"id": "fs", "type": "process-server", "command": "fs-server"}"#,
        );
        let source = load_capability_file(&path).unwrap();
        assert_eq!(source.id, "fs");
        assert_eq!(source.source_file.as_deref(), Some(path.as_path()));
        assert!(matches!(source.kind, CapabilityKind::ProcessServer(_)));
    }

    #[test]
    fn relative_capability_files_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "agent.yml", "capability_files: [tools/fs.yaml]\n");
        let cfg = load_file(&path).unwrap();
        assert_eq!(cfg.capability_files, vec![dir.path().join("tools/fs.yaml")]);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "agent.ini", "model = x\n");
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported file extension"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_file(Path::new("/tmp/forge_nonexistent_config_xyz.yaml")).is_err());
    }
}
