//! imagepin.kdl パーサー
//!
//! 記述が無い項目は既定値（spatialdata イメージ）のまま残す。
//! `package` ノードが1つでもあれば既定のパッケージ一覧は置き換えられる。

use crate::error::{ConfigError, Result};
use crate::model::{IndexBackend, Manifest, PackageSpec};
use kdl::{KdlDocument, KdlNode};
use std::path::{Path, PathBuf};

/// KDLファイルを Manifest にパース
pub fn parse_manifest_file(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest(&content)
}

/// KDL文字列を Manifest にパース
pub fn parse_manifest(content: &str) -> Result<Manifest> {
    let doc: KdlDocument = content.parse()?;

    let mut manifest = Manifest::default();
    let mut packages = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "image" => {
                if let Some(name) = first_string(node) {
                    manifest.image.name = name;
                }
                if let Some(registry) = property(node, "registry") {
                    manifest.image.registry = registry;
                }
                if let Some(namespace) = property(node, "namespace") {
                    manifest.image.namespace = namespace;
                }
            }
            "build" => {
                if let Some(children) = node.children() {
                    for child in children.nodes() {
                        match child.name().value() {
                            "context" => {
                                if let Some(path) = first_string(child) {
                                    manifest.build.context = PathBuf::from(path);
                                }
                            }
                            "dockerfile" => {
                                if let Some(path) = first_string(child) {
                                    manifest.build.dockerfile = PathBuf::from(path);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            "package" => {
                packages.push(parse_package(node)?);
            }
            "index" => {
                if let Some(backend) = first_string(node) {
                    manifest.index.backend = IndexBackend::parse(&backend)?;
                }
                if let Some(url) = property(node, "url") {
                    manifest.index.url = url;
                }
            }
            "github-api" => {
                if let Some(url) = first_string(node) {
                    manifest.github_api = url;
                }
            }
            "allow-missing-package" => {
                manifest.allow_missing_package = parse_flag(node)?;
            }
            other => {
                tracing::debug!("Ignoring unknown manifest node: {}", other);
            }
        }
    }

    if !packages.is_empty() {
        manifest.packages = packages;
    }

    manifest.validate()?;
    Ok(manifest)
}

/// package ノードをパース
fn parse_package(node: &KdlNode) -> Result<PackageSpec> {
    let name = first_string(node)
        .ok_or_else(|| ConfigError::InvalidConfig("package には名前が必要です".to_string()))?;

    Ok(match property(node, "build-arg") {
        Some(build_arg) => PackageSpec::with_build_arg(&name, &build_arg),
        None => PackageSpec::new(&name),
    })
}

/// 真偽値ノードをパース。引数なしは `#true`、真偽値以外はエラー
fn parse_flag(node: &KdlNode) -> Result<bool> {
    match node.entries().iter().find(|e| e.name().is_none()) {
        None => Ok(true),
        Some(entry) => entry.value().as_bool().ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "{} には #true または #false を指定してください: {}",
                node.name().value(),
                entry.value()
            ))
        }),
    }
}

/// 最初の引数（名前なしエントリ）を文字列として取得
fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn property(node: &KdlNode, key: &str) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().map(|n| n.value()) == Some(key))
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // imagepin.kdl の記述例と同一
    const SAMPLE_MANIFEST: &str = r#"
image "spatialdata" registry="ghcr.io" namespace="scverse"
build {
    context "."
    dockerfile "./Dockerfile"
}
package "spatialdata" build-arg="SPATIALDATA_VERSION"
package "spatialdata-io" build-arg="SPATIALDATA_IO_VERSION"
package "spatialdata-plot" build-arg="SPATIALDATA_PLOT_VERSION"
index "pypi" url="https://pypi.org"
github-api "https://api.github.com"
allow-missing-package #false
"#;

    #[test]
    fn test_parse_manifest_full() {
        let manifest = parse_manifest(SAMPLE_MANIFEST).unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_parse_manifest_empty_uses_defaults() {
        let manifest = parse_manifest("").unwrap();
        assert_eq!(manifest, Manifest::default());
    }

    #[test]
    fn test_parse_manifest_custom_packages() {
        let kdl = r#"
image "napari" registry="localhost:5000" namespace="lab"
package "napari"
package "napari-spatialdata" build-arg="NSD"
index "pip"
allow-missing-package #true
"#;
        let manifest = parse_manifest(kdl).unwrap();
        assert_eq!(manifest.image.repository(), "localhost:5000/lab/napari");
        assert_eq!(manifest.packages.len(), 2);
        assert_eq!(manifest.packages[0].build_arg, "NAPARI_VERSION");
        assert_eq!(manifest.packages[1].build_arg, "NSD");
        assert_eq!(manifest.index.backend, IndexBackend::Pip);
        assert!(manifest.allow_missing_package);
    }

    #[test]
    fn test_parse_manifest_build_section() {
        let kdl = r#"
build {
    context "docker"
    dockerfile "docker/Dockerfile.gpu"
}
"#;
        let manifest = parse_manifest(kdl).unwrap();
        assert_eq!(manifest.build.context, PathBuf::from("docker"));
        assert_eq!(
            manifest.build.dockerfile,
            PathBuf::from("docker/Dockerfile.gpu")
        );
    }

    #[test]
    fn test_parse_manifest_package_without_name() {
        let kdl = r#"package build-arg="X""#;
        let err = parse_manifest(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }

    #[test]
    fn test_parse_manifest_duplicate_package() {
        let kdl = r#"
package "spatialdata"
package "spatialdata"
"#;
        let err = parse_manifest(kdl).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePackage(_)));
    }

    #[test]
    fn test_parse_manifest_unknown_index() {
        let err = parse_manifest(r#"index "conda""#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownIndex(_)));
    }

    #[test]
    fn test_parse_manifest_invalid_kdl() {
        let err = parse_manifest("image {").unwrap_err();
        assert!(matches!(err, ConfigError::KdlParse(_)));
    }

    #[test]
    fn test_allow_missing_package_values() {
        let manifest = parse_manifest("allow-missing-package").unwrap();
        assert!(manifest.allow_missing_package);

        let manifest = parse_manifest("allow-missing-package #true").unwrap();
        assert!(manifest.allow_missing_package);

        let manifest = parse_manifest("allow-missing-package #false").unwrap();
        assert!(!manifest.allow_missing_package);
    }

    #[test]
    fn test_allow_missing_package_rejects_non_bool() {
        for kdl in [
            r#"allow-missing-package "false""#,
            r#"allow-missing-package "true""#,
            "allow-missing-package 0",
            "allow-missing-package #null",
        ] {
            let err = parse_manifest(kdl).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidConfig(_)),
                "{} should be rejected",
                kdl
            );
        }
    }

    #[test]
    fn test_allow_missing_package_v1_bool_is_parse_error() {
        let err = parse_manifest("allow-missing-package false").unwrap_err();
        assert!(matches!(err, ConfigError::KdlParse(_)));
    }

    #[test]
    fn test_parse_manifest_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("imagepin.kdl");
        std::fs::write(&path, r#"image "other""#).unwrap();

        let manifest = parse_manifest_file(&path).unwrap();
        assert_eq!(manifest.image.name, "other");
        assert_eq!(manifest.image.registry, "ghcr.io");
    }
}
