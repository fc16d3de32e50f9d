//! マニフェストのデータモデル

use crate::error::{ConfigError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// 公開先イメージ・ビルド設定・追跡パッケージをまとめたマニフェスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// 公開先イメージ
    pub image: ImageTarget,

    /// ビルドコンテキストと Dockerfile
    pub build: BuildSettings,

    /// バージョンを追跡するパッケージ（タグ内の並び順）
    pub packages: Vec<PackageSpec>,

    /// パッケージインデックス
    pub index: IndexSettings,

    /// GitHub REST API のベースURL
    pub github_api: String,

    /// レジストリ側にパッケージがまだ存在しない (404) 場合に空として扱う
    pub allow_missing_package: bool,
}

/// `<registry>/<namespace>/<name>` で表される公開先
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageTarget {
    pub registry: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSettings {
    pub context: PathBuf,
    pub dockerfile: PathBuf,
}

/// 追跡するパッケージと、そのバージョンを渡すビルド引数名
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSpec {
    pub name: String,
    pub build_arg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// PyPI JSON API (`/pypi/<name>/json`)
    Pypi,
    /// `pip index versions <name>`
    Pip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub url: String,
}

/// CLI から上書きできる項目
#[derive(Debug, Clone, Default)]
pub struct ManifestOverrides {
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub context: Option<PathBuf>,
    pub dockerfile: Option<PathBuf>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            image: ImageTarget::default(),
            build: BuildSettings::default(),
            packages: vec![
                PackageSpec::new("spatialdata"),
                PackageSpec::new("spatialdata-io"),
                PackageSpec::new("spatialdata-plot"),
            ],
            index: IndexSettings::default(),
            github_api: "https://api.github.com".to_string(),
            allow_missing_package: false,
        }
    }
}

impl Default for ImageTarget {
    fn default() -> Self {
        Self {
            registry: "ghcr.io".to_string(),
            namespace: "scverse".to_string(),
            name: "spatialdata".to_string(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            dockerfile: PathBuf::from("./Dockerfile"),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Pypi,
            url: "https://pypi.org".to_string(),
        }
    }
}

impl IndexBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "pypi" => Ok(IndexBackend::Pypi),
            "pip" => Ok(IndexBackend::Pip),
            other => Err(ConfigError::UnknownIndex(other.to_string())),
        }
    }
}

impl ImageTarget {
    /// タグなしのリポジトリ名（例: `ghcr.io/scverse/spatialdata`）
    pub fn repository(&self) -> String {
        format!("{}/{}/{}", self.registry, self.namespace, self.name)
    }

    /// タグ付きの完全なイメージ参照
    pub fn reference(&self, tag: &str) -> String {
        format!("{}:{}", self.repository(), tag)
    }
}

impl PackageSpec {
    /// パッケージ名からビルド引数名を導出して作成
    ///
    /// `spatialdata-io` -> `SPATIALDATA_IO_VERSION`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            build_arg: default_build_arg(name),
        }
    }

    pub fn with_build_arg(name: &str, build_arg: &str) -> Self {
        Self {
            name: name.to_string(),
            build_arg: build_arg.to_string(),
        }
    }
}

fn default_build_arg(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_VERSION", stem)
}

impl Manifest {
    /// CLI の指定でマニフェストの値を上書き
    pub fn apply(&mut self, overrides: &ManifestOverrides) {
        if let Some(registry) = &overrides.registry {
            self.image.registry = registry.clone();
        }
        if let Some(namespace) = &overrides.namespace {
            self.image.namespace = namespace.clone();
        }
        if let Some(image) = &overrides.image {
            self.image.name = image.clone();
        }
        if let Some(context) = &overrides.context {
            self.build.context = context.clone();
        }
        if let Some(dockerfile) = &overrides.dockerfile {
            self.build.dockerfile = dockerfile.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("image", &self.image.name),
            ("registry", &self.image.registry),
            ("namespace", &self.image.namespace),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "{} が空です",
                    field
                )));
            }
        }

        if self.packages.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "package を1つ以上指定してください".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.name.as_str()) {
                return Err(ConfigError::DuplicatePackage(package.name.clone()));
            }
            if package.build_arg.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!(
                    "package '{}' の build-arg が空です",
                    package.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_targets_spatialdata() {
        let manifest = Manifest::default();
        assert_eq!(manifest.image.repository(), "ghcr.io/scverse/spatialdata");
        let names: Vec<&str> = manifest.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["spatialdata", "spatialdata-io", "spatialdata-plot"]
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_default_build_args() {
        assert_eq!(
            PackageSpec::new("spatialdata").build_arg,
            "SPATIALDATA_VERSION"
        );
        assert_eq!(
            PackageSpec::new("spatialdata-io").build_arg,
            "SPATIALDATA_IO_VERSION"
        );
        assert_eq!(
            PackageSpec::new("spatialdata-plot").build_arg,
            "SPATIALDATA_PLOT_VERSION"
        );
    }

    #[test]
    fn test_image_reference() {
        let target = ImageTarget::default();
        assert_eq!(
            target.reference("abc"),
            "ghcr.io/scverse/spatialdata:abc"
        );
    }

    #[test]
    fn test_apply_overrides() {
        let mut manifest = Manifest::default();
        manifest.apply(&ManifestOverrides {
            registry: Some("localhost:5000".to_string()),
            image: Some("sd".to_string()),
            dockerfile: Some(PathBuf::from("docker/Dockerfile")),
            ..Default::default()
        });

        assert_eq!(manifest.image.repository(), "localhost:5000/scverse/sd");
        assert_eq!(manifest.build.dockerfile, PathBuf::from("docker/Dockerfile"));
        assert_eq!(manifest.build.context, PathBuf::from("."));
    }

    #[test]
    fn test_validate_duplicate_package() {
        let mut manifest = Manifest::default();
        manifest.packages.push(PackageSpec::new("spatialdata"));
        let err = manifest.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePackage(name) if name == "spatialdata"));
    }

    #[test]
    fn test_validate_empty_packages() {
        let mut manifest = Manifest::default();
        manifest.packages.clear();
        assert!(matches!(
            manifest.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_index_backend_parse() {
        assert_eq!(IndexBackend::parse("pypi").unwrap(), IndexBackend::Pypi);
        assert_eq!(IndexBackend::parse("pip").unwrap(), IndexBackend::Pip);
        assert!(matches!(
            IndexBackend::parse("conda"),
            Err(ConfigError::UnknownIndex(_))
        ));
    }
}
