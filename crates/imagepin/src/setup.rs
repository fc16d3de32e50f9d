//! マニフェスト読み込みと各コンポーネントの組み立て

use imagepin_build::{
    GithubPackagesClient, PackageIndex, PipIndex, PypiJsonIndex, RegistryCredentials,
    TagChecker, VersionResolver,
};
use imagepin_config::{IndexBackend, LoadedManifest, Manifest, ManifestOverrides};
use std::path::PathBuf;

/// マニフェストを読み込み、CLI の上書きを適用する
pub fn load(config: Option<PathBuf>, overrides: ManifestOverrides) -> anyhow::Result<LoadedManifest> {
    let mut loaded = match config {
        Some(path) => {
            let cwd = std::env::current_dir()?;
            imagepin_config::load_manifest_at(Some(path), &cwd)?
        }
        None => imagepin_config::load_manifest()?,
    };

    loaded.manifest.apply(&overrides);
    loaded.manifest.validate()?;

    match &loaded.source {
        Some(path) => tracing::debug!("Loaded manifest: {}", path.display()),
        None => tracing::debug!("No imagepin.kdl found, using built-in defaults"),
    }

    Ok(loaded)
}

/// マニフェストの index 設定からパッケージインデックスを作成
pub fn package_index(manifest: &Manifest) -> Box<dyn PackageIndex> {
    match manifest.index.backend {
        IndexBackend::Pypi => Box::new(PypiJsonIndex::new(&manifest.index.url)),
        IndexBackend::Pip => {
            let index = PipIndex::default();
            // 既定の PyPI 以外が指定された場合のみ --index-url を付ける
            if manifest.index.url != "https://pypi.org" {
                Box::new(index.with_index_url(&format!(
                    "{}/simple",
                    manifest.index.url.trim_end_matches('/')
                )))
            } else {
                Box::new(index)
            }
        }
    }
}

pub fn resolver(manifest: &Manifest) -> VersionResolver<Box<dyn PackageIndex>> {
    VersionResolver::new(package_index(manifest))
}

pub fn checker(manifest: &Manifest) -> TagChecker<GithubPackagesClient> {
    let client = GithubPackagesClient::new(&manifest.github_api, RegistryCredentials::token_from_env())
        .allow_missing_package(manifest.allow_missing_package);
    TagChecker::new(client, manifest.image.clone())
}
