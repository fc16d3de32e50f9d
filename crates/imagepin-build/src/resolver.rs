use crate::error::{BuildError, BuildResult};
use crate::index::PackageIndex;
use crate::tag::ResolvedVersions;
use imagepin_config::PackageSpec;

/// 各パッケージの最新バージョンを解決する
pub struct VersionResolver<I> {
    index: I,
}

impl<I: PackageIndex> VersionResolver<I> {
    pub fn new(index: I) -> Self {
        Self { index }
    }

    /// パッケージを順に問い合わせ、一覧の先頭を最新として採用
    ///
    /// 最初に失敗したパッケージで中断する。
    pub async fn resolve(&self, packages: &[PackageSpec]) -> BuildResult<ResolvedVersions> {
        let mut resolved = ResolvedVersions::new();

        for package in packages {
            let version = self.latest(&package.name).await?;
            tracing::info!(
                package = %package.name,
                version = %version,
                index = self.index.name(),
                "Resolved latest version"
            );
            resolved.push(package, &version);
        }

        Ok(resolved)
    }

    /// 単一パッケージの最新バージョン
    pub async fn latest(&self, package: &str) -> BuildResult<String> {
        let versions = self.index.versions(package).await?;
        versions
            .into_iter()
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .ok_or_else(|| BuildError::VersionNotFound(package.to_string()))
    }
}
