//! パッケージインデックスへの問い合わせ
//!
//! どの実装も「新しい順」のバージョン一覧を返す。先頭が最新として扱われる。

use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// パッケージのバージョン一覧を返すインデックス
#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// インデックス名（ログ表示用）
    fn name(&self) -> &str;

    /// 利用可能なバージョンを新しい順に返す
    async fn versions(&self, package: &str) -> BuildResult<Vec<String>>;
}

#[async_trait]
impl<T: PackageIndex + ?Sized> PackageIndex for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn versions(&self, package: &str) -> BuildResult<Vec<String>> {
        (**self).versions(package).await
    }
}

/// PyPI JSON API (`/pypi/<name>/json`)
pub struct PypiJsonIndex {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
    #[serde(default)]
    releases: BTreeMap<String, Vec<ReleaseFile>>,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    #[serde(default)]
    yanked: bool,
    /// `2024-05-01T12:00:00.000000Z` 形式。同じ形式同士なら文字列比較で時刻順になる
    #[serde(default)]
    upload_time_iso_8601: Option<String>,
}

impl PypiJsonIndex {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn project_url(&self, package: &str) -> String {
        format!("{}/pypi/{}/json", self.base_url, package)
    }
}

#[async_trait]
impl PackageIndex for PypiJsonIndex {
    fn name(&self) -> &str {
        "pypi"
    }

    async fn versions(&self, package: &str) -> BuildResult<Vec<String>> {
        let url = self.project_url(package);
        tracing::debug!("GET {}", url);

        let query_error = |message: String| BuildError::IndexQuery {
            package: package.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .header("User-Agent", concat!("imagepin/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .map_err(|e| query_error(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BuildError::VersionNotFound(package.to_string()));
        }
        if !response.status().is_success() {
            return Err(query_error(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| query_error(e.to_string()))?;
        parse_project_response(&body).map_err(query_error)
    }
}

/// PyPI JSON レスポンスからバージョン一覧を取り出す
///
/// `info.version`（最新の安定版）を先頭にし、残りは yank されていない
/// ファイルを持つリリースを最終アップロード時刻の新しい順に並べる。
/// バージョン文字列の辞書順は `0.10.0` と `0.9.0` を逆転させるため使わない。
fn parse_project_response(body: &str) -> Result<Vec<String>, String> {
    let project: ProjectResponse =
        serde_json::from_str(body).map_err(|e| format!("Malformed index response: {}", e))?;

    let latest = project.info.version;
    let mut versions = Vec::new();
    if !latest.is_empty() {
        versions.push(latest.clone());
    }

    let mut releases: Vec<(String, Option<String>)> = project
        .releases
        .into_iter()
        .rev()
        .filter(|(version, _)| *version != latest)
        .filter_map(|(version, files)| {
            let live: Vec<ReleaseFile> = files.into_iter().filter(|f| !f.yanked).collect();
            if live.is_empty() {
                return None;
            }
            let uploaded = live
                .into_iter()
                .filter_map(|f| f.upload_time_iso_8601)
                .max();
            Some((version, uploaded))
        })
        .collect();

    // 時刻の無いリリースは末尾。安定ソートなので同着は元の順を保つ
    releases.sort_by(|a, b| b.1.cmp(&a.1));
    versions.extend(releases.into_iter().map(|(version, _)| version));

    Ok(versions)
}

/// `pip index versions <name>` を実行するインデックス
pub struct PipIndex {
    program: String,
    index_url: Option<String>,
}

impl Default for PipIndex {
    fn default() -> Self {
        Self::new("pip")
    }
}

impl PipIndex {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            index_url: None,
        }
    }

    /// `--index-url` を付けて問い合わせる
    pub fn with_index_url(mut self, url: &str) -> Self {
        self.index_url = Some(url.to_string());
        self
    }
}

#[async_trait]
impl PackageIndex for PipIndex {
    fn name(&self) -> &str {
        "pip"
    }

    async fn versions(&self, package: &str) -> BuildResult<Vec<String>> {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("index").arg("versions").arg(package);
        if let Some(url) = &self.index_url {
            cmd.arg("--index-url").arg(url);
        }
        tracing::debug!("Executing command: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| BuildError::IndexQuery {
            package: package.to_string(),
            message: format!("Failed to run {}: {}", self.program, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No matching distribution") {
                return Err(BuildError::VersionNotFound(package.to_string()));
            }
            return Err(BuildError::IndexQuery {
                package: package.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        Ok(parse_pip_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// `Available versions: 0.2.5, 0.2.4` の行をパース
fn parse_pip_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("Available versions:"))
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
