//! レジストリ上の既存タグ取得と存在確認
//!
//! GitHub Packages の versions API から全バージョンのタグを集め、
//! 合成タグが既に公開されているかを判定します。
//! 取得に失敗した場合は「未公開」とみなさず、必ずエラーで中断します。

use crate::error::{BuildError, BuildResult};
use crate::tag::{BuildDecision, ResolvedVersions};
use async_trait::async_trait;
use imagepin_config::ImageTarget;
use serde::Deserialize;

const PER_PAGE: usize = 100;

/// イメージの既存タグ一覧を返す
#[async_trait]
pub trait TagLister: Send + Sync {
    async fn list_tags(&self, namespace: &str, image: &str) -> BuildResult<Vec<String>>;
}

#[async_trait]
impl<T: TagLister + ?Sized> TagLister for Box<T> {
    async fn list_tags(&self, namespace: &str, image: &str) -> BuildResult<Vec<String>> {
        (**self).list_tags(namespace, image).await
    }
}

/// GitHub Packages (ghcr.io) の versions API クライアント
pub struct GithubPackagesClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    allow_missing_package: bool,
}

#[derive(Debug, Deserialize)]
struct PackageVersion {
    #[serde(default)]
    metadata: Option<VersionMetadata>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadata {
    #[serde(default)]
    container: Option<ContainerMetadata>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(default)]
    tags: Vec<String>,
}

impl GithubPackagesClient {
    pub fn new(api_base: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            allow_missing_package: false,
        }
    }

    /// パッケージ未作成 (404) を空のタグ一覧として扱う
    pub fn allow_missing_package(mut self, allow: bool) -> Self {
        self.allow_missing_package = allow;
        self
    }

    fn versions_url(&self, namespace: &str, image: &str, page: usize) -> String {
        format!(
            "{}/orgs/{}/packages/container/{}/versions?per_page={}&page={}",
            self.api_base, namespace, image, PER_PAGE, page
        )
    }

    /// 1ページ分を取得。404 かつ許可されている場合は None
    async fn fetch_page(&self, url: &str) -> BuildResult<Option<Vec<PackageVersion>>> {
        tracing::debug!("GET {}", url);

        let query_error = |message: String| BuildError::RegistryQuery {
            url: url.to_string(),
            message,
        };

        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", concat!("imagepin/", env!("CARGO_PKG_VERSION")));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| query_error(e.to_string()))?;

        match classify_status(
            response.status(),
            self.allow_missing_package,
            &self.api_base,
            url,
        )? {
            PageStatus::Missing => {
                tracing::warn!("Package not found at {}, treating as no tags", url);
                Ok(None)
            }
            PageStatus::Found => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| query_error(e.to_string()))?;
                parse_versions_page(&body).map(Some).map_err(query_error)
            }
        }
    }
}

/// versions API のレスポンス状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageStatus {
    Found,
    /// パッケージ未作成 (404) を空として扱う
    Missing,
}

/// HTTP ステータスを判定する。取得失敗を「タグ無し」とはみなさない
fn classify_status(
    status: reqwest::StatusCode,
    allow_missing_package: bool,
    registry: &str,
    url: &str,
) -> BuildResult<PageStatus> {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("HTTP {} while listing package versions", status),
        });
    }
    if status == reqwest::StatusCode::NOT_FOUND && allow_missing_package {
        return Ok(PageStatus::Missing);
    }
    if !status.is_success() {
        return Err(BuildError::RegistryQuery {
            url: url.to_string(),
            message: format!("HTTP {}", status),
        });
    }
    Ok(PageStatus::Found)
}

/// 1ページ目から順に取得し、件数が PER_PAGE 未満のページで止める
async fn collect_pages<F, Fut>(mut fetch_page: F) -> BuildResult<Vec<String>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = BuildResult<Option<Vec<PackageVersion>>>>,
{
    let mut tags = Vec::new();
    let mut page = 1;

    while let Some(versions) = fetch_page(page).await? {
        let count = versions.len();
        tags.extend(flatten_tags(versions));

        if count < PER_PAGE {
            break;
        }
        page += 1;
    }

    Ok(tags)
}

#[async_trait]
impl TagLister for GithubPackagesClient {
    async fn list_tags(&self, namespace: &str, image: &str) -> BuildResult<Vec<String>> {
        let tags = collect_pages(|page| {
            let url = self.versions_url(namespace, image, page);
            async move { self.fetch_page(&url).await }
        })
        .await?;

        tracing::debug!("Fetched {} existing tags for {}/{}", tags.len(), namespace, image);
        Ok(tags)
    }
}

fn parse_versions_page(body: &str) -> Result<Vec<PackageVersion>, String> {
    serde_json::from_str(body).map_err(|e| format!("Malformed versions response: {}", e))
}

fn flatten_tags(versions: Vec<PackageVersion>) -> impl Iterator<Item = String> {
    versions
        .into_iter()
        .filter_map(|v| v.metadata)
        .filter_map(|m| m.container)
        .flat_map(|c| c.tags)
}

/// 合成タグがレジストリに存在するかを判定する
pub struct TagChecker<L> {
    lister: L,
    target: ImageTarget,
}

impl<L: TagLister> TagChecker<L> {
    pub fn new(lister: L, target: ImageTarget) -> Self {
        Self { lister, target }
    }

    pub fn lister(&self) -> &L {
        &self.lister
    }

    pub async fn check(&self, versions: ResolvedVersions) -> BuildResult<BuildDecision> {
        let existing = self
            .lister
            .list_tags(&self.target.namespace, &self.target.name)
            .await?;
        let decision = BuildDecision::evaluate(versions, &existing, &self.target);

        tracing::info!(
            tag = %decision.composite_tag,
            existing = existing.len(),
            already_published = decision.already_published,
            "Checked tag existence"
        );
        Ok(decision)
    }
}
