use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Package index query failed for '{package}': {message}")]
    IndexQuery { package: String, message: String },

    #[error("No versions found for package: {0}")]
    VersionNotFound(String),

    #[error("Registry query failed ({url}): {message}")]
    RegistryQuery { url: String, message: String },

    #[error("Authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid image tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::IndexQuery { package, message } => {
                format!(
                    "パッケージインデックスから '{}' のバージョンを取得できませんでした: {}\n\
                     \n\
                     ネットワーク接続とインデックスのURLを確認してください。",
                    package, message
                )
            }
            BuildError::VersionNotFound(package) => {
                format!(
                    "パッケージ '{}' のバージョンが見つかりません\n\
                     \n\
                     imagepin.kdl の package 名が正しいか確認してください。",
                    package
                )
            }
            BuildError::RegistryQuery { url, message } => {
                format!(
                    "既存タグの取得に失敗しました: {}\n  {}\n\
                     \n\
                     重複公開を避けるため、処理を中断しました。\n\
                     GITHUB_TOKEN に read:packages 権限があるか確認してください。",
                    message, url
                )
            }
            BuildError::AuthFailed { registry, message } => {
                format!(
                    "レジストリ {} の認証に失敗しました: {}\n\
                     \n\
                     解決方法:\n\
                     1. GITHUB_ACTOR / GITHUB_TOKEN を設定してください\n\
                     2. または docker login {} を実行してください",
                    registry, message, registry
                )
            }
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfileが見つかりません: {}\n\
                     \n\
                     imagepin.kdl の build {{ dockerfile \"...\" }} を確認してください。",
                    path.display()
                )
            }
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     imagepin.kdl の build {{ context \"...\" }} を確認してください。",
                    path.display()
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    msg
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
