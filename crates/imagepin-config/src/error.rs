//! マニフェストのエラー型

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("KDL パースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("不正なマニフェスト: {0}")]
    InvalidConfig(String),

    #[error("パッケージ '{0}' が重複しています")]
    DuplicatePackage(String),

    #[error("未対応のインデックス: {0} (pypi または pip を指定してください)")]
    UnknownIndex(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
