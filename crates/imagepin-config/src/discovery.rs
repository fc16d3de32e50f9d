//! マニフェスト発見ロジック
//!
//! 環境変数 → カレントディレクトリから上方向探索の順で imagepin.kdl を探す。
//! マニフェストは必須ではないため、見つからなければ既定値で動作する。

use crate::error::Result;
use crate::model::Manifest;
use crate::parser::parse_manifest_file;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// マニフェストのファイル名
pub const MANIFEST_FILENAME: &str = "imagepin.kdl";

/// マニフェストのパスを直接指定する環境変数
pub const MANIFEST_PATH_ENV: &str = "IMAGEPIN_CONFIG_PATH";

/// 読み込んだマニフェストと、相対パスの基準になるディレクトリ
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    /// 読み込んだファイル（既定値を使った場合は None）
    pub source: Option<PathBuf>,
    /// ビルドコンテキスト等の相対パスの基準
    pub project_root: PathBuf,
}

/// imagepin.kdl を発見する
///
/// 検索順序:
/// 1. IMAGEPIN_CONFIG_PATH 環境変数
/// 2. カレントディレクトリから上方向探索
#[tracing::instrument]
pub fn find_manifest() -> Option<PathBuf> {
    if let Ok(path_str) = std::env::var(MANIFEST_PATH_ENV) {
        let path = PathBuf::from(&path_str);
        debug!(env_path = %path_str, "Checking {}", MANIFEST_PATH_ENV);
        if path.exists() {
            info!(manifest_path = %path.display(), "Found manifest from environment variable");
            return Some(path);
        }
        warn!(env_path = %path_str, "{} is set but file does not exist", MANIFEST_PATH_ENV);
    }

    let start_dir = std::env::current_dir().ok()?;
    find_manifest_from(&start_dir)
}

/// 指定ディレクトリから上方向に imagepin.kdl を探す
pub fn find_manifest_from(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    debug!(start_dir = %start_dir.display(), "Searching for {}", MANIFEST_FILENAME);

    loop {
        let manifest_file = current.join(MANIFEST_FILENAME);
        if manifest_file.exists() {
            info!(manifest_path = %manifest_file.display(), "Found manifest file");
            return Some(manifest_file);
        }

        if !current.pop() {
            break;
        }
    }

    debug!("Manifest file not found, using defaults");
    None
}

/// マニフェストを発見して読み込む
pub fn load_manifest() -> Result<LoadedManifest> {
    let cwd = std::env::current_dir()?;
    load_manifest_at(find_manifest(), &cwd)
}

/// 指定パス（または既定値）からマニフェストを読み込む
pub fn load_manifest_at(path: Option<PathBuf>, fallback_root: &Path) -> Result<LoadedManifest> {
    match path {
        Some(path) => {
            let manifest = parse_manifest_file(&path)?;
            let project_root = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| fallback_root.to_path_buf());
            Ok(LoadedManifest {
                manifest,
                source: Some(path),
                project_root,
            })
        }
        None => Ok(LoadedManifest {
            manifest: Manifest::default(),
            source: None,
            project_root: fallback_root.to_path_buf(),
        }),
    }
}
