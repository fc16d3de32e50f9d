//! レジストリ認証処理
//!
//! CI が渡すアクター名とトークンを優先し、無ければ Docker config.json
//! (auths / credential helper) から認証情報を取得します。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// ユーザー名の環境変数（優先順）
const USER_ENV_VARS: [&str; 2] = ["IMAGEPIN_REGISTRY_USER", "GITHUB_ACTOR"];

/// トークンの環境変数（優先順）
const TOKEN_ENV_VARS: [&str; 2] = ["IMAGEPIN_REGISTRY_TOKEN", "GITHUB_TOKEN"];

/// レジストリへのログインに使う認証情報
#[derive(Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub token: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("token", &"***")
            .finish()
    }
}

impl RegistryCredentials {
    pub fn new(username: &str, token: &str) -> Self {
        Self {
            username: username.to_string(),
            token: token.to_string(),
        }
    }

    /// 環境変数から取得（ユーザー名とトークンが両方揃った場合のみ）
    pub fn from_env() -> Option<Self> {
        let username = first_env(&USER_ENV_VARS)?;
        let token = first_env(&TOKEN_ENV_VARS)?;
        Some(Self { username, token })
    }

    /// API 呼び出し用にトークンだけを取得
    pub fn token_from_env() -> Option<String> {
        first_env(&TOKEN_ENV_VARS)
    }

    pub fn to_docker(&self, registry: &str) -> DockerCredentials {
        DockerCredentials {
            username: Some(self.username.clone()),
            password: Some(self.token.clone()),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    /// 認証情報 (レジストリ -> AuthEntry)
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// レジストリ認証を管理
#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
    explicit: Option<RegistryCredentials>,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// 環境変数の認証情報と ~/.docker/config.json を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self {
            config_path,
            explicit: RegistryCredentials::from_env(),
        }
    }

    /// 指定したパスの config.json を使用
    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self {
            config_path,
            explicit: None,
        }
    }

    /// 明示的な認証情報を設定（config.json より優先）
    pub fn with_credentials(mut self, credentials: RegistryCredentials) -> Self {
        self.explicit = Some(credentials);
        self
    }

    /// 公開時に必須の認証情報を取得
    ///
    /// 見つからなければ AuthFailed
    pub fn require_credentials(&self, image: &str) -> BuildResult<DockerCredentials> {
        let registry = extract_registry(image);
        self.get_credentials(image)?
            .ok_or_else(|| BuildError::AuthFailed {
                registry,
                message: "No credentials available".to_string(),
            })
    }

    /// イメージ名からレジストリの認証情報を取得
    ///
    /// # Returns
    /// * `Ok(Some(credentials))` - 認証情報が見つかった場合
    /// * `Ok(None)` - 認証情報が見つからない場合
    /// * `Err(e)` - config.json の読み込みに失敗した場合
    pub fn get_credentials(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = extract_registry(image);

        if let Some(creds) = &self.explicit {
            tracing::debug!("Using explicit credentials for {}", registry);
            return Ok(Some(creds.to_docker(&registry)));
        }

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        if let Some(auth_entry) = config.auths.get(&registry)
            && let Some(auth_b64) = &auth_entry.auth
            && let Some(creds) = decode_auth(auth_b64, &registry)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(creds));
        }

        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            if let Ok(Some(creds)) = get_from_helper(helper, &registry) {
                return Ok(Some(creds));
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }
}

/// イメージ名からレジストリを抽出
///
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':') || first == "localhost")
    {
        return first.to_string();
    }

    "docker.io".to_string()
}

fn decode_auth(auth_b64: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth_b64)
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to decode auth: {}", e),
        })?;

    let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
        registry: registry.to_string(),
        message: format!("Invalid UTF-8 in auth: {}", e),
    })?;

    Ok(auth_str
        .split_once(':')
        .map(|(username, password)| RegistryCredentials::new(username, password).to_docker(registry)))
}

/// credential helper から認証情報を取得
fn get_from_helper(helper: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let helper_cmd = format!("docker-credential-{}", helper);

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to run {}: {}", helper_cmd, e),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Credential helper failed: {}", e),
        })?;

    if !output.status.success() {
        tracing::debug!(
            "Credential helper returned error for {}: {}",
            registry,
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(None);
    }

    let response: CredentialResponse =
        serde_json::from_slice(&output.stdout).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Failed to parse credential helper response: {}", e),
        })?;

    Ok(Some(
        RegistryCredentials::new(&response.username, &response.secret).to_docker(registry),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extract_registry() {
        assert_eq!(extract_registry("ghcr.io/scverse/spatialdata:tag"), "ghcr.io");
        assert_eq!(extract_registry("localhost:5000/app"), "localhost:5000");
        assert_eq!(extract_registry("myuser/app:latest"), "docker.io");
        assert_eq!(extract_registry("nginx"), "docker.io");
    }

    #[test]
    fn test_credentials_from_github_env() {
        temp_env::with_vars(
            [
                ("IMAGEPIN_REGISTRY_USER", None),
                ("IMAGEPIN_REGISTRY_TOKEN", None),
                ("GITHUB_ACTOR", Some("octocat")),
                ("GITHUB_TOKEN", Some("ghs_secret")),
            ],
            || {
                let creds = RegistryCredentials::from_env().unwrap();
                assert_eq!(creds.username, "octocat");
                assert_eq!(creds.token, "ghs_secret");
            },
        );
    }

    #[test]
    fn test_credentials_prefer_imagepin_env() {
        temp_env::with_vars(
            [
                ("IMAGEPIN_REGISTRY_USER", Some("bot")),
                ("IMAGEPIN_REGISTRY_TOKEN", Some("pat")),
                ("GITHUB_ACTOR", Some("octocat")),
                ("GITHUB_TOKEN", Some("ghs_secret")),
            ],
            || {
                let creds = RegistryCredentials::from_env().unwrap();
                assert_eq!(creds.username, "bot");
                assert_eq!(creds.token, "pat");
            },
        );
    }

    #[test]
    fn test_credentials_require_both_values() {
        temp_env::with_vars(
            [
                ("IMAGEPIN_REGISTRY_USER", None),
                ("IMAGEPIN_REGISTRY_TOKEN", None),
                ("GITHUB_ACTOR", Some("octocat")),
                ("GITHUB_TOKEN", None::<&str>),
            ],
            || {
                assert!(RegistryCredentials::from_env().is_none());
            },
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let creds = RegistryCredentials::new("octocat", "ghs_secret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("ghs_secret"));
    }

    #[test]
    fn test_get_credentials_from_config_auths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        let auth = base64::engine::general_purpose::STANDARD.encode("user:pass");
        fs::write(
            &config_path,
            format!(r#"{{"auths": {{"ghcr.io": {{"auth": "{}"}}}}}}"#, auth),
        )
        .unwrap();

        let registry_auth = RegistryAuth::with_config_path(config_path);
        let creds = registry_auth
            .get_credentials("ghcr.io/scverse/spatialdata:tag")
            .unwrap()
            .unwrap();
        assert_eq!(creds.username.as_deref(), Some("user"));
        assert_eq!(creds.password.as_deref(), Some("pass"));
        assert_eq!(creds.serveraddress.as_deref(), Some("ghcr.io"));
    }

    #[test]
    fn test_explicit_credentials_take_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry_auth = RegistryAuth::with_config_path(temp_dir.path().join("missing.json"))
            .with_credentials(RegistryCredentials::new("octocat", "token"));

        let creds = registry_auth
            .require_credentials("ghcr.io/scverse/spatialdata:tag")
            .unwrap();
        assert_eq!(creds.username.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_require_credentials_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry_auth = RegistryAuth::with_config_path(temp_dir.path().join("missing.json"));

        let err = registry_auth
            .require_credentials("ghcr.io/scverse/spatialdata:tag")
            .unwrap_err();
        assert!(matches!(err, BuildError::AuthFailed { registry, .. } if registry == "ghcr.io"));
    }
}
