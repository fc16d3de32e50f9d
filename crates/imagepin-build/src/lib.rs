//! imagepin のビルドパイプライン
//!
//! 上流パッケージの最新バージョン解決、レジストリ上のタグ存在確認、
//! 未公開時のイメージビルドとプッシュを提供します。
//!
//! 1回の実行は `RESOLVING → CHECKING → {SKIP | PUBLISHING}` の順に進み、
//! どの段階の失敗もその場で実行全体を中断します。

pub mod auth;
pub mod builder;
pub mod context;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod progress;
pub mod publisher;
pub mod pusher;
pub mod registry;
pub mod resolver;
pub mod tag;

pub use auth::{RegistryAuth, RegistryCredentials};
pub use builder::{BuildFlags, ImageBuilder};
pub use context::ContextBuilder;
pub use error::{BuildError, BuildResult};
pub use index::{PackageIndex, PipIndex, PypiJsonIndex};
pub use pipeline::{Pipeline, RunOptions, RunOutcome, RunPhase};
pub use progress::StepProgress;
pub use publisher::{DockerPublisher, ImagePublisher, PublishRequest};
pub use pusher::{ImagePusher, split_image_tag};
pub use registry::{GithubPackagesClient, TagChecker, TagLister};
pub use resolver::VersionResolver;
pub use tag::{BuildDecision, ResolvedVersions, composite_tag};
