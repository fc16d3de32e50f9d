//! 1回の実行: RESOLVING → CHECKING → {SKIP | PUBLISHING}

use crate::builder::BuildFlags;
use crate::error::{BuildError, BuildResult};
use crate::index::PackageIndex;
use crate::publisher::{ImagePublisher, PublishRequest};
use crate::registry::{TagChecker, TagLister};
use crate::resolver::VersionResolver;
use crate::tag::BuildDecision;
use imagepin_config::PackageSpec;
use std::fmt;
use std::path::PathBuf;

/// 実行の段階。いずれの分岐も終端で、再突入はない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Resolving,
    Checking,
    Skip,
    Publishing,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Resolving => "RESOLVING",
            RunPhase::Checking => "CHECKING",
            RunPhase::Skip => "SKIP",
            RunPhase::Publishing => "PUBLISHING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub context_dir: PathBuf,
    pub dockerfile: PathBuf,
    pub flags: BuildFlags,
    /// 判定まで行い、公開はしない
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// 同じ合成タグが既に公開済み
    Skipped(BuildDecision),
    /// 未公開だが dry-run のため公開しなかった
    DryRun(BuildDecision),
    Published {
        decision: BuildDecision,
        image: String,
    },
}

impl RunOutcome {
    pub fn decision(&self) -> &BuildDecision {
        match self {
            RunOutcome::Skipped(decision) | RunOutcome::DryRun(decision) => decision,
            RunOutcome::Published { decision, .. } => decision,
        }
    }
}

pub struct Pipeline<I, L, P> {
    resolver: VersionResolver<I>,
    checker: TagChecker<L>,
    publisher: P,
    packages: Vec<PackageSpec>,
}

impl<I, L, P> Pipeline<I, L, P>
where
    I: PackageIndex,
    L: TagLister,
    P: ImagePublisher,
{
    pub fn new(
        resolver: VersionResolver<I>,
        checker: TagChecker<L>,
        publisher: P,
        packages: Vec<PackageSpec>,
    ) -> Self {
        Self {
            resolver,
            checker,
            publisher,
            packages,
        }
    }

    /// バージョン解決とタグ確認のみ行う
    pub async fn decide(&self) -> BuildResult<BuildDecision> {
        enter(RunPhase::Resolving);
        let versions = self.resolver.resolve(&self.packages).await?;

        enter(RunPhase::Checking);
        self.checker.check(versions).await
    }

    /// 実行全体。どの段階の失敗もそのまま返す
    pub async fn run(&self, options: &RunOptions) -> BuildResult<RunOutcome> {
        let decision = self.decide().await?;
        self.run_with(decision, options).await
    }

    /// `decide` 済みの判定から SKIP / PUBLISHING を進める
    pub async fn run_with(
        &self,
        decision: BuildDecision,
        options: &RunOptions,
    ) -> BuildResult<RunOutcome> {
        if decision.already_published {
            enter(RunPhase::Skip);
            tracing::info!("Tag {} already published, skipping", decision.composite_tag);
            return Ok(RunOutcome::Skipped(decision));
        }

        let image_ref = decision.image_reference.clone().ok_or_else(|| {
            BuildError::InvalidConfig("image reference missing for unpublished tag".to_string())
        })?;

        if options.dry_run {
            tracing::info!("Dry run: would publish {}", image_ref);
            return Ok(RunOutcome::DryRun(decision));
        }

        enter(RunPhase::Publishing);
        let request = PublishRequest {
            image_ref,
            build_args: decision.versions.build_args(),
            context_dir: options.context_dir.clone(),
            dockerfile: options.dockerfile.clone(),
            flags: options.flags,
        };
        let image = self.publisher.publish(&request).await?;

        Ok(RunOutcome::Published { decision, image })
    }
}

fn enter(phase: RunPhase) {
    tracing::info!(phase = %phase, "Entering phase");
}
