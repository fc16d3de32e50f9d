use crate::{setup, utils};
use colored::Colorize;
use imagepin_build::{
    BuildFlags, ContextBuilder, DockerPublisher, Pipeline, RegistryAuth, RunOptions, RunOutcome,
    StepProgress,
};
use imagepin_config::LoadedManifest;
use std::io::IsTerminal;

/// バージョン解決 → タグ確認 → 未公開ならビルドしてプッシュ
pub async fn handle(
    loaded: &LoadedManifest,
    dry_run: bool,
    no_cache: bool,
    pull: bool,
) -> anyhow::Result<()> {
    let manifest = &loaded.manifest;

    println!("{}", "imagepin run".blue().bold());
    utils::print_manifest_source(loaded);
    if dry_run {
        println!("{}", "dry-run: ビルド・プッシュは行いません".yellow());
    }
    println!();

    let pipeline = Pipeline::new(
        setup::resolver(manifest),
        setup::checker(manifest),
        DockerPublisher::new(RegistryAuth::new()),
        manifest.packages.clone(),
    );

    let (context_dir, dockerfile) =
        ContextBuilder::resolve_paths(&loaded.project_root, &manifest.build);
    let options = RunOptions {
        context_dir,
        dockerfile,
        flags: BuildFlags { no_cache, pull },
        dry_run,
    };

    // ビルド出力と重ならないよう、判定までの間だけスピナーを出す
    let progress = if std::io::stderr().is_terminal() {
        StepProgress::new("最新バージョンと既存タグを確認中...")
    } else {
        StepProgress::hidden()
    };

    let decision = match pipeline.decide().await {
        Ok(decision) => {
            progress.finish("確認完了");
            decision
        }
        Err(e) => {
            progress.finish_error(&e.to_string());
            return Err(e.into());
        }
    };
    utils::print_versions(&decision.versions);
    utils::print_decision(&decision);
    println!();

    let outcome = pipeline.run_with(decision, &options).await?;
    utils::write_github_output(outcome.decision())?;

    match outcome {
        RunOutcome::Skipped(_) => {}
        RunOutcome::DryRun(decision) => {
            if let Some(image) = &decision.image_reference {
                println!("dry-run: {} を公開する予定です", image.cyan());
            }
        }
        RunOutcome::Published { image, .. } => {
            println!("{}", "✓ イメージを公開しました".green().bold());
            println!("  {}", image.cyan());
        }
    }

    Ok(())
}
