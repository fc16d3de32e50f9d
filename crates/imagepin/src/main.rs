mod commands;
mod setup;
mod utils;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use imagepin_config::ManifestOverrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imagepin")]
#[command(
    about = "上流パッケージの最新バージョンに固定したコンテナイメージを、未公開のときだけビルドして公開する",
    long_about = None
)]
struct Cli {
    /// imagepin.kdl のパス（省略時は上方向に探索）
    #[arg(long, global = true, env = "IMAGEPIN_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// マニフェストの公開先・ビルド設定を上書きするオプション
#[derive(Args, Debug, Default, Clone)]
struct TargetArgs {
    /// レジストリホスト（例: ghcr.io）
    #[arg(long)]
    registry: Option<String>,
    /// 名前空間（GitHub の org）
    #[arg(long)]
    namespace: Option<String>,
    /// イメージ名
    #[arg(long)]
    image: Option<String>,
    /// ビルドコンテキスト
    #[arg(long)]
    context: Option<PathBuf>,
    /// Dockerfile のパス
    #[arg(long)]
    dockerfile: Option<PathBuf>,
}

impl From<TargetArgs> for ManifestOverrides {
    fn from(args: TargetArgs) -> Self {
        ManifestOverrides {
            registry: args.registry,
            namespace: args.namespace,
            image: args.image,
            context: args.context,
            dockerfile: args.dockerfile,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// バージョン解決 → タグ確認 → 未公開ならビルドしてプッシュ
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// 判定のみ行い、ビルド・プッシュはしない
        #[arg(long)]
        dry_run: bool,
        /// キャッシュを使用しない
        #[arg(long)]
        no_cache: bool,
        /// ビルド前にベースイメージを常に pull する
        #[arg(long)]
        pull: bool,
    },
    /// 最新バージョンと合成タグを表示
    Versions {
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// 合成タグが公開済みかを確認（公開はしない）
    Check {
        #[command(flatten)]
        target: TargetArgs,
        /// JSON で出力
        #[arg(long)]
        json: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!();
        eprintln!("{}", "✗ 実行に失敗しました".red().bold());
        match e.downcast_ref::<imagepin_build::BuildError>() {
            Some(build_error) => eprintln!("{}", build_error.user_message()),
            None => eprintln!("  {:#}", e),
        }
        std::process::exit(1);
    }
}

/// ログは stderr に出力（stdout は JSON 出力に使う）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Version => {
            println!("imagepin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Versions { json } => {
            let loaded = setup::load(cli.config, ManifestOverrides::default())?;
            commands::versions::handle(&loaded, json).await
        }
        Commands::Check { target, json } => {
            let loaded = setup::load(cli.config, target.into())?;
            commands::check::handle(&loaded, json).await
        }
        Commands::Run {
            target,
            dry_run,
            no_cache,
            pull,
        } => {
            let loaded = setup::load(cli.config, target.into())?;
            commands::run::handle(&loaded, dry_run, no_cache, pull).await
        }
    }
}
