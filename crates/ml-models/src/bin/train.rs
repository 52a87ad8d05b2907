//! 批量训练：情感模型和价格预测模型
//!
//! 从 `<data-dir>/sentiment_data.csv` 和 `<data-dir>/market_data.csv` 训练，
//! 保存到 `<models-dir>/sentiment_model.bin` 和
//! `<models-dir>/market_prediction_model.bin`。

use clap::Parser;
use ml::pipelines::train_and_save;
use ml::{MarketPredictionModel, PipelineConfig, SentimentAnalysisModel};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "train", about = "训练全部模型")]
struct Cli {
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    #[arg(long, default_value = "models")]
    models_dir: PathBuf,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

fn path_str(dir: &Path, file: &str) -> String {
    dir.join(file).to_string_lossy().into_owned()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ml::init_tracing();
    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    println!("=== 训练情感分析模型 ===\n");
    let mut sentiment = SentimentAnalysisModel::new(config.sentiment);
    let report = train_and_save(
        &mut sentiment,
        &path_str(&cli.data_dir, "sentiment_data.csv"),
        &path_str(&cli.models_dir, "sentiment_model.bin"),
    )
    .await?;
    println!("{report}\n");

    println!("=== 训练价格预测模型 ===\n");
    let mut market = MarketPredictionModel::new(config.market);
    let report = train_and_save(
        &mut market,
        &path_str(&cli.data_dir, "market_data.csv"),
        &path_str(&cli.models_dir, "market_prediction_model.bin"),
    )
    .await?;
    println!("{report}\n");

    println!("模型已保存到 {}", cli.models_dir.display());
    Ok(())
}
