//! 价格预测模型命令行
//!
//! ```text
//! market_prediction train --data market_data.csv --out models/market.bin
//! market_prediction predict --model models/market.bin --data market_data.csv
//! ```

use clap::{Parser, Subcommand};
use ml::data::DataLoader;
use ml::pipelines::train_and_save;
use ml::{MarketPredictionModel, PipelineConfig, PipelineModel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "market_prediction", about = "LSTM 收盘价预测")]
struct Cli {
    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 训练并保存模型
    Train {
        #[arg(long)]
        data: String,
        #[arg(long)]
        out: String,
    },
    /// 用 CSV 最后一个窗口预测下一个收盘价
    Predict {
        #[arg(long)]
        model: String,
        #[arg(long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ml::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Train { data, out } => {
            let config = PipelineConfig::load_or_default(cli.config.as_deref())?;
            println!("=== 价格预测模型训练 ===\n");
            let mut model = MarketPredictionModel::new(config.market);
            let report = train_and_save(&mut model, &data, &out).await?;
            println!("{report}");
            if let Some(m) = model.metrics() {
                println!(
                    "测试集 (价格): RMSE {:.4}, MAE {:.4}, R² {:.4}, 方向准确率 {:.2}%",
                    m.rmse,
                    m.mae,
                    m.r2_score,
                    m.direction_accuracy * 100.0
                );
            }
            println!("\n模型已保存到 {out}");
        }
        Command::Predict { model, data } => {
            let model = MarketPredictionModel::load(&model).await?;
            let records = DataLoader::load_market_csv(&data)?;
            let price = model.predict_latest(&records)?;
            println!("预测下一个收盘价: {price:.4}");
        }
    }

    Ok(())
}
