//! 买卖信号模型命令行
//!
//! ```text
//! trade_signal train --data market_data.csv --out models/signal.bin
//! trade_signal predict --model models/signal.bin --data market_data.csv
//! ```

use clap::{Parser, Subcommand};
use ml::data::DataLoader;
use ml::pipelines::train_and_save;
use ml::{PipelineConfig, PipelineModel, TradeSignalModel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trade_signal", about = "LSTM 买卖信号分类")]
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
    /// 对 CSV 最后一个窗口给出信号
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
            println!("=== 买卖信号模型训练 ===\n");
            let mut model = TradeSignalModel::new(config.signal);
            let report = train_and_save(&mut model, &data, &out).await?;
            println!("{report}");
            if let Some(m) = model.metrics() {
                println!(
                    "测试集: 准确率 {:.4}, 精确率 {:.4}, 召回率 {:.4}, F1 {:.4}",
                    m.accuracy, m.precision, m.recall, m.f1
                );
            }
            println!("\n模型已保存到 {out}");
        }
        Command::Predict { model, data } => {
            let model = TradeSignalModel::load(&model).await?;
            let records = DataLoader::load_market_csv(&data)?;
            let (signal, p) = model.signal_latest(&records)?;
            println!("信号: {signal} (买入概率 {p:.4})");
        }
    }

    Ok(())
}
