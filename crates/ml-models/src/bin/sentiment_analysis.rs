//! 情感分析命令行
//!
//! ```text
//! sentiment_analysis train --data sentiment_data.csv --out models/sentiment.bin
//! sentiment_analysis predict --model models/sentiment.bin "shares rally on earnings"
//! sentiment_analysis polarity "not a good quarter"
//! ```

use clap::{Parser, Subcommand};
use ml::pipelines::train_and_save;
use ml::text::PolarityAnalyzer;
use ml::types::SentimentLabel;
use ml::{PipelineConfig, PipelineModel, SentimentAnalysisModel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sentiment_analysis", about = "文本情感分类")]
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
    /// 用已训练模型给出正面概率
    Predict {
        #[arg(long)]
        model: String,
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// 不需要模型的词典极性 [-1, 1]
    Polarity {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ml::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Train { data, out } => {
            let config = PipelineConfig::load_or_default(cli.config.as_deref())?;
            println!("=== 情感分析模型训练 ===\n");
            let mut model = SentimentAnalysisModel::new(config.sentiment);
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
        Command::Predict { model, texts } => {
            let model = SentimentAnalysisModel::load(&model).await?;
            let probabilities = model.predict(&texts)?;
            for (text, p) in texts.iter().zip(probabilities.iter()) {
                let label = SentimentLabel::from_probability(*p).to_string();
                println!("{label:<8} {p:.4}  {text}");
            }
        }
        Command::Polarity { texts } => {
            let analyzer = PolarityAnalyzer::new();
            for text in &texts {
                println!("{:+.4}  {}", analyzer.polarity(text), text);
            }
        }
    }

    Ok(())
}
