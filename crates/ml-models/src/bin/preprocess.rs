//! 记录预处理命令行：转换 price/volume，填补缺失值，计算滚动均值

use clap::Parser;
use ml::data::DataLoader;
use ml::preprocessing::RecordPreprocessor;
use ml::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "preprocess", about = "清洗 price/volume 记录")]
struct Cli {
    /// JSON 数组或带 price, volume 列的 CSV
    #[arg(long)]
    input: PathBuf,

    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ml::init_tracing();
    let cli = Cli::parse();

    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;
    let records = DataLoader::load_raw_records(&cli.input)?;
    let table = RecordPreprocessor::new(config.preprocess)?.process(&records)?;

    print!("{table}");
    if table.imputed_prices + table.imputed_volumes > 0 {
        println!(
            "\n填补缺失值: price {} 个, volume {} 个",
            table.imputed_prices, table.imputed_volumes
        );
    }

    Ok(())
}
