//! # Market ML Models
//!
//! 这个 crate 提供行情价格预测、文本情感分类和买卖信号三个循环神经网络模型，
//! 包括数据加载、预处理、训练、评估和模型持久化。
//!
//! ## 主要模块
//!
//! - `data`: CSV / JSON 数据加载
//! - `preprocessing`: 记录清洗和特征缩放
//! - `text`: 分词编码和词典极性
//! - `timeseries`: 时间序列窗口和数据集划分
//! - `models`: 网络结构、层和损失函数（基于 tch）
//! - `trainer`: 小批量训练
//! - `pipelines`: 三个模型的训练、推理和保存
//! - `evaluation`: 模型评估指标

pub mod config;
pub mod data;
pub mod evaluation;
pub mod models;
pub mod pipelines;
pub mod preprocessing;
pub mod text;
pub mod timeseries;
pub mod trainer;
pub mod types;

pub use config::PipelineConfig;
pub use pipelines::{
    InputScaling, MarketPredictionModel, PipelineModel, SentimentAnalysisModel, TradeSignalModel,
};
pub use types::{MLError, MLResult, SentimentLabel, TradeSignal, TrainingReport};

use tracing_subscriber::EnvFilter;

/// 初始化日志，未设置 `RUST_LOG` 时默认 info 级别
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
