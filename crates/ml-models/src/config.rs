//! 流水线配置
//!
//! 所有常量（随机种子、窗口长度、网络结构、训练轮数等）都集中在这里，
//! 并显式传给每个阶段。配置文件为 JSON，缺省字段使用默认值。

use crate::models::topology::NetworkSpec;
use crate::preprocessing::ScalerKind;
use crate::types::{MLError, MLResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 缺失值填补策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValue {
    /// 填 0
    #[default]
    Zero,
    /// 使用上一行的值，首行填 0
    ForwardFill,
}

/// 记录预处理配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// 价格滚动均值窗口
    pub ma_window: usize,
    pub missing_value: MissingValue,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            ma_window: 5,
            missing_value: MissingValue::Zero,
        }
    }
}

/// Adam 优化器参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// 训练配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// 测试集比例
    pub test_fraction: f64,
    /// 从训练集尾部划出的验证集比例
    pub validation_fraction: f64,
    /// 每个 epoch 打乱训练样本
    pub shuffle: bool,
    /// 全局梯度范数裁剪
    pub clip_norm: Option<f64>,
    /// 随机种子（权重初始化、数据划分、打乱）
    pub seed: u64,
    pub optimizer: AdamConfig,
}

impl TrainConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn validate(&self) -> MLResult<()> {
        if self.epochs == 0 {
            return Err(MLError::InvalidConfig("epochs 必须大于 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(MLError::InvalidConfig("batch_size 必须大于 0".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(MLError::InvalidConfig(format!(
                "test_fraction 超出 (0, 1): {}",
                self.test_fraction
            )));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(MLError::InvalidConfig(format!(
                "validation_fraction 超出 [0, 1): {}",
                self.validation_fraction
            )));
        }
        if self.optimizer.learning_rate <= 0.0 {
            return Err(MLError::InvalidConfig("learning_rate 必须为正".to_string()));
        }
        if matches!(self.clip_norm, Some(c) if c <= 0.0) {
            return Err(MLError::InvalidConfig("clip_norm 必须为正".to_string()));
        }
        Ok(())
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            test_fraction: 0.2,
            validation_fraction: 0.2,
            shuffle: true,
            clip_norm: Some(1.0),
            seed: 42,
            optimizer: AdamConfig::default(),
        }
    }
}

/// 价格预测模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// 输入窗口长度
    pub window: usize,
    pub scaler: ScalerKind,
    pub network: NetworkSpec,
    pub training: TrainConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            window: 60,
            scaler: ScalerKind::MinMax,
            network: NetworkSpec::market_prediction(),
            training: TrainConfig::default(),
        }
    }
}

/// 情感分类模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// 词表上限（含保留的 0 号填充位）
    pub vocab_size: usize,
    /// 填充/截断后的序列长度
    pub sequence_length: usize,
    pub network: NetworkSpec,
    pub training: TrainConfig,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            vocab_size: 5000,
            sequence_length: 100,
            network: NetworkSpec::sentiment(),
            training: TrainConfig::default().with_epochs(10),
        }
    }
}

/// 买卖信号模型配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub window: usize,
    pub scaler: ScalerKind,
    pub network: NetworkSpec,
    pub training: TrainConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window: 10,
            scaler: ScalerKind::MinMax,
            network: NetworkSpec::trade_signal(),
            training: TrainConfig::default(),
        }
    }
}

/// 全部配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub market: MarketConfig,
    pub sentiment: SentimentConfig,
    pub signal: SignalConfig,
}

impl PipelineConfig {
    /// 从 JSON 文件读取
    pub fn from_file(path: impl AsRef<Path>) -> MLResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// 有路径时读取文件，否则使用默认配置
    pub fn load_or_default(path: Option<&Path>) -> MLResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.market.window, 60);
        assert_eq!(config.market.training.epochs, 50);
        assert_eq!(config.market.training.batch_size, 32);
        assert_eq!(config.market.training.seed, 42);
        assert_eq!(config.sentiment.training.epochs, 10);
        assert_eq!(config.sentiment.vocab_size, 5000);
        assert_eq!(config.sentiment.sequence_length, 100);
        assert_eq!(config.preprocess.ma_window, 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"market": {"window": 30, "training": {"epochs": 5}}}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.market.window, 30);
        assert_eq!(config.market.training.epochs, 5);
        assert_eq!(config.market.training.batch_size, 32);
        assert_eq!(config.market.network, NetworkSpec::market_prediction());
        assert_eq!(config.sentiment, SentimentConfig::default());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"preprocess": {"missing_value": "forward_fill"}}"#).unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.preprocess.missing_value, MissingValue::ForwardFill);
        assert_eq!(config.preprocess.ma_window, 5);
    }

    #[test]
    fn test_validate_train_config() {
        assert!(TrainConfig::default().validate().is_ok());
        assert!(TrainConfig::default().with_epochs(0).validate().is_err());

        let bad_split = TrainConfig {
            test_fraction: 1.0,
            ..Default::default()
        };
        assert!(matches!(bad_split.validate(), Err(MLError::InvalidConfig(_))));
    }
}
