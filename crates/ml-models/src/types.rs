//! 核心类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type MLResult<T> = Result<T, MLError>;

#[derive(Debug, Error)]
pub enum MLError {
    #[error("数据格式错误: {0}")]
    DataFormat(String),

    #[error("维度不匹配 ({context}): expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("模型未训练: {0}")]
    ModelNotTrained(&'static str),

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PyTorch 错误: {0}")]
    Torch(String),
}

impl MLError {
    pub(crate) fn shape(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        MLError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

impl From<tch::TchError> for MLError {
    fn from(value: tch::TchError) -> Self {
        MLError::Torch(value.to_string())
    }
}

/// 市场数据（一行 CSV）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    pub close: f64,
}

impl MarketRecord {
    /// 模型输入特征，顺序固定为 open, high, low, volume
    pub fn features(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.volume]
    }

    /// 交易信号模型的输入特征：open, high, low, close, volume
    pub fn signal_features(&self) -> [f64; 5] {
        [self.open, self.high, self.low, self.close, self.volume]
    }
}

/// 带标签的文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    pub text: String,
    pub sentiment: String,
}

/// 情感类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
}

impl SentimentLabel {
    /// 解析 CSV 中的标签：1/0、positive/negative、pos/neg、true/false
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "1.0" | "positive" | "pos" | "true" => Some(SentimentLabel::Positive),
            "0" | "0.0" | "negative" | "neg" | "false" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }

    pub fn from_probability(p: f64) -> Self {
        if p > 0.5 {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        }
    }

    pub fn to_value(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Negative => 0.0,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
        }
    }
}

/// 交易信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSignal {
    Buy,
    Sell,
}

impl TradeSignal {
    /// 从买入概率转换为交易信号，阈值 0.5
    pub fn from_probability(p: f64) -> Self {
        if p > 0.5 {
            TradeSignal::Buy
        } else {
            TradeSignal::Sell
        }
    }
}

impl std::fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSignal::Buy => write!(f, "BUY"),
            TradeSignal::Sell => write!(f, "SELL"),
        }
    }
}

/// 单个 epoch 的训练记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f64,
    pub metric: f64,
    pub val_loss: Option<f64>,
    pub val_metric: Option<f64>,
}

/// 训练结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// 损失函数名称
    pub loss_name: String,
    /// 指标名称（mae / accuracy）
    pub metric_name: String,
    pub history: Vec<EpochStats>,
    pub test_loss: f64,
    pub test_metric: f64,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub test_samples: usize,
    pub training_duration_secs: f64,
    pub trained_at: DateTime<Utc>,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochStats> {
        self.history.last()
    }
}

impl std::fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "样本: 训练 {} / 验证 {} / 测试 {}",
            self.train_samples, self.validation_samples, self.test_samples
        )?;
        if let Some(last) = self.final_epoch() {
            write!(
                f,
                "第 {} 轮: {} {:.6}, {} {:.4}",
                last.epoch, self.loss_name, last.loss, self.metric_name, last.metric
            )?;
            if let (Some(vl), Some(vm)) = (last.val_loss, last.val_metric) {
                write!(f, ", val {} {:.6}, val {} {:.4}", self.loss_name, vl, self.metric_name, vm)?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "测试集: {} {:.6}, {} {:.4} (耗时 {:.1}s)",
            self.loss_name, self.test_loss, self.metric_name, self.test_metric, self.training_duration_secs
        )
    }
}

/// 回归评估指标（价格单位）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    /// 均方误差
    pub mse: f64,
    /// 均方根误差
    pub rmse: f64,
    /// 平均绝对误差
    pub mae: f64,
    /// R² 分数
    pub r2_score: f64,
    /// 方向准确率（预测涨跌方向的准确度）
    pub direction_accuracy: f64,
}

impl Metrics {
    pub fn new(mse: f64, rmse: f64, mae: f64, r2_score: f64, direction_accuracy: f64) -> Self {
        Self {
            mse,
            rmse,
            mae,
            r2_score,
            direction_accuracy,
        }
    }
}

/// 二分类评估指标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_label_parse() {
        assert_eq!(SentimentLabel::parse("1"), Some(SentimentLabel::Positive));
        assert_eq!(SentimentLabel::parse(" Negative "), Some(SentimentLabel::Negative));
        assert_eq!(SentimentLabel::parse("TRUE"), Some(SentimentLabel::Positive));
        assert_eq!(SentimentLabel::parse("maybe"), None);
    }

    #[test]
    fn test_report_display() {
        let report = TrainingReport {
            loss_name: "mse".to_string(),
            metric_name: "mae".to_string(),
            history: vec![EpochStats {
                epoch: 1,
                loss: 0.5,
                metric: 0.4,
                val_loss: Some(0.6),
                val_metric: Some(0.45),
            }],
            test_loss: 0.7,
            test_metric: 0.5,
            train_samples: 8,
            validation_samples: 2,
            test_samples: 3,
            training_duration_secs: 1.0,
            trained_at: Utc::now(),
        };
        let text = report.to_string();
        assert!(text.contains("训练 8 / 验证 2 / 测试 3"));
        assert!(text.contains("mse 0.700000"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_probability_thresholds() {
        assert_eq!(SentimentLabel::from_probability(0.51), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::from_probability(0.5), SentimentLabel::Negative);
        assert_eq!(TradeSignal::from_probability(0.9), TradeSignal::Buy);
        assert_eq!(TradeSignal::from_probability(0.1), TradeSignal::Sell);
    }
}
