//! 网络结构描述
//!
//! 网络拓扑是纯数据，可以写进配置文件；`Network::build` 根据它和输入形状
//! 构造具体的层。

use serde::{Deserialize, Serialize};
use tch::Tensor;

/// 激活函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply(&self, xs: &Tensor) -> Tensor {
        match self {
            Activation::Linear => xs.shallow_clone(),
            Activation::Relu => xs.relu(),
            Activation::Sigmoid => xs.sigmoid(),
            Activation::Tanh => xs.tanh(),
        }
    }
}

/// 单层描述
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    /// 词向量查找表
    Embedding { vocab_size: usize, dim: usize },
    /// LSTM；`return_sequences` 为 true 时输出每个时间步的隐藏状态
    Lstm { units: usize, return_sequences: bool },
    /// 全连接层
    Dense { units: usize, activation: Activation },
}

/// 损失函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    MeanSquaredError,
    BinaryCrossEntropy,
}

/// 训练时报告的指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    MeanAbsoluteError,
    Accuracy,
}

/// 网络输入形状（不含 batch 维）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputShape {
    /// 数值序列 (steps, features)
    Sequence { steps: usize, features: usize },
    /// 词索引序列，索引小于 `vocab_size`
    Tokens { length: usize, vocab_size: usize },
}

/// 完整的网络描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub layers: Vec<LayerSpec>,
    pub loss: Loss,
    pub metric: Metric,
}

impl NetworkSpec {
    /// 价格回归：LSTM(50) → LSTM(50) → Dense(25) → Dense(1)
    pub fn market_prediction() -> Self {
        Self {
            layers: vec![
                LayerSpec::Lstm {
                    units: 50,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    units: 50,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 25,
                    activation: Activation::Linear,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Linear,
                },
            ],
            loss: Loss::MeanSquaredError,
            metric: Metric::MeanAbsoluteError,
        }
    }

    /// 文本情感二分类：Embedding(5000, 32) → LSTM(64) → Dense(32, relu) → Dense(1, sigmoid)
    pub fn sentiment() -> Self {
        Self {
            layers: vec![
                LayerSpec::Embedding {
                    vocab_size: 5000,
                    dim: 32,
                },
                LayerSpec::Lstm {
                    units: 64,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 32,
                    activation: Activation::Relu,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Sigmoid,
                },
            ],
            loss: Loss::BinaryCrossEntropy,
            metric: Metric::Accuracy,
        }
    }

    /// 买卖信号二分类：LSTM(50) → LSTM(50) → Dense(1, sigmoid)
    pub fn trade_signal() -> Self {
        Self {
            layers: vec![
                LayerSpec::Lstm {
                    units: 50,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    units: 50,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Sigmoid,
                },
            ],
            loss: Loss::BinaryCrossEntropy,
            metric: Metric::Accuracy,
        }
    }
}
