//! 网络层：词向量、LSTM、全连接
//!
//! 各层是 `tch::nn` 模块的薄包装，参数都登记在网络的 `VarStore` 中。
//! 数值序列以 (batch, steps, features) 的 f64 张量传入，词索引以
//! (batch, length) 的 i64 张量传入。

use crate::models::topology::{Activation, LayerSpec};
use ndarray::{Array2, Array3, Axis};
use tch::nn::{self, Module, RNN};
use tch::Tensor;

/// 网络输入数据
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// (batch, steps, features)
    Sequence(Array3<f64>),
    /// (batch, length) 的词索引
    Flat(Array2<f64>),
}

impl Signal {
    pub fn batch_size(&self) -> usize {
        match self {
            Signal::Sequence(x) => x.shape()[0],
            Signal::Flat(x) => x.nrows(),
        }
    }

    /// 按样本索引取子集
    pub fn select(&self, indices: &[usize]) -> Signal {
        match self {
            Signal::Sequence(x) => Signal::Sequence(x.select(Axis(0), indices)),
            Signal::Flat(x) => Signal::Flat(x.select(Axis(0), indices)),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Signal::Sequence(_) => "sequence",
            Signal::Flat(_) => "flat",
        }
    }

    /// 数值序列转为 f64 张量，词索引转为 i64 张量
    pub(crate) fn to_tensor(&self) -> Tensor {
        match self {
            Signal::Sequence(x) => {
                let (b, s, f) = x.dim();
                let data: Vec<f64> = x.iter().copied().collect();
                Tensor::from_slice(&data).view([b as i64, s as i64, f as i64])
            }
            Signal::Flat(x) => {
                let (b, l) = x.dim();
                let data: Vec<i64> = x.iter().map(|&v| v as i64).collect();
                Tensor::from_slice(&data).view([b as i64, l as i64])
            }
        }
    }
}

/// 网络中的一层
pub enum Layer {
    Embedding(nn::Embedding),
    Lstm {
        lstm: nn::LSTM,
        return_sequences: bool,
    },
    Dense {
        linear: nn::Linear,
        activation: Activation,
    },
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::Lstm {
                return_sequences, ..
            } => write!(f, "Lstm {{ return_sequences: {return_sequences} }}"),
            Layer::Dense { activation, .. } => write!(f, "Dense {{ activation: {activation:?} }}"),
            Layer::Embedding(_) => f.write_str("Embedding"),
        }
    }
}

impl Layer {
    /// 在 `path` 下创建层；`input_width` 是上一层输出的特征数
    pub fn from_spec(path: nn::Path, spec: &LayerSpec, input_width: usize) -> Self {
        match *spec {
            LayerSpec::Embedding { vocab_size, dim } => Layer::Embedding(nn::embedding(
                path,
                vocab_size as i64,
                dim as i64,
                Default::default(),
            )),
            LayerSpec::Lstm {
                units,
                return_sequences,
            } => Layer::Lstm {
                lstm: nn::lstm(path, input_width as i64, units as i64, Default::default()),
                return_sequences,
            },
            LayerSpec::Dense { units, activation } => Layer::Dense {
                linear: nn::linear(path, input_width as i64, units as i64, Default::default()),
                activation,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Embedding(_) => "embedding",
            Layer::Lstm { .. } => "lstm",
            Layer::Dense { .. } => "dense",
        }
    }

    pub fn forward(&self, xs: &Tensor) -> Tensor {
        match self {
            Layer::Embedding(embedding) => embedding.forward(xs),
            Layer::Lstm {
                lstm,
                return_sequences,
            } => {
                let (outputs, _) = lstm.seq(xs);
                if *return_sequences {
                    outputs
                } else {
                    // 取最后一个时间步的输出
                    outputs.select(1, -1)
                }
            }
            Layer::Dense { linear, activation } => activation.apply(&linear.forward(xs)),
        }
    }
}
