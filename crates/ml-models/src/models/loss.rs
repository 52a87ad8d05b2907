//! 损失函数和训练指标

use crate::models::topology::{Loss, Metric};
use tch::{Kind, Reduction, Tensor};

/// 交叉熵中概率的裁剪范围
const PROB_EPSILON: f64 = 1e-7;

impl Loss {
    pub fn name(&self) -> &'static str {
        match self {
            Loss::MeanSquaredError => "mse",
            Loss::BinaryCrossEntropy => "binary_crossentropy",
        }
    }

    /// 批次平均损失，返回标量张量
    pub fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        match self {
            Loss::MeanSquaredError => predictions.mse_loss(targets, Reduction::Mean),
            Loss::BinaryCrossEntropy => predictions
                .clamp(PROB_EPSILON, 1.0 - PROB_EPSILON)
                .binary_cross_entropy::<Tensor>(targets, None, Reduction::Mean),
        }
    }
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::MeanAbsoluteError => "mae",
            Metric::Accuracy => "accuracy",
        }
    }

    pub fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        match self {
            Metric::MeanAbsoluteError => (predictions - targets).abs().mean(Kind::Double),
            // 概率大于 0.5 视为正类
            Metric::Accuracy => predictions
                .gt(0.5)
                .eq_tensor(&targets.gt(0.5))
                .to_kind(Kind::Double)
                .mean(Kind::Double),
        }
    }
}
