//! 模型评估模块

use crate::types::{ClassificationMetrics, MLError, MLResult, Metrics};
use ndarray::Array1;

/// 模型评估器
pub struct Evaluator;

impl Evaluator {
    /// 回归指标
    ///
    /// `reference` 为每个样本预测前的最后价格；给出时方向准确率比较
    /// 真实涨跌和预测涨跌，否则比较数值本身的符号。
    pub fn regression(
        y_true: &Array1<f64>,
        y_pred: &Array1<f64>,
        reference: Option<&Array1<f64>>,
    ) -> MLResult<Metrics> {
        check_lengths(y_true, y_pred)?;
        if let Some(reference) = reference {
            if reference.len() != y_true.len() {
                return Err(MLError::shape("reference prices", y_true.len(), reference.len()));
            }
        }

        let mse = Self::mean_squared_error(y_true, y_pred);
        let rmse = mse.sqrt();
        let mae = Self::mean_absolute_error(y_true, y_pred);
        let r2 = Self::r2_score(y_true, y_pred);
        let direction_accuracy = match reference {
            Some(reference) => Self::direction_accuracy(&(y_true - reference), &(y_pred - reference)),
            None => Self::direction_accuracy(y_true, y_pred),
        };

        Ok(Metrics::new(mse, rmse, mae, r2, direction_accuracy))
    }

    /// 二分类指标，概率大于 0.5 判为正类
    pub fn classification(
        y_true: &Array1<f64>,
        probabilities: &Array1<f64>,
    ) -> MLResult<ClassificationMetrics> {
        check_lengths(y_true, probabilities)?;

        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&t, &p) in y_true.iter().zip(probabilities.iter()) {
            match (t > 0.5, p > 0.5) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Ok(ClassificationMetrics {
            accuracy: ratio(tp + tn, y_true.len()),
            precision,
            recall,
            f1,
        })
    }

    /// 均方误差 (MSE)
    pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        (y_true - y_pred).mapv(|x| x * x).mean().unwrap_or(0.0)
    }

    /// 平均绝对误差 (MAE)
    pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        (y_true - y_pred).mapv(f64::abs).mean().unwrap_or(0.0)
    }

    /// R² 分数
    pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        let y_mean = y_true.mean().unwrap_or(0.0);

        let ss_res: f64 = (y_true - y_pred).mapv(|x| x * x).sum();
        let ss_tot: f64 = y_true.mapv(|x| (x - y_mean).powi(2)).sum();

        if ss_tot == 0.0 {
            return 0.0;
        }

        1.0 - (ss_res / ss_tot)
    }

    /// 方向准确率：符号一致的比例
    pub fn direction_accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        if y_true.is_empty() {
            return 0.0;
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| (**t >= 0.0) == (**p >= 0.0))
            .count();

        correct as f64 / y_true.len() as f64
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> MLResult<()> {
    if y_true.len() != y_pred.len() {
        return Err(MLError::shape("predictions", y_true.len(), y_pred.len()));
    }
    if y_true.is_empty() {
        return Err(MLError::DataFormat("评估数据为空".to_string()));
    }
    Ok(())
}
