//! 时间序列数据处理模块

use crate::types::{MLError, MLResult};
use ndarray::{s, Array1, Array2, Array3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::ops::Range;

/// 时间序列数据集构建器
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesBuilder {
    sequence_length: usize,
    prediction_horizon: usize,
}

impl TimeSeriesBuilder {
    /// 创建新的时间序列构建器
    ///
    /// # 参数
    /// - `sequence_length`: 输入序列长度（用多少历史数据预测）
    /// - `prediction_horizon`: 预测窗口（预测未来第几步）
    pub fn new(sequence_length: usize, prediction_horizon: usize) -> MLResult<Self> {
        if sequence_length == 0 || prediction_horizon == 0 {
            return Err(MLError::InvalidConfig(format!(
                "序列长度和预测步长必须大于 0: window={sequence_length}, horizon={prediction_horizon}"
            )));
        }
        Ok(Self {
            sequence_length,
            prediction_horizon,
        })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// 可以构建的样本数，数据不足时为 0
    pub fn sample_count(&self, rows: usize) -> usize {
        (rows + 1).saturating_sub(self.sequence_length + self.prediction_horizon)
    }

    /// 将二维特征数据转换为时间序列数据
    ///
    /// # 返回
    /// - X: (样本数, 序列长度, 特征数)
    /// - y: (样本数)，第 i 个样本的目标为 `targets[i + W + h - 1]`
    pub fn build_sequences(
        &self,
        features: &Array2<f64>,
        targets: &Array1<f64>,
    ) -> MLResult<(Array3<f64>, Array1<f64>)> {
        if features.nrows() != targets.len() {
            return Err(MLError::shape("sequence targets", features.nrows(), targets.len()));
        }

        let n_features = features.ncols();
        let n_sequences = self.sample_count(features.nrows());
        if n_sequences == 0 {
            tracing::warn!(
                "数据量不足: {} 行，至少需要 {} 行才能构建一个样本",
                features.nrows(),
                self.sequence_length + self.prediction_horizon
            );
        }

        let mut x = Array3::<f64>::zeros((n_sequences, self.sequence_length, n_features));
        let mut y = Array1::<f64>::zeros(n_sequences);

        for i in 0..n_sequences {
            x.slice_mut(s![i, .., ..])
                .assign(&features.slice(s![i..i + self.sequence_length, ..]));
            y[i] = targets[i + self.sequence_length + self.prediction_horizon - 1];
        }

        Ok((x, y))
    }

    /// 最近 `sequence_length` 行组成的单个输入窗口，形状 (1, W, F)
    pub fn latest_window(&self, features: &Array2<f64>) -> MLResult<Array3<f64>> {
        let n = features.nrows();
        if n < self.sequence_length {
            return Err(MLError::shape("latest window rows", self.sequence_length, n));
        }
        let window = features
            .slice(s![n - self.sequence_length.., ..])
            .to_owned();
        Ok(window.insert_axis(ndarray::Axis(0)))
    }
}

/// 样本划分
pub struct TimeSeriesSplitter;

impl TimeSeriesSplitter {
    /// 随机划分训练集和测试集，返回 (训练索引, 测试索引)
    ///
    /// 测试集大小为 `ceil(n * test_fraction)`，索引来自固定种子的随机排列。
    pub fn train_test_split(
        n: usize,
        test_fraction: f64,
        seed: u64,
    ) -> MLResult<(Vec<usize>, Vec<usize>)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(MLError::InvalidConfig(format!(
                "无效的测试集比例: {test_fraction}"
            )));
        }

        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut StdRng::seed_from_u64(seed));

        let train = permutation.split_off(n_test);
        Ok((train, permutation))
    }

    /// 从训练集尾部划出验证集，返回 (训练区间, 验证区间)
    pub fn validation_split(n: usize, fraction: f64) -> (Range<usize>, Range<usize>) {
        let split_at = ((n as f64 * (1.0 - fraction)).floor() as usize).min(n);
        (0..split_at, split_at..n)
    }
}
