//! 特征缩放器
//!
//! 缩放器在训练集上拟合一次，之后随模型一起保存，推理时原样复用，
//! 保证训练与推理使用同一套参数。

use crate::types::{MLError, MLResult};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-10;

/// 缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// 缩放到 [0, 1]
    #[default]
    MinMax,
    /// 零均值、单位方差
    Standard,
}

/// 标准化缩放器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl StandardScaler {
    /// 从训练数据拟合缩放器
    pub fn fit(data: &Array2<f64>) -> MLResult<Self> {
        check_fit_input(data)?;

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| MLError::DataFormat("无法计算均值".to_string()))?;
        let std = data.std_axis(Axis(0), 0.0);

        Ok(Self { mean, std })
    }

    fn scale(&self, j: usize) -> f64 {
        if self.std[j].abs() < EPSILON {
            1.0
        } else {
            self.std[j]
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        check_columns(self.mean.len(), data)?;

        let mut normalized = data.clone();
        for mut row in normalized.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (*val - self.mean[j]) / self.scale(j);
            }
        }
        Ok(normalized)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        check_columns(self.mean.len(), data)?;

        let mut denormalized = data.clone();
        for mut row in denormalized.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = *val * self.scale(j) + self.mean[j];
            }
        }
        Ok(denormalized)
    }
}

/// 最小-最大缩放器，目标区间 [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Array1<f64>,
    pub max: Array1<f64>,
}

impl MinMaxScaler {
    pub fn fit(data: &Array2<f64>) -> MLResult<Self> {
        check_fit_input(data)?;

        let min = data.fold_axis(Axis(0), f64::INFINITY, |&acc, &x| acc.min(x));
        let max = data.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &x| acc.max(x));

        Ok(Self { min, max })
    }

    /// 常数列的区间按 1 处理，变换结果为 0
    fn range(&self, j: usize) -> f64 {
        let range = self.max[j] - self.min[j];
        if range.abs() < EPSILON {
            1.0
        } else {
            range
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        check_columns(self.min.len(), data)?;

        let mut scaled = data.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = (*val - self.min[j]) / self.range(j);
            }
        }
        Ok(scaled)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        check_columns(self.min.len(), data)?;

        let mut restored = data.clone();
        for mut row in restored.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                *val = *val * self.range(j) + self.min[j];
            }
        }
        Ok(restored)
    }
}

/// 已拟合的缩放器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    MinMax(MinMaxScaler),
    Standard(StandardScaler),
}

impl Scaler {
    /// 按指定方式拟合
    pub fn fit(kind: ScalerKind, data: &Array2<f64>) -> MLResult<Self> {
        Ok(match kind {
            ScalerKind::MinMax => Scaler::MinMax(MinMaxScaler::fit(data)?),
            ScalerKind::Standard => Scaler::Standard(StandardScaler::fit(data)?),
        })
    }

    /// 拟合并转换
    pub fn fit_transform(kind: ScalerKind, data: &Array2<f64>) -> MLResult<(Self, Array2<f64>)> {
        let scaler = Self::fit(kind, data)?;
        let transformed = scaler.transform(data)?;
        Ok((scaler, transformed))
    }

    /// 对单列数据（例如目标价格）拟合
    pub fn fit_column(kind: ScalerKind, column: &Array1<f64>) -> MLResult<Self> {
        Self::fit(kind, &column_matrix(column))
    }

    pub fn kind(&self) -> ScalerKind {
        match self {
            Scaler::MinMax(_) => ScalerKind::MinMax,
            Scaler::Standard(_) => ScalerKind::Standard,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Scaler::MinMax(s) => s.min.len(),
            Scaler::Standard(s) => s.mean.len(),
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        match self {
            Scaler::MinMax(s) => s.transform(data),
            Scaler::Standard(s) => s.transform(data),
        }
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> MLResult<Array2<f64>> {
        match self {
            Scaler::MinMax(s) => s.inverse_transform(data),
            Scaler::Standard(s) => s.inverse_transform(data),
        }
    }

    pub fn transform_column(&self, column: &Array1<f64>) -> MLResult<Array1<f64>> {
        Ok(self.transform(&column_matrix(column))?.column(0).to_owned())
    }

    pub fn inverse_transform_column(&self, column: &Array1<f64>) -> MLResult<Array1<f64>> {
        Ok(self
            .inverse_transform(&column_matrix(column))?
            .column(0)
            .to_owned())
    }
}

fn column_matrix(column: &Array1<f64>) -> Array2<f64> {
    column.clone().insert_axis(Axis(1))
}

fn check_fit_input(data: &Array2<f64>) -> MLResult<()> {
    if data.is_empty() {
        return Err(MLError::DataFormat("数据为空".to_string()));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(MLError::DataFormat("拟合数据包含非有限值".to_string()));
    }
    Ok(())
}

fn check_columns(expected: usize, data: &Array2<f64>) -> MLResult<()> {
    if data.ncols() != expected {
        return Err(MLError::shape("scaler columns", expected, data.ncols()));
    }
    Ok(())
}
