//! 价格预测模型
//!
//! 用过去 `window` 行的 open/high/low/volume 预测下一行的 close。
//! 特征和目标各自拟合一个缩放器，预测结果用目标缩放器还原为价格。

use super::{load_network, load_sidecar, prepare_window, save_artifacts, InputScaling, PipelineModel};
use crate::config::MarketConfig;
use crate::data::DataLoader;
use crate::evaluation::Evaluator;
use crate::models::layers::Signal;
use crate::models::network::Network;
use crate::models::topology::InputShape;
use crate::preprocessing::Scaler;
use crate::timeseries::TimeSeriesBuilder;
use crate::trainer::{Dataset, Trainer};
use crate::types::{MLError, MLResult, MarketRecord, Metrics, TrainingReport};
use async_trait::async_trait;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// 输入特征数（open, high, low, volume）
pub const MARKET_FEATURES: usize = 4;

/// 与网络权重一起保存的内容
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarketSidecar {
    config: MarketConfig,
    feature_scaler: Scaler,
    target_scaler: Scaler,
    report: TrainingReport,
    metrics: Metrics,
}

#[derive(Debug)]
struct Fitted {
    network: Network,
    feature_scaler: Scaler,
    target_scaler: Scaler,
    report: TrainingReport,
    metrics: Metrics,
}

/// 价格预测模型
pub struct MarketPredictionModel {
    config: MarketConfig,
    fitted: Option<Fitted>,
}

impl MarketPredictionModel {
    pub fn new(config: MarketConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// 测试集上以价格为单位的评估指标
    pub fn metrics(&self) -> Option<&Metrics> {
        self.fitted.as_ref().map(|f| &f.metrics)
    }

    pub fn network(&self) -> Option<&Network> {
        self.fitted.as_ref().map(|f| &f.network)
    }

    fn fitted(&self) -> MLResult<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or(MLError::ModelNotTrained("market prediction model"))
    }

    /// 用内存中的行情记录训练
    pub fn train_on_records(&mut self, records: &[MarketRecord]) -> MLResult<TrainingReport> {
        let window = self.config.window;
        let builder = TimeSeriesBuilder::new(window, 1)?;
        if builder.sample_count(records.len()) == 0 {
            return Err(MLError::DataFormat(format!(
                "行情数据只有 {} 行，窗口长度 {} 至少需要 {} 行",
                records.len(),
                window,
                window + 1
            )));
        }

        let features = feature_matrix(records);
        let close = Array1::from_iter(records.iter().map(|r| r.close));

        let (feature_scaler, scaled_features) = Scaler::fit_transform(self.config.scaler, &features)?;
        let target_scaler = Scaler::fit_column(self.config.scaler, &close)?;
        let scaled_close = target_scaler.transform_column(&close)?;

        let (x, y) = builder.build_sequences(&scaled_features, &scaled_close)?;
        tracing::debug!("价格预测样本: x {:?}, y {}", x.shape(), y.len());
        let n_windows = y.len();

        let mut network = Network::build(
            self.config.network.clone(),
            InputShape::Sequence {
                steps: window,
                features: MARKET_FEATURES,
            },
            self.config.training.seed,
        )?;
        let trainer = Trainer::new(self.config.training.clone())?;
        let dataset = Dataset::new(Signal::Sequence(x), y)?;
        let report = trainer.fit(&mut network, &dataset)?;

        // 测试集上还原为价格后评估
        let split = trainer.split(n_windows)?;
        let scaled_pred = network.predict(&dataset.inputs.select(&split.test))?;
        let predicted = target_scaler.inverse_transform_column(&scaled_pred)?;
        let actual = close.slice(ndarray::s![window..]).select(Axis(0), &split.test);
        let reference = close
            .slice(ndarray::s![window - 1..close.len() - 1])
            .select(Axis(0), &split.test);
        let metrics = Evaluator::regression(&actual, &predicted, Some(&reference))?;

        tracing::info!(
            "价格预测测试集: RMSE {:.4}, MAE {:.4}, R² {:.4}, 方向准确率 {:.2}%",
            metrics.rmse,
            metrics.mae,
            metrics.r2_score,
            metrics.direction_accuracy * 100.0
        );

        self.fitted = Some(Fitted {
            network,
            feature_scaler,
            target_scaler,
            report: report.clone(),
            metrics,
        });
        Ok(report)
    }

    /// 预测下一个收盘价；`window` 形状为 (window, 4)
    pub fn predict(&self, window: &Array2<f64>, scaling: InputScaling) -> MLResult<f64> {
        let fitted = self.fitted()?;
        let input = prepare_window(window, self.config.window, &fitted.feature_scaler, scaling)?;
        let scaled = fitted.network.predict(&input)?;
        let price = fitted.target_scaler.inverse_transform_column(&scaled)?;
        price
            .get(0)
            .copied()
            .ok_or_else(|| MLError::DataFormat("预测结果为空".to_string()))
    }

    /// 用最近 `window` 条原始记录预测下一个收盘价
    pub fn predict_latest(&self, records: &[MarketRecord]) -> MLResult<f64> {
        let rows = super::latest_rows(&feature_matrix(records), self.config.window)?;
        self.predict(&rows, InputScaling::Raw)
    }
}

/// (n, 4) 特征矩阵
pub fn feature_matrix(records: &[MarketRecord]) -> Array2<f64> {
    let mut features = Array2::zeros((records.len(), MARKET_FEATURES));
    for (mut row, record) in features.axis_iter_mut(Axis(0)).zip(records) {
        for (cell, value) in row.iter_mut().zip(record.features()) {
            *cell = value;
        }
    }
    features
}

#[async_trait]
impl PipelineModel for MarketPredictionModel {
    fn name(&self) -> &'static str {
        "market_prediction"
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn report(&self) -> Option<&TrainingReport> {
        self.fitted.as_ref().map(|f| &f.report)
    }

    async fn train(&mut self, csv_path: &str) -> MLResult<TrainingReport> {
        let records = DataLoader::load_market_csv(csv_path)?;
        self.train_on_records(&records)
    }

    async fn save(&self, path: &str) -> MLResult<()> {
        let fitted = self.fitted()?;
        let sidecar = MarketSidecar {
            config: self.config.clone(),
            feature_scaler: fitted.feature_scaler.clone(),
            target_scaler: fitted.target_scaler.clone(),
            report: fitted.report.clone(),
            metrics: fitted.metrics.clone(),
        };
        save_artifacts(path, &fitted.network, &sidecar).await
    }

    async fn load(path: &str) -> MLResult<Self> {
        let sidecar: MarketSidecar = load_sidecar(path).await?;
        if sidecar.feature_scaler.n_features() != MARKET_FEATURES {
            return Err(MLError::shape(
                "saved feature scaler",
                MARKET_FEATURES,
                sidecar.feature_scaler.n_features(),
            ));
        }
        let network = load_network(
            path,
            sidecar.config.network.clone(),
            InputShape::Sequence {
                steps: sidecar.config.window,
                features: MARKET_FEATURES,
            },
        )?;

        Ok(Self {
            config: sidecar.config,
            fitted: Some(Fitted {
                network,
                feature_scaler: sidecar.feature_scaler,
                target_scaler: sidecar.target_scaler,
                report: sidecar.report,
                metrics: sidecar.metrics,
            }),
        })
    }
}
