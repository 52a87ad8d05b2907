//! 买卖信号模型
//!
//! 用过去 `window` 行的 open/high/low/close/volume 判断下一行收盘价
//! 是否高于窗口最后一行的收盘价，输出买入概率。

use super::{
    latest_rows, load_network, load_sidecar, prepare_window, save_artifacts, InputScaling, PipelineModel,
};
use crate::config::SignalConfig;
use crate::data::DataLoader;
use crate::evaluation::Evaluator;
use crate::models::layers::Signal;
use crate::models::network::Network;
use crate::models::topology::InputShape;
use crate::preprocessing::Scaler;
use crate::timeseries::TimeSeriesBuilder;
use crate::trainer::{Dataset, Trainer};
use crate::types::{
    ClassificationMetrics, MLError, MLResult, MarketRecord, TradeSignal, TrainingReport,
};
use async_trait::async_trait;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// 输入特征数（open, high, low, close, volume）
pub const SIGNAL_FEATURES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignalSidecar {
    config: SignalConfig,
    scaler: Scaler,
    report: TrainingReport,
    metrics: ClassificationMetrics,
}

#[derive(Debug)]
struct Fitted {
    network: Network,
    scaler: Scaler,
    report: TrainingReport,
    metrics: ClassificationMetrics,
}

pub struct TradeSignalModel {
    config: SignalConfig,
    fitted: Option<Fitted>,
}

impl TradeSignalModel {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&ClassificationMetrics> {
        self.fitted.as_ref().map(|f| &f.metrics)
    }

    fn fitted(&self) -> MLResult<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or(MLError::ModelNotTrained("trade signal model"))
    }

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

        let features = signal_matrix(records);
        let labels = up_labels(records);
        let (scaler, scaled) = Scaler::fit_transform(self.config.scaler, &features)?;
        let (x, y) = builder.build_sequences(&scaled, &labels)?;
        tracing::debug!(
            "买卖信号样本: x {:?}, 上涨比例 {:.2}",
            x.shape(),
            y.mean().unwrap_or(0.0)
        );

        let mut network = Network::build(
            self.config.network.clone(),
            InputShape::Sequence {
                steps: window,
                features: SIGNAL_FEATURES,
            },
            self.config.training.seed,
        )?;
        let trainer = Trainer::new(self.config.training.clone())?;
        let dataset = Dataset::new(Signal::Sequence(x), y)?;
        let report = trainer.fit(&mut network, &dataset)?;

        let split = trainer.split(dataset.len())?;
        let test = dataset.select(&split.test);
        let probabilities = network.predict(&test.inputs)?;
        let metrics = Evaluator::classification(&test.targets, &probabilities)?;
        tracing::info!(
            "买卖信号测试集: 准确率 {:.4}, F1 {:.4}",
            metrics.accuracy,
            metrics.f1
        );

        self.fitted = Some(Fitted {
            network,
            scaler,
            report: report.clone(),
            metrics,
        });
        Ok(report)
    }

    /// 买入概率；`window` 形状为 (window, 5)
    pub fn predict(&self, window: &Array2<f64>, scaling: InputScaling) -> MLResult<f64> {
        let fitted = self.fitted()?;
        let input = prepare_window(window, self.config.window, &fitted.scaler, scaling)?;
        fitted
            .network
            .predict(&input)?
            .get(0)
            .copied()
            .ok_or_else(|| MLError::DataFormat("预测结果为空".to_string()))
    }

    pub fn signal(&self, window: &Array2<f64>, scaling: InputScaling) -> MLResult<TradeSignal> {
        self.predict(window, scaling).map(TradeSignal::from_probability)
    }

    /// 用最近 `window` 条原始记录给出信号和买入概率
    pub fn signal_latest(&self, records: &[MarketRecord]) -> MLResult<(TradeSignal, f64)> {
        let rows = latest_rows(&signal_matrix(records), self.config.window)?;
        let p = self.predict(&rows, InputScaling::Raw)?;
        Ok((TradeSignal::from_probability(p), p))
    }
}

/// (n, 5) 特征矩阵
pub fn signal_matrix(records: &[MarketRecord]) -> Array2<f64> {
    let mut features = Array2::zeros((records.len(), SIGNAL_FEATURES));
    for (mut row, record) in features.axis_iter_mut(Axis(0)).zip(records) {
        for (cell, value) in row.iter_mut().zip(record.signal_features()) {
            *cell = value;
        }
    }
    features
}

/// 第 t 行收盘价高于第 t-1 行时为 1，首行为 0
fn up_labels(records: &[MarketRecord]) -> Array1<f64> {
    let mut labels = Array1::zeros(records.len());
    for (t, pair) in records.windows(2).enumerate() {
        if pair[1].close > pair[0].close {
            labels[t + 1] = 1.0;
        }
    }
    labels
}

#[async_trait]
impl PipelineModel for TradeSignalModel {
    fn name(&self) -> &'static str {
        "trade_signal"
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
        let sidecar = SignalSidecar {
            config: self.config.clone(),
            scaler: fitted.scaler.clone(),
            report: fitted.report.clone(),
            metrics: fitted.metrics,
        };
        save_artifacts(path, &fitted.network, &sidecar).await
    }

    async fn load(path: &str) -> MLResult<Self> {
        let sidecar: SignalSidecar = load_sidecar(path).await?;
        if sidecar.scaler.n_features() != SIGNAL_FEATURES {
            return Err(MLError::shape(
                "saved scaler",
                SIGNAL_FEATURES,
                sidecar.scaler.n_features(),
            ));
        }
        let network = load_network(
            path,
            sidecar.config.network.clone(),
            InputShape::Sequence {
                steps: sidecar.config.window,
                features: SIGNAL_FEATURES,
            },
        )?;

        Ok(Self {
            config: sidecar.config,
            fitted: Some(Fitted {
                network,
                scaler: sidecar.scaler,
                report: sidecar.report,
                metrics: sidecar.metrics,
            }),
        })
    }
}
