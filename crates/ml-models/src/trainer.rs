//! 小批量训练循环

use crate::config::TrainConfig;
use crate::models::layers::Signal;
use crate::models::network::Network;
use crate::timeseries::TimeSeriesSplitter;
use crate::types::{EpochStats, MLError, MLResult, TrainingReport};
use chrono::Utc;
use ndarray::{Array1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::Instant;
use tch::nn::{self, OptimizerConfig};
use tch::Tensor;

/// 输入和目标
#[derive(Debug, Clone)]
pub struct Dataset {
    pub inputs: Signal,
    pub targets: Array1<f64>,
}

impl Dataset {
    pub fn new(inputs: Signal, targets: Array1<f64>) -> MLResult<Self> {
        if inputs.batch_size() != targets.len() {
            return Err(MLError::shape(
                "dataset targets",
                inputs.batch_size(),
                targets.len(),
            ));
        }
        Ok(Self { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            inputs: self.inputs.select(indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }
}

/// 样本索引划分
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> MLResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// 随机划出测试集，再从训练部分尾部划出验证集
    pub fn split(&self, n: usize) -> MLResult<DataSplit> {
        let (train_all, test) =
            TimeSeriesSplitter::train_test_split(n, self.config.test_fraction, self.config.seed)?;
        let (train_range, val_range) =
            TimeSeriesSplitter::validation_split(train_all.len(), self.config.validation_fraction);

        Ok(DataSplit {
            train: train_all[train_range].to_vec(),
            validation: train_all[val_range].to_vec(),
            test,
        })
    }

    /// 训练网络并在测试集上评估
    pub fn fit(&self, network: &mut Network, data: &Dataset) -> MLResult<TrainingReport> {
        if data.is_empty() {
            return Err(MLError::DataFormat("训练数据为空".to_string()));
        }
        network.check_input(&data.inputs)?;
        if data.inputs.batch_size() != data.len() {
            return Err(MLError::shape("dataset targets", data.inputs.batch_size(), data.len()));
        }

        let split = self.split(data.len())?;
        if split.train.is_empty() || split.test.is_empty() {
            return Err(MLError::DataFormat(format!(
                "样本数 {} 不足以划分训练集和测试集",
                data.len()
            )));
        }
        let validation = (!split.validation.is_empty()).then(|| data.select(&split.validation));

        tracing::info!(
            "开始训练: 训练 {} 样本, 验证 {} 样本, 测试 {} 样本, 参数 {}",
            split.train.len(),
            split.validation.len(),
            split.test.len(),
            network.parameter_count()
        );

        tracing::debug!("网络结构:\n{}", network.summary());

        let loss_fn = network.spec().loss;
        let metric_fn = network.spec().metric;
        let adam = self.config.optimizer;
        let mut optimizer = nn::Adam {
            beta1: adam.beta1,
            beta2: adam.beta2,
            eps: adam.epsilon,
            ..Default::default()
        }
        .build(network.var_store(), adam.learning_rate)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let mut order = split.train.clone();
        let mut history = Vec::with_capacity(self.config.epochs);
        let started = Instant::now();

        for epoch in 0..self.config.epochs {
            if self.config.shuffle {
                order.shuffle(&mut rng);
            }

            let mut total_loss = 0.0;
            let mut total_metric = 0.0;
            for chunk in order.chunks(self.config.batch_size) {
                let batch = data.select(chunk);
                let targets = to_tensor(&batch.targets);

                let output = network.forward(&batch.inputs)?;
                let loss = loss_fn.compute(&output, &targets);
                match self.config.clip_norm {
                    Some(max_norm) => optimizer.backward_step_clip_norm(&loss, max_norm),
                    None => optimizer.backward_step(&loss),
                }

                let weight = chunk.len() as f64;
                total_loss += f64::try_from(&loss)? * weight;
                let metric = metric_fn.compute(&output.detach(), &targets);
                total_metric += f64::try_from(&metric)? * weight;
            }

            let n = order.len() as f64;
            let (val_loss, val_metric) = match &validation {
                Some(val) => {
                    let (l, m) = self.evaluate(network, val)?;
                    (Some(l), Some(m))
                }
                None => (None, None),
            };
            let stats = EpochStats {
                epoch: epoch + 1,
                loss: total_loss / n,
                metric: total_metric / n,
                val_loss,
                val_metric,
            };

            if !stats.loss.is_finite() {
                tracing::warn!("Epoch {}: 损失不是有限值", stats.epoch);
            }
            match (stats.val_loss, stats.val_metric) {
                (Some(vl), Some(vm)) => tracing::info!(
                    "Epoch {}/{}, Loss: {:.6}, {}: {:.4}, Val Loss: {:.6}, Val {}: {:.4}",
                    stats.epoch,
                    self.config.epochs,
                    stats.loss,
                    metric_fn.name(),
                    stats.metric,
                    vl,
                    metric_fn.name(),
                    vm
                ),
                _ => tracing::info!(
                    "Epoch {}/{}, Loss: {:.6}, {}: {:.4}",
                    stats.epoch,
                    self.config.epochs,
                    stats.loss,
                    metric_fn.name(),
                    stats.metric
                ),
            }
            history.push(stats);
        }

        let (test_loss, test_metric) = self.evaluate(network, &data.select(&split.test))?;
        tracing::info!(
            "测试集 Loss: {:.6}, {}: {:.4}",
            test_loss,
            metric_fn.name(),
            test_metric
        );

        Ok(TrainingReport {
            loss_name: loss_fn.name().to_string(),
            metric_name: metric_fn.name().to_string(),
            history,
            test_loss,
            test_metric,
            train_samples: split.train.len(),
            validation_samples: split.validation.len(),
            test_samples: split.test.len(),
            training_duration_secs: started.elapsed().as_secs_f64(),
            trained_at: Utc::now(),
        })
    }

    /// 在数据集上计算 (损失, 指标)
    pub fn evaluate(&self, network: &Network, data: &Dataset) -> MLResult<(f64, f64)> {
        let predictions = to_tensor(&network.predict(&data.inputs)?);
        let targets = to_tensor(&data.targets);
        let spec = network.spec();
        Ok((
            f64::try_from(&spec.loss.compute(&predictions, &targets))?,
            f64::try_from(&spec.metric.compute(&predictions, &targets))?,
        ))
    }
}

fn to_tensor(values: &Array1<f64>) -> Tensor {
    Tensor::from_slice(&values.to_vec())
}
