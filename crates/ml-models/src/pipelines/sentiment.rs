//! 文本情感分类模型
//!
//! 推理时复用训练时拟合并随模型保存的分词器，同一段文本的编码与
//! 批次中的其他文本无关。

use super::{load_network, load_sidecar, save_artifacts, PipelineModel};
use crate::config::SentimentConfig;
use crate::data::DataLoader;
use crate::evaluation::Evaluator;
use crate::models::layers::Signal;
use crate::models::network::Network;
use crate::models::topology::{InputShape, LayerSpec};
use crate::text::Tokenizer;
use crate::trainer::{Dataset, Trainer};
use crate::types::{
    ClassificationMetrics, MLError, MLResult, SentimentLabel, TextRecord, TrainingReport,
};
use async_trait::async_trait;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SentimentSidecar {
    config: SentimentConfig,
    tokenizer: Tokenizer,
    report: TrainingReport,
    metrics: ClassificationMetrics,
}

#[derive(Debug)]
struct Fitted {
    network: Network,
    tokenizer: Tokenizer,
    report: TrainingReport,
    metrics: ClassificationMetrics,
}

/// 情感分类模型
pub struct SentimentAnalysisModel {
    config: SentimentConfig,
    fitted: Option<Fitted>,
}

impl SentimentAnalysisModel {
    pub fn new(config: SentimentConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    pub fn metrics(&self) -> Option<&ClassificationMetrics> {
        self.fitted.as_ref().map(|f| &f.metrics)
    }

    pub fn tokenizer(&self) -> Option<&Tokenizer> {
        self.fitted.as_ref().map(|f| &f.tokenizer)
    }

    fn fitted(&self) -> MLResult<&Fitted> {
        self.fitted
            .as_ref()
            .ok_or(MLError::ModelNotTrained("sentiment analysis model"))
    }

    /// 用内存中的文本记录训练
    pub fn train_on_records(&mut self, records: &[TextRecord]) -> MLResult<TrainingReport> {
        if records.is_empty() {
            return Err(MLError::DataFormat("情感数据为空".to_string()));
        }

        let labels = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                SentimentLabel::parse(&record.sentiment)
                    .map(|label| label.to_value())
                    .ok_or_else(|| {
                        MLError::DataFormat(format!(
                            "第 {} 条记录的情感标签无法识别: {:?}",
                            i + 1,
                            record.sentiment
                        ))
                    })
            })
            .collect::<MLResult<Array1<f64>>>()?;
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();

        let mut tokenizer = Tokenizer::new(self.config.vocab_size, self.config.sequence_length)?;
        tokenizer.fit_on_texts(&texts);
        if !tokenizer.is_fitted() {
            return Err(MLError::DataFormat("文本中没有可用的词".to_string()));
        }
        let x = tokenizer.encode(&texts)?;
        tracing::info!(
            "情感数据: {} 条文本, 词表 {} 个词",
            records.len(),
            tokenizer.vocab_size() - 1
        );

        let mut network = Network::build(
            self.config.network.clone(),
            InputShape::Tokens {
                length: self.config.sequence_length,
                vocab_size: tokenizer.vocab_size(),
            },
            self.config.training.seed,
        )?;
        let trainer = Trainer::new(self.config.training.clone())?;
        let dataset = Dataset::new(Signal::Flat(x), labels)?;
        let report = trainer.fit(&mut network, &dataset)?;

        let split = trainer.split(dataset.len())?;
        let test = dataset.select(&split.test);
        let probabilities = network.predict(&test.inputs)?;
        let metrics = Evaluator::classification(&test.targets, &probabilities)?;
        tracing::info!(
            "情感测试集: 准确率 {:.4}, 精确率 {:.4}, 召回率 {:.4}, F1 {:.4}",
            metrics.accuracy,
            metrics.precision,
            metrics.recall,
            metrics.f1
        );

        self.fitted = Some(Fitted {
            network,
            tokenizer,
            report: report.clone(),
            metrics,
        });
        Ok(report)
    }

    /// 每段文本为正面的概率
    pub fn predict<S: AsRef<str>>(&self, texts: &[S]) -> MLResult<Array1<f64>> {
        let fitted = self.fitted()?;
        let x = fitted.tokenizer.encode(texts)?;
        fitted.network.predict(&Signal::Flat(x))
    }

    /// 概率大于 0.5 判为正面
    pub fn classify<S: AsRef<str>>(&self, texts: &[S]) -> MLResult<Vec<SentimentLabel>> {
        Ok(self
            .predict(texts)?
            .iter()
            .map(|&p| SentimentLabel::from_probability(p))
            .collect())
    }
}

#[async_trait]
impl PipelineModel for SentimentAnalysisModel {
    fn name(&self) -> &'static str {
        "sentiment_analysis"
    }

    fn is_trained(&self) -> bool {
        self.fitted.is_some()
    }

    fn report(&self) -> Option<&TrainingReport> {
        self.fitted.as_ref().map(|f| &f.report)
    }

    async fn train(&mut self, csv_path: &str) -> MLResult<TrainingReport> {
        let records = DataLoader::load_text_csv(csv_path)?;
        self.train_on_records(&records)
    }

    async fn save(&self, path: &str) -> MLResult<()> {
        let fitted = self.fitted()?;
        let sidecar = SentimentSidecar {
            config: self.config.clone(),
            tokenizer: fitted.tokenizer.clone(),
            report: fitted.report.clone(),
            metrics: fitted.metrics,
        };
        save_artifacts(path, &fitted.network, &sidecar).await
    }

    async fn load(path: &str) -> MLResult<Self> {
        let sidecar: SentimentSidecar = load_sidecar(path).await?;
        // 词向量表必须覆盖分词器能产生的全部索引
        let vocab_size = sidecar.tokenizer.vocab_size();
        match sidecar.config.network.layers.first() {
            Some(LayerSpec::Embedding { vocab_size: rows, .. }) if *rows >= vocab_size => {}
            other => {
                return Err(MLError::DataFormat(format!(
                    "{path}: 网络首层 {other:?} 容纳不了分词器的 {vocab_size} 个索引"
                )));
            }
        }
        let network = load_network(
            path,
            sidecar.config.network.clone(),
            InputShape::Tokens {
                length: sidecar.tokenizer.sequence_length(),
                vocab_size,
            },
        )?;

        Ok(Self {
            config: sidecar.config,
            fitted: Some(Fitted {
                network,
                tokenizer: sidecar.tokenizer,
                report: sidecar.report,
                metrics: sidecar.metrics,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdamConfig, TrainConfig};
    use crate::models::topology::{Activation, Loss, Metric, NetworkSpec};

    fn records() -> Vec<TextRecord> {
        let positive = [
            "great earnings and strong growth",
            "shares rally on record profit",
            "excellent quarter with great results",
            "strong demand lifts outlook",
            "profit beats estimates again",
        ];
        let negative = [
            "terrible losses and weak demand",
            "shares crash on fraud charges",
            "weak quarter with poor results",
            "losses widen as demand falls",
            "guidance cut after poor sales",
        ];
        (0..4)
            .flat_map(|_| {
                positive
                    .iter()
                    .map(|t| TextRecord {
                        text: t.to_string(),
                        sentiment: "1".to_string(),
                    })
                    .chain(negative.iter().map(|t| TextRecord {
                        text: t.to_string(),
                        sentiment: "negative".to_string(),
                    }))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn small_config() -> SentimentConfig {
        SentimentConfig {
            vocab_size: 100,
            sequence_length: 8,
            network: NetworkSpec {
                layers: vec![
                    LayerSpec::Embedding {
                        vocab_size: 100,
                        dim: 8,
                    },
                    LayerSpec::Lstm {
                        units: 8,
                        return_sequences: false,
                    },
                    LayerSpec::Dense {
                        units: 1,
                        activation: Activation::Sigmoid,
                    },
                ],
                loss: Loss::BinaryCrossEntropy,
                metric: Metric::Accuracy,
            },
            training: TrainConfig {
                epochs: 30,
                batch_size: 8,
                optimizer: AdamConfig {
                    learning_rate: 0.02,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_predict_before_train() {
        let model = SentimentAnalysisModel::new(small_config());
        assert!(matches!(
            model.predict(&["good"]),
            Err(MLError::ModelNotTrained(_))
        ));
    }

    #[test]
    fn test_train_and_classify() {
        let mut model = SentimentAnalysisModel::new(small_config());
        let report = model.train_on_records(&records()).unwrap();

        let first = report.history[0].loss;
        let last = report.final_epoch().unwrap().loss;
        assert!(last < first, "loss {first} -> {last}");

        let texts = ["great growth and record profit", "crash and terrible losses"];
        let probabilities = model.predict(&texts).unwrap();
        assert!(probabilities[0] > probabilities[1]);
        assert_eq!(model.classify(&texts).unwrap().len(), 2);
        assert!(model.metrics().unwrap().accuracy >= 0.0);
    }

    #[test]
    fn test_prediction_independent_of_batch() {
        let mut model = SentimentAnalysisModel::new(small_config());
        model.train_on_records(&records()).unwrap();

        let alone = model.predict(&["strong growth"]).unwrap();
        let batched = model
            .predict(&["weak demand", "strong growth", "unseen words only"])
            .unwrap();
        assert!((alone[0] - batched[1]).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_label() {
        let mut model = SentimentAnalysisModel::new(small_config());
        let bad = vec![TextRecord {
            text: "fine".to_string(),
            sentiment: "maybe".to_string(),
        }];
        assert!(matches!(
            model.train_on_records(&bad),
            Err(MLError::DataFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_save_load_keeps_vocabulary() {
        let mut model = SentimentAnalysisModel::new(small_config());
        model.train_on_records(&records()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentiment.bin");
        let path = path.to_str().unwrap();
        model.save(path).await.unwrap();

        let loaded = SentimentAnalysisModel::load(path).await.unwrap();
        let texts = ["record profit", "poor sales"];
        assert_eq!(loaded.predict(&texts).unwrap(), model.predict(&texts).unwrap());
        assert_eq!(loaded.tokenizer(), model.tokenizer());
    }

    #[tokio::test]
    async fn test_load_rejects_embedding_smaller_than_vocabulary() {
        let mut model = SentimentAnalysisModel::new(small_config());
        model.train_on_records(&records()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sentiment.bin");
        let path = path.to_str().unwrap();
        model.save(path).await.unwrap();

        let config_path = super::super::sidecar_path(path);
        let mut sidecar: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&config_path).unwrap()).unwrap();
        sidecar["config"]["network"]["layers"][0]["embedding"]["vocab_size"] = 3.into();
        std::fs::write(&config_path, serde_json::to_vec(&sidecar).unwrap()).unwrap();

        match SentimentAnalysisModel::load(path).await {
            Err(MLError::DataFormat(msg)) => assert!(msg.contains("分词器"), "{msg}"),
            other => panic!("unexpected {:?}", other.map(|m| m.is_trained())),
        }
    }
}
