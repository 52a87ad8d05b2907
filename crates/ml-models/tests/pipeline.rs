//! 从 CSV 文件训练、保存、加载的端到端测试

use ml::config::{MarketConfig, SentimentConfig, TrainConfig};
use ml::data::DataLoader;
use ml::models::{Activation, LayerSpec, Loss, Metric, NetworkSpec};
use ml::pipelines::{sidecar_path, train_and_save};
use ml::{MLError, MarketPredictionModel, PipelineModel, SentimentAnalysisModel};
use std::fmt::Write as _;
use std::path::Path;

fn write_market_csv(path: &Path, rows: usize) {
    let mut csv = String::from("date,open,high,low,volume,close\n");
    for i in 0..rows {
        let close = 20.0 + 2.0 * (i as f64 * 0.4).sin();
        writeln!(
            csv,
            "2024-01-{:02},{:.3},{:.3},{:.3},{},{:.3}",
            i % 28 + 1,
            close - 0.1,
            close + 0.3,
            close - 0.3,
            1000 + i,
            close
        )
        .unwrap();
    }
    std::fs::write(path, csv).unwrap();
}

fn write_sentiment_csv(path: &Path) {
    let mut csv = String::from("text,sentiment\n");
    for _ in 0..6 {
        csv.push_str("\"strong profit, great growth\",positive\n");
        csv.push_str("record rally,1\n");
        csv.push_str("\"weak sales, heavy losses\",negative\n");
        csv.push_str("fraud charges crash,0\n");
    }
    std::fs::write(path, csv).unwrap();
}

fn market_config() -> MarketConfig {
    MarketConfig {
        window: 6,
        network: NetworkSpec {
            layers: vec![
                LayerSpec::Lstm {
                    units: 4,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    units: 4,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Linear,
                },
            ],
            loss: Loss::MeanSquaredError,
            metric: Metric::MeanAbsoluteError,
        },
        training: TrainConfig::default().with_epochs(2),
        ..Default::default()
    }
}

fn sentiment_config() -> SentimentConfig {
    SentimentConfig {
        vocab_size: 50,
        sequence_length: 6,
        network: NetworkSpec {
            layers: vec![
                LayerSpec::Embedding {
                    vocab_size: 50,
                    dim: 4,
                },
                LayerSpec::Lstm {
                    units: 4,
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
        training: TrainConfig::default().with_epochs(2),
    }
}

#[tokio::test]
async fn market_model_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("market_data.csv");
    write_market_csv(&data, 50);
    let model_path = dir.path().join("models").join("market_prediction_model.bin");
    let model_path = model_path.to_str().unwrap();

    let mut model = MarketPredictionModel::new(market_config());
    let report = train_and_save(&mut model, data.to_str().unwrap(), model_path)
        .await
        .unwrap();
    assert_eq!(report.history.len(), 2);
    assert!(Path::new(&sidecar_path(model_path)).exists());

    let records = DataLoader::load_market_csv(&data).unwrap();
    let loaded = MarketPredictionModel::load(model_path).await.unwrap();
    assert!(loaded.is_trained());
    assert_eq!(
        loaded.predict_latest(&records).unwrap(),
        model.predict_latest(&records).unwrap()
    );
}

#[tokio::test]
async fn sentiment_model_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("sentiment_data.csv");
    write_sentiment_csv(&data);
    let model_path = dir.path().join("sentiment_model.bin");
    let model_path = model_path.to_str().unwrap();

    let mut model = SentimentAnalysisModel::new(sentiment_config());
    train_and_save(&mut model, data.to_str().unwrap(), model_path)
        .await
        .unwrap();

    let loaded = SentimentAnalysisModel::load(model_path).await.unwrap();
    let texts = ["great growth", "heavy losses", "never seen before"];
    assert_eq!(
        loaded.predict(&texts).unwrap(),
        model.predict(&texts).unwrap()
    );
    assert_eq!(loaded.report().unwrap().test_samples, 5);
}

#[tokio::test]
async fn missing_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("market_data.csv");
    std::fs::write(&data, "open,high,low,close\n1,2,0.5,1.5\n").unwrap();

    let mut model = MarketPredictionModel::new(market_config());
    let err = model.train(data.to_str().unwrap()).await.unwrap_err();
    match err {
        MLError::DataFormat(message) => assert!(message.contains("volume"), "{message}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn load_missing_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.bin");
    let err = SentimentAnalysisModel::load(path.to_str().unwrap())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MLError::Io(_)));
}
