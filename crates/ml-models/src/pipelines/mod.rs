//! 模型流水线：数据准备、训练、推理和持久化
//!
//! 模型文件 `<path>` 是 `VarStore` 保存的网络权重，`<path>.config` 保存
//! JSON 格式的配置、缩放器或分词器以及训练报告。加载时先读配置，
//! 按其中的网络结构重建网络，再读入权重。

pub mod market;
pub mod sentiment;
pub mod signal;

pub use market::MarketPredictionModel;
pub use sentiment::SentimentAnalysisModel;
pub use signal::TradeSignalModel;

use crate::models::layers::Signal;
use crate::models::network::Network;
use crate::models::topology::{InputShape, NetworkSpec};
use crate::preprocessing::Scaler;
use crate::types::{MLError, MLResult, TrainingReport};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 推理输入是否已经缩放
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputScaling {
    /// 原始数值，使用训练时拟合的缩放器转换
    Raw,
    /// 已经用训练时的缩放器转换过
    Scaled,
}

/// 流水线模型接口
#[async_trait]
pub trait PipelineModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_trained(&self) -> bool;

    /// 最近一次训练的报告
    fn report(&self) -> Option<&TrainingReport>;

    /// 从 CSV 文件训练
    async fn train(&mut self, csv_path: &str) -> MLResult<TrainingReport>;

    /// 保存模型
    async fn save(&self, path: &str) -> MLResult<()>;

    /// 加载模型
    async fn load(path: &str) -> MLResult<Self>
    where
        Self: Sized;
}

/// 训练后保存
pub async fn train_and_save<M: PipelineModel>(
    model: &mut M,
    csv_path: &str,
    model_path: &str,
) -> MLResult<TrainingReport> {
    tracing::info!("训练 {}: {}", model.name(), csv_path);
    let report = model.train(csv_path).await?;
    model.save(model_path).await?;
    Ok(report)
}

pub fn sidecar_path(path: &str) -> String {
    format!("{}.config", path)
}

pub(crate) async fn save_artifacts<T>(path: &str, network: &Network, sidecar: &T) -> MLResult<()>
where
    T: Serialize + Sync,
{
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    network.save(path)?;
    tokio::fs::write(sidecar_path(path), serde_json::to_vec_pretty(sidecar)?).await?;

    tracing::info!("模型已保存: {}", path);
    Ok(())
}

pub(crate) async fn load_sidecar<T>(path: &str) -> MLResult<T>
where
    T: DeserializeOwned,
{
    let sidecar = tokio::fs::read(sidecar_path(path)).await?;
    Ok(serde_json::from_slice(&sidecar)?)
}

/// 按保存时的结构重建网络并读入权重
pub(crate) fn load_network(path: &str, spec: NetworkSpec, input: InputShape) -> MLResult<Network> {
    if !Path::new(path).exists() {
        return Err(MLError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{path}: 权重文件不存在"),
        )));
    }
    let mut network = Network::build(spec, input, 0)?;
    network.load(path)?;

    tracing::info!("模型已加载: {}", path);
    Ok(network)
}

/// 校验单个 (W, F) 窗口，按需缩放后转为 (1, W, F) 输入
pub(crate) fn prepare_window(
    window: &Array2<f64>,
    steps: usize,
    scaler: &Scaler,
    scaling: InputScaling,
) -> MLResult<Signal> {
    if window.nrows() != steps {
        return Err(MLError::shape("window rows", steps, window.nrows()));
    }
    if window.ncols() != scaler.n_features() {
        return Err(MLError::shape(
            "window features",
            scaler.n_features(),
            window.ncols(),
        ));
    }

    ensure_finite(window, "窗口")?;

    let scaled = match scaling {
        InputScaling::Raw => {
            let scaled = scaler.transform(window)?;
            ensure_finite(&scaled, "缩放后的窗口")?;
            scaled
        }
        InputScaling::Scaled => window.clone(),
    };
    Ok(Signal::Sequence(scaled.insert_axis(Axis(0))))
}

fn ensure_finite(rows: &Array2<f64>, what: &str) -> MLResult<()> {
    match rows.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((row, col), value)) => Err(MLError::DataFormat(format!(
            "{what}第 {} 行第 {} 列不是有限值: {value}",
            row + 1,
            col + 1
        ))),
        None => Ok(()),
    }
}

/// 取最后 `steps` 行
pub(crate) fn latest_rows(rows: &Array2<f64>, steps: usize) -> MLResult<Array2<f64>> {
    let n = rows.nrows();
    if n < steps {
        return Err(MLError::shape("latest window rows", steps, n));
    }
    Ok(rows.slice(ndarray::s![n - steps.., ..]).to_owned())
}
