//! 由 `NetworkSpec` 构造的前馈/循环网络

use crate::models::layers::{Layer, Signal};
use crate::models::topology::{Activation, InputShape, LayerSpec, Loss, NetworkSpec};
use crate::types::{MLError, MLResult};
use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tch::{nn, Device, Tensor};

/// 推理时每批的样本数
const PREDICT_BATCH: i64 = 256;

/// 层间数据形状，用于构建时校验
#[derive(Debug, Clone, Copy)]
enum Flow {
    Tokens { length: usize, vocab_size: usize },
    Sequence { steps: usize, features: usize },
    Flat(usize),
}

pub struct Network {
    spec: NetworkSpec,
    input: InputShape,
    vs: nn::VarStore,
    layers: Vec<Layer>,
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("spec", &self.spec)
            .field("input", &self.input)
            .field("layers", &self.layers)
            .finish()
    }
}

impl Network {
    /// 校验拓扑并初始化权重
    pub fn build(spec: NetworkSpec, input: InputShape, seed: u64) -> MLResult<Self> {
        if spec.layers.is_empty() {
            return Err(MLError::InvalidConfig("网络至少需要一层".to_string()));
        }

        let mut flow = match input {
            InputShape::Sequence { steps, features } => {
                if steps == 0 || features == 0 {
                    return Err(MLError::InvalidConfig(format!(
                        "输入形状无效: steps={steps}, features={features}"
                    )));
                }
                Flow::Sequence { steps, features }
            }
            InputShape::Tokens { length, vocab_size } => {
                if length == 0 || vocab_size == 0 {
                    return Err(MLError::InvalidConfig(format!(
                        "输入形状无效: length={length}, vocab_size={vocab_size}"
                    )));
                }
                Flow::Tokens { length, vocab_size }
            }
        };

        let mut vs = nn::VarStore::new(Device::Cpu);
        let mut layers = Vec::with_capacity(spec.layers.len());

        for (index, layer_spec) in spec.layers.iter().enumerate() {
            let (input_width, next) = match (*layer_spec, flow) {
                (LayerSpec::Embedding { vocab_size, dim }, Flow::Tokens { length, vocab_size: needed }) => {
                    if dim == 0 {
                        return Err(MLError::InvalidConfig(format!("第 {index} 层: 词向量维度为 0")));
                    }
                    if vocab_size < needed {
                        return Err(MLError::InvalidConfig(format!(
                            "第 {index} 层: 词向量表大小 {vocab_size} 小于词表 {needed}"
                        )));
                    }
                    (0, Flow::Sequence { steps: length, features: dim })
                }
                (LayerSpec::Lstm { units, return_sequences }, Flow::Sequence { steps, features }) => {
                    if units == 0 {
                        return Err(MLError::InvalidConfig(format!("第 {index} 层: LSTM units 为 0")));
                    }
                    let next = if return_sequences {
                        Flow::Sequence { steps, features: units }
                    } else {
                        Flow::Flat(units)
                    };
                    (features, next)
                }
                (LayerSpec::Dense { units, .. }, Flow::Flat(width)) => {
                    if units == 0 {
                        return Err(MLError::InvalidConfig(format!("第 {index} 层: Dense units 为 0")));
                    }
                    (width, Flow::Flat(units))
                }
                (layer, flow) => {
                    return Err(MLError::InvalidConfig(format!(
                        "第 {index} 层 {layer:?} 不能接在 {flow:?} 之后"
                    )));
                }
            };
            let path = vs.root() / layer_path(index, layer_spec);
            layers.push(Layer::from_spec(path, layer_spec, input_width));
            flow = next;
        }

        if !matches!(flow, Flow::Flat(1)) {
            return Err(MLError::InvalidConfig(format!(
                "网络输出必须是单个数值，实际为 {flow:?}"
            )));
        }
        if spec.loss == Loss::BinaryCrossEntropy
            && !matches!(
                spec.layers.last(),
                Some(LayerSpec::Dense {
                    activation: Activation::Sigmoid,
                    ..
                })
            )
        {
            return Err(MLError::InvalidConfig(
                "二元交叉熵要求最后一层为 sigmoid 输出".to_string(),
            ));
        }

        vs.double();
        initialize(&vs, seed)?;

        Ok(Self {
            spec,
            input,
            vs,
            layers,
        })
    }

    pub fn spec(&self) -> &NetworkSpec {
        &self.spec
    }

    pub fn input_shape(&self) -> InputShape {
        self.input
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// 检查输入是否符合网络的输入形状
    pub fn check_input(&self, input: &Signal) -> MLResult<()> {
        match (self.input, input) {
            (InputShape::Sequence { steps, features }, Signal::Sequence(x)) => {
                let (_, s, f) = x.dim();
                if s != steps {
                    return Err(MLError::shape("sequence steps", steps, s));
                }
                if f != features {
                    return Err(MLError::shape("sequence features", features, f));
                }
                if x.iter().any(|v| !v.is_finite()) {
                    return Err(MLError::DataFormat("输入序列含有 NaN 或无穷值".to_string()));
                }
                Ok(())
            }
            (InputShape::Tokens { length, vocab_size }, Signal::Flat(x)) => {
                if x.ncols() != length {
                    return Err(MLError::shape("token sequence length", length, x.ncols()));
                }
                let limit = vocab_size as f64;
                if let Some(bad) = x
                    .iter()
                    .find(|&&v| !(v >= 0.0 && v < limit && v.fract() == 0.0))
                {
                    return Err(MLError::DataFormat(format!(
                        "词索引 {bad} 不在 [0, {vocab_size}) 内"
                    )));
                }
                Ok(())
            }
            (expected, actual) => Err(MLError::DataFormat(format!(
                "网络输入应为 {expected:?}，实际为 {} 数据",
                actual.kind()
            ))),
        }
    }

    /// 前向传播，输出形状 (batch,)
    pub(crate) fn forward(&self, input: &Signal) -> MLResult<Tensor> {
        self.check_input(input)?;
        Ok(self.forward_tensor(&input.to_tensor()))
    }

    fn forward_tensor(&self, xs: &Tensor) -> Tensor {
        self.layers
            .iter()
            .fold(xs.shallow_clone(), |signal, layer| layer.forward(&signal))
            .view([-1])
    }

    /// 分批推理
    pub fn predict(&self, input: &Signal) -> MLResult<Array1<f64>> {
        self.check_input(input)?;
        if input.batch_size() == 0 {
            return Ok(Array1::zeros(0));
        }

        let xs = input.to_tensor();
        let mut predictions = Vec::with_capacity(input.batch_size());
        tch::no_grad(|| -> MLResult<()> {
            for batch in xs.split(PREDICT_BATCH, 0) {
                let output = self.forward_tensor(&batch);
                predictions.extend(Vec::<f64>::try_from(&output)?);
            }
            Ok(())
        })?;

        Ok(Array1::from(predictions))
    }

    pub fn parameter_count(&self) -> usize {
        self.vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel())
            .sum()
    }

    /// 每层一行的结构摘要
    pub fn summary(&self) -> String {
        let variables = self.vs.variables();
        let mut lines = vec![format!("输入: {:?}", self.input)];
        for (index, spec) in self.spec.layers.iter().enumerate() {
            let prefix = format!("{}.", layer_path(index, spec));
            let count: usize = variables
                .iter()
                .filter(|(name, _)| name.starts_with(&prefix))
                .map(|(_, t)| t.numel())
                .sum();
            lines.push(format!("  {spec:?} 参数 {count}"));
        }
        lines.push(format!(
            "损失: {}，指标: {}，参数总数: {}",
            self.spec.loss.name(),
            self.spec.metric.name(),
            self.parameter_count()
        ));
        lines.join("\n")
    }

    /// 保存权重
    pub fn save(&self, path: &str) -> MLResult<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// 读入权重，网络结构必须与保存时一致
    pub fn load(&mut self, path: &str) -> MLResult<()> {
        self.vs.load(path)?;
        Ok(())
    }
}

fn layer_path(index: usize, spec: &LayerSpec) -> String {
    let kind = match spec {
        LayerSpec::Embedding { .. } => "embedding",
        LayerSpec::Lstm { .. } => "lstm",
        LayerSpec::Dense { .. } => "dense",
    };
    format!("{kind}{index}")
}

/// 按种子初始化全部参数
///
/// 权重矩阵用 Glorot 均匀分布，词向量用 ±0.05 均匀分布，偏置为 0，
/// LSTM 遗忘门偏置为 1。参数按名称排序后依次取随机数，结果只由种子决定。
fn initialize(vs: &nn::VarStore, seed: u64) -> MLResult<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut variables: Vec<(String, Tensor)> = vs.variables().into_iter().collect();
    variables.sort_by(|a, b| a.0.cmp(&b.0));

    tch::no_grad(|| -> MLResult<()> {
        for (name, mut var) in variables {
            let shape = var.size();
            let numel = var.numel();
            let values: Vec<f64> = if name.ends_with("bias_ih_l0") {
                let hidden = numel / 4;
                (0..numel)
                    .map(|i| if (hidden..2 * hidden).contains(&i) { 1.0 } else { 0.0 })
                    .collect()
            } else if name.contains("bias") {
                vec![0.0; numel]
            } else if name.starts_with("embedding") {
                (0..numel).map(|_| rng.gen_range(-0.05..0.05)).collect()
            } else if let [rows, cols] = shape[..] {
                let limit = (6.0 / (rows + cols) as f64).sqrt();
                (0..numel).map(|_| rng.gen_range(-limit..limit)).collect()
            } else {
                return Err(MLError::InvalidConfig(format!(
                    "参数 {name} 的形状 {shape:?} 无法初始化"
                )));
            };
            var.f_copy_(&Tensor::from_slice(&values).view(shape.as_slice()))?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::topology::Metric;
    use ndarray::Array3;

    fn tiny_regression() -> NetworkSpec {
        NetworkSpec {
            layers: vec![
                LayerSpec::Lstm {
                    units: 3,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    units: 2,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Linear,
                },
            ],
            loss: Loss::MeanSquaredError,
            metric: Metric::MeanAbsoluteError,
        }
    }

    fn tiny_classifier() -> NetworkSpec {
        NetworkSpec {
            layers: vec![
                LayerSpec::Embedding { vocab_size: 10, dim: 3 },
                LayerSpec::Lstm {
                    units: 4,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    units: 2,
                    activation: Activation::Tanh,
                },
                LayerSpec::Dense {
                    units: 1,
                    activation: Activation::Sigmoid,
                },
            ],
            loss: Loss::BinaryCrossEntropy,
            metric: Metric::Accuracy,
        }
    }

    fn sample_input() -> Signal {
        Signal::Sequence(Array3::from_shape_fn((3, 5, 2), |(b, t, f)| {
            (b + t) as f64 * 0.1 - f as f64
        }))
    }

    #[test]
    fn test_presets_build() {
        let market = Network::build(
            NetworkSpec::market_prediction(),
            InputShape::Sequence { steps: 60, features: 4 },
            42,
        )
        .unwrap();
        // 4*50*(4+50) + 8*50, 4*50*(50+50) + 8*50, 50*25+25, 25+1
        assert_eq!(market.parameter_count(), 11_200 + 20_400 + 1_275 + 26);

        let sentiment = Network::build(
            NetworkSpec::sentiment(),
            InputShape::Tokens { length: 100, vocab_size: 5000 },
            42,
        )
        .unwrap();
        assert_eq!(sentiment.layers().len(), 4);

        assert!(Network::build(
            NetworkSpec::trade_signal(),
            InputShape::Sequence { steps: 10, features: 5 },
            42,
        )
        .is_ok());
    }

    #[test]
    fn test_build_rejects_bad_topologies() {
        let seq = InputShape::Sequence { steps: 5, features: 2 };

        let mut dense_first = tiny_regression();
        dense_first.layers.remove(0);
        dense_first.layers.remove(0);
        assert!(matches!(Network::build(dense_first, seq, 1), Err(MLError::InvalidConfig(_))));

        let mut wide_output = tiny_regression();
        wide_output.layers[2] = LayerSpec::Dense {
            units: 3,
            activation: Activation::Linear,
        };
        assert!(Network::build(wide_output, seq, 1).is_err());

        let mut linear_bce = tiny_classifier();
        linear_bce.layers[3] = LayerSpec::Dense {
            units: 1,
            activation: Activation::Linear,
        };
        let tokens = InputShape::Tokens { length: 4, vocab_size: 10 };
        assert!(Network::build(linear_bce, tokens, 1).is_err());

        let small_vocab = InputShape::Tokens { length: 4, vocab_size: 11 };
        assert!(Network::build(tiny_classifier(), small_vocab, 1).is_err());

        assert!(Network::build(
            NetworkSpec { layers: vec![], ..tiny_regression() },
            seq,
            1
        )
        .is_err());
    }

    #[test]
    fn test_same_seed_same_weights() {
        let seq = InputShape::Sequence { steps: 5, features: 2 };
        let a = Network::build(tiny_regression(), seq, 7).unwrap();
        let b = Network::build(tiny_regression(), seq, 7).unwrap();
        let c = Network::build(tiny_regression(), seq, 8).unwrap();

        let input = sample_input();
        assert_eq!(a.predict(&input).unwrap(), b.predict(&input).unwrap());
        assert_ne!(a.predict(&input).unwrap(), c.predict(&input).unwrap());
    }

    #[test]
    fn test_forget_gate_bias_starts_at_one() {
        let net = Network::build(
            tiny_regression(),
            InputShape::Sequence { steps: 5, features: 2 },
            1,
        )
        .unwrap();
        let variables = net.var_store().variables();
        let bias = Vec::<f64>::try_from(&variables["lstm0.bias_ih_l0"]).unwrap();
        assert_eq!(bias, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let hh = Vec::<f64>::try_from(&variables["lstm0.bias_hh_l0"]).unwrap();
        assert!(hh.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_predict_checks_input() {
        let net = Network::build(
            tiny_regression(),
            InputShape::Sequence { steps: 5, features: 2 },
            3,
        )
        .unwrap();

        let ok = net.predict(&Signal::Sequence(Array3::zeros((300, 5, 2)))).unwrap();
        assert_eq!(ok.len(), 300);
        assert!(net.predict(&Signal::Sequence(Array3::zeros((0, 5, 2)))).unwrap().is_empty());

        let err = net
            .predict(&Signal::Sequence(Array3::zeros((1, 5, 3))))
            .unwrap_err();
        assert!(matches!(err, MLError::ShapeMismatch { expected: 2, actual: 3, .. }));

        let mut nan = Array3::zeros((1, 5, 2));
        nan[[0, 2, 1]] = f64::NAN;
        assert!(matches!(
            net.predict(&Signal::Sequence(nan)),
            Err(MLError::DataFormat(_))
        ));
    }

    #[test]
    fn test_predict_rejects_out_of_range_tokens() {
        let net = Network::build(
            tiny_classifier(),
            InputShape::Tokens { length: 4, vocab_size: 10 },
            5,
        )
        .unwrap();

        let ok = net.predict(&Signal::Flat(ndarray::array![[1.0, 2.0, 3.0, 0.0]])).unwrap();
        assert!((0.0..=1.0).contains(&ok[0]));

        for bad in [10.0, -1.0, 2.5] {
            let input = Signal::Flat(ndarray::array![[1.0, bad, 3.0, 0.0]]);
            assert!(matches!(net.predict(&input), Err(MLError::DataFormat(_))));
        }
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let seq = InputShape::Sequence { steps: 5, features: 2 };
        let net = Network::build(tiny_regression(), seq, 9).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.ot");
        let path = path.to_str().unwrap();
        net.save(path).unwrap();

        let mut restored = Network::build(tiny_regression(), seq, 10).unwrap();
        let input = sample_input();
        assert_ne!(restored.predict(&input).unwrap(), net.predict(&input).unwrap());
        restored.load(path).unwrap();
        assert_eq!(restored.predict(&input).unwrap(), net.predict(&input).unwrap());

        let mut other = Network::build(tiny_classifier(), InputShape::Tokens { length: 4, vocab_size: 10 }, 1)
            .unwrap();
        assert!(other.load(path).is_err());
    }

    #[test]
    fn test_summary_lists_layers() {
        let net = Network::build(
            tiny_classifier(),
            InputShape::Tokens { length: 4, vocab_size: 10 },
            1,
        )
        .unwrap();
        let summary = net.summary();
        assert_eq!(summary.lines().count(), 6);
        assert!(summary.contains("binary_crossentropy"));
        assert!(summary.contains("参数 30"));
    }
}
