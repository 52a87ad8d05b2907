//! 神经网络模型模块
//!
//! 网络结构由 [`NetworkSpec`] 描述，[`Network::build`] 按输入形状校验后
//! 在 `tch` 的 `VarStore` 中创建各层参数。梯度由 libtorch 自动求导给出。

pub mod layers;
pub mod loss;
pub mod network;
pub mod topology;

pub use layers::{Layer, Signal};
pub use network::Network;
pub use topology::{Activation, InputShape, LayerSpec, Loss, Metric, NetworkSpec};
