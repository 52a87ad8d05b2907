//! 数据预处理：记录清洗和特征缩放

pub mod records;
pub mod scaler;

pub use records::{FeatureRow, FeatureTable, RawRecord, RawValue, RecordPreprocessor};
pub use scaler::{MinMaxScaler, Scaler, ScalerKind, StandardScaler};
