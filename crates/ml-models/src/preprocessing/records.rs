//! 原始行情记录预处理
//!
//! 把 `price` / `volume` 转成浮点数，填补缺失值，并追加价格的滚动均值列。

use crate::config::{MissingValue, PreprocessConfig};
use crate::types::{MLError, MLResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 原始字段值：数字或数字字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// 一条原始记录，字段可能缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub price: Option<RawValue>,
    #[serde(default)]
    pub volume: Option<RawValue>,
}

impl RawRecord {
    pub fn new(price: f64, volume: f64) -> Self {
        Self {
            price: Some(RawValue::Number(price)),
            volume: Some(RawValue::Number(volume)),
        }
    }
}

/// 预处理后的一行
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub price: f64,
    pub volume: f64,
    /// 不足一个完整窗口时为 `None`
    pub price_ma: Option<f64>,
}

/// 预处理结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub ma_window: usize,
    pub rows: Vec<FeatureRow>,
    /// 被填补的价格数量
    pub imputed_prices: usize,
    /// 被填补的成交量数量
    pub imputed_volumes: usize,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 滚动均值列名，例如 `price_ma_5`
    pub fn ma_column(&self) -> String {
        format!("price_ma_{}", self.ma_window)
    }
}

impl fmt::Display for FeatureTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5} {:>14} {:>14} {:>14}", "", "price", "volume", self.ma_column())?;
        for (i, row) in self.rows.iter().enumerate() {
            let ma = row
                .price_ma
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "NaN".to_string());
            writeln!(f, "{:>5} {:>14.4} {:>14.4} {:>14}", i, row.price, row.volume, ma)?;
        }
        Ok(())
    }
}

/// 记录预处理器
pub struct RecordPreprocessor {
    config: PreprocessConfig,
}

impl RecordPreprocessor {
    pub fn new(config: PreprocessConfig) -> MLResult<Self> {
        if config.ma_window == 0 {
            return Err(MLError::InvalidConfig("ma_window 必须大于 0".to_string()));
        }
        Ok(Self { config })
    }

    /// 处理记录；输出行数与输入行数相同
    pub fn process(&self, records: &[RawRecord]) -> MLResult<FeatureTable> {
        let mut prices = Vec::with_capacity(records.len());
        let mut volumes = Vec::with_capacity(records.len());
        let mut imputed_prices = 0;
        let mut imputed_volumes = 0;

        for (i, record) in records.iter().enumerate() {
            let price = coerce(record.price.as_ref(), i, "price")?;
            let volume = coerce(record.volume.as_ref(), i, "volume")?;

            if price.is_none() {
                imputed_prices += 1;
            }
            if volume.is_none() {
                imputed_volumes += 1;
            }

            prices.push(self.impute(price, prices.last().copied()));
            volumes.push(self.impute(volume, volumes.last().copied()));
        }

        if imputed_prices > 0 && self.config.missing_value == MissingValue::Zero {
            tracing::warn!(
                "{} missing prices were filled with 0, downstream averages and models will see them as real prices",
                imputed_prices
            );
        }

        let window = self.config.ma_window;
        let rows = prices
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&price, &volume))| {
                let price_ma = if i + 1 >= window {
                    Some(prices[i + 1 - window..=i].iter().sum::<f64>() / window as f64)
                } else {
                    None
                };
                FeatureRow {
                    price,
                    volume,
                    price_ma,
                }
            })
            .collect();

        Ok(FeatureTable {
            ma_window: window,
            rows,
            imputed_prices,
            imputed_volumes,
        })
    }

    fn impute(&self, value: Option<f64>, previous: Option<f64>) -> f64 {
        match (value, self.config.missing_value) {
            (Some(v), _) => v,
            (None, MissingValue::Zero) => 0.0,
            (None, MissingValue::ForwardFill) => previous.unwrap_or(0.0),
        }
    }
}

/// 转换单个字段；`None` 表示缺失
fn coerce(value: Option<&RawValue>, row: usize, column: &str) -> MLResult<Option<f64>> {
    let parsed = match value {
        None => return Ok(None),
        Some(RawValue::Number(v)) => *v,
        Some(RawValue::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            s.parse::<f64>().map_err(|_| {
                MLError::DataFormat(format!("第 {row} 行的 {column} 不是数字: {s:?}"))
            })?
        }
    };

    if parsed.is_nan() {
        Ok(None)
    } else if parsed.is_infinite() {
        Err(MLError::DataFormat(format!("第 {row} 行的 {column} 不是有限值")))
    } else {
        Ok(Some(parsed))
    }
}
