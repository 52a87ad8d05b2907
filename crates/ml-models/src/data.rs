//! CSV / JSON 数据读取

use crate::preprocessing::{RawRecord, RawValue};
use crate::types::{MLError, MLResult, MarketRecord, TextRecord};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const MARKET_COLUMNS: [&str; 5] = ["open", "high", "low", "volume", "close"];
pub const TEXT_COLUMNS: [&str; 2] = ["text", "sentiment"];
pub const RAW_COLUMNS: [&str; 2] = ["price", "volume"];

/// CSV 中的原始记录，空字段视为缺失
#[derive(Debug, Deserialize)]
struct RawCsvRow {
    price: Option<String>,
    volume: Option<String>,
}

impl From<RawCsvRow> for RawRecord {
    fn from(row: RawCsvRow) -> Self {
        RawRecord {
            price: row.price.map(RawValue::Text),
            volume: row.volume.map(RawValue::Text),
        }
    }
}

/// 数据加载器
pub struct DataLoader;

impl DataLoader {
    /// 读取行情 CSV（open, high, low, volume, close，其余列忽略）
    pub fn load_market_csv<P: AsRef<Path>>(path: P) -> MLResult<Vec<MarketRecord>> {
        let path = path.as_ref();
        let records: Vec<MarketRecord> =
            Self::read_market_csv(File::open(path)?, &path.display().to_string())?;
        tracing::info!("读取行情数据 {}: {} 行", path.display(), records.len());
        Ok(records)
    }

    /// 数值必须是有限值，NaN 和 inf 按格式错误处理
    pub fn read_market_csv<R: Read>(reader: R, source: &str) -> MLResult<Vec<MarketRecord>> {
        read_csv_checked(reader, source, &MARKET_COLUMNS, |record: &MarketRecord| {
            MARKET_COLUMNS
                .iter()
                .zip(record.features().into_iter().chain([record.close]))
                .find(|(_, value)| !value.is_finite())
                .map(|(column, value)| format!("{column} 不是有限值: {value}"))
        })
    }

    /// 读取带标签的文本 CSV（text, sentiment）
    pub fn load_text_csv<P: AsRef<Path>>(path: P) -> MLResult<Vec<TextRecord>> {
        let path = path.as_ref();
        let records: Vec<TextRecord> =
            Self::read_text_csv(File::open(path)?, &path.display().to_string())?;
        tracing::info!("读取文本数据 {}: {} 行", path.display(), records.len());
        Ok(records)
    }

    pub fn read_text_csv<R: Read>(reader: R, source: &str) -> MLResult<Vec<TextRecord>> {
        read_csv(reader, source, &TEXT_COLUMNS)
    }

    /// 读取原始 price/volume 记录；`.json` 文件按 JSON 数组解析，其余按 CSV
    pub fn load_raw_records<P: AsRef<Path>>(path: P) -> MLResult<Vec<RawRecord>> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            let content = std::fs::read_to_string(path)?;
            Self::parse_raw_records_json(&content).map_err(|e| {
                MLError::DataFormat(format!("{}: {}", path.display(), e))
            })
        } else {
            Self::read_raw_records_csv(File::open(path)?, &path.display().to_string())
        }
    }

    pub fn parse_raw_records_json(content: &str) -> MLResult<Vec<RawRecord>> {
        serde_json::from_str(content)
            .map_err(|e| MLError::DataFormat(format!("记录必须是对象数组: {e}")))
    }

    pub fn read_raw_records_csv<R: Read>(reader: R, source: &str) -> MLResult<Vec<RawRecord>> {
        let rows: Vec<RawCsvRow> = read_csv(reader, source, &RAW_COLUMNS)?;
        Ok(rows.into_iter().map(RawRecord::from).collect())
    }
}

fn read_csv<T, R>(reader: R, source: &str, required: &[&str]) -> MLResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    read_csv_checked(reader, source, required, |_: &T| None)
}

/// `check` 返回 `Some(原因)` 时报告所在行
fn read_csv_checked<T, R, F>(reader: R, source: &str, required: &[&str], check: F) -> MLResult<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
    F: Fn(&T) -> Option<String>,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| csv_error(source, e))?
        .clone();
    require_columns(&headers, required, source)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| csv_error(source, e))?;
        let row: T = record
            .deserialize(Some(&headers))
            .map_err(|e| csv_error(source, e))?;
        if let Some(reason) = check(&row) {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(MLError::DataFormat(format!("{source} 第 {line} 行: {reason}")));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn require_columns(headers: &StringRecord, required: &[&str], source: &str) -> MLResult<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MLError::DataFormat(format!(
            "{source}: 缺少列 {}",
            missing.join(", ")
        )))
    }
}

fn csv_error(source: &str, err: csv::Error) -> MLError {
    match err.position() {
        Some(pos) => MLError::DataFormat(format!("{source} 第 {} 行: {err}", pos.line())),
        None => MLError::DataFormat(format!("{source}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_market_csv_ignores_extra_columns() {
        let csv = "date,open,high,low,close,volume\n\
                   2024-01-01,1.0,2.0,0.5,1.5,100\n\
                   2024-01-02, 1.5 ,2.5,1.0,2.0,200\n";
        let records = DataLoader::read_market_csv(csv.as_bytes(), "market.csv").unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].open, 1.5);
        assert_eq!(records[1].close, 2.0);
        assert_eq!(records[0].features(), [1.0, 2.0, 0.5, 100.0]);
    }

    #[test]
    fn test_missing_column_is_data_format() {
        let csv = "open,high,low,close\n1,2,3,4\n";
        let err = DataLoader::read_market_csv(csv.as_bytes(), "market.csv").unwrap_err();
        match err {
            MLError::DataFormat(msg) => {
                assert!(msg.contains("market.csv"));
                assert!(msg.contains("volume"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_value_names_line() {
        let csv = "open,high,low,volume,close\n1,2,3,4,5\n1,2,abc,4,5\n";
        let err = DataLoader::read_market_csv(csv.as_bytes(), "market.csv").unwrap_err();
        match err {
            MLError::DataFormat(msg) => assert!(msg.contains("第 3 行"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_values_name_line() {
        let csv = "open,high,low,volume,close\n1,2,0.5,NaN,1\ninf,2,1,3,4\n";
        match DataLoader::read_market_csv(csv.as_bytes(), "market.csv").unwrap_err() {
            MLError::DataFormat(msg) => {
                assert!(msg.contains("第 2 行"), "{msg}");
                assert!(msg.contains("volume"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let csv = "open,high,low,volume,close\n1,2,0.5,3,1\n-inf,2,1,3,4\n";
        match DataLoader::read_market_csv(csv.as_bytes(), "market.csv").unwrap_err() {
            MLError::DataFormat(msg) => {
                assert!(msg.contains("第 3 行"), "{msg}");
                assert!(msg.contains("open"), "{msg}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_read_text_csv() {
        let csv = "text,sentiment\n\"Great quarter, strong growth\",1\nweak guidance,negative\n";
        let records = DataLoader::read_text_csv(csv.as_bytes(), "sentiment.csv").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Great quarter, strong growth");
        assert_eq!(records[1].sentiment, "negative");
    }

    #[test]
    fn test_raw_records_csv_and_json() {
        let csv = "price,volume\n100,10\n,20\nnan,\n";
        let rows = DataLoader::read_raw_records_csv(csv.as_bytes(), "raw.csv").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].price, Some(RawValue::Text("100".to_string())));
        assert_eq!(rows[1].price, None);
        assert_eq!(rows[2].volume, None);

        let json = r#"[{"price": 100, "volume": "10"}, {"volume": 5}]"#;
        let rows = DataLoader::parse_raw_records_json(json).unwrap();
        assert_eq!(rows[0].price, Some(RawValue::Number(100.0)));
        assert_eq!(rows[0].volume, Some(RawValue::Text("10".to_string())));
        assert_eq!(rows[1].price, None);

        assert!(DataLoader::parse_raw_records_json(r#"{"price": 1}"#).is_err());
    }

    #[test]
    fn test_load_raw_records_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("records.json");
        std::fs::write(&json_path, r#"[{"price": "1.5", "volume": 2}]"#).unwrap();
        assert_eq!(DataLoader::load_raw_records(&json_path).unwrap().len(), 1);

        let csv_path = dir.path().join("records.csv");
        std::fs::write(&csv_path, "price,volume\n1,2\n3,4\n").unwrap();
        assert_eq!(DataLoader::load_raw_records(&csv_path).unwrap().len(), 2);
    }
}
