//! 文本处理：分词编码和词典极性

pub mod polarity;
pub mod tokenizer;

pub use polarity::PolarityAnalyzer;
pub use tokenizer::Tokenizer;
