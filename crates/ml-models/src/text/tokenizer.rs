//! 词表分词器
//!
//! 文本先转小写，标点和制表/换行替换为空格后按空格切分。词按出现次数
//! 从高到低编号（次数相同按首次出现顺序），编号从 1 开始，0 留给填充。
//! 编码时只保留编号小于 `num_words` 的词。

use crate::types::{MLError, MLResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 切词前替换为空格的字符
const FILTERS: &str = "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n";

/// 序列化形式：配置和按首次出现顺序排列的词频
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenizerState {
    num_words: usize,
    sequence_length: usize,
    word_counts: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TokenizerState", into = "TokenizerState")]
pub struct Tokenizer {
    num_words: usize,
    sequence_length: usize,
    word_counts: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
    word_index: HashMap<String, usize>,
}

impl From<TokenizerState> for Tokenizer {
    fn from(state: TokenizerState) -> Self {
        let positions = state
            .word_counts
            .iter()
            .enumerate()
            .map(|(i, (word, _))| (word.clone(), i))
            .collect();
        let mut tokenizer = Self {
            num_words: state.num_words,
            sequence_length: state.sequence_length,
            word_counts: state.word_counts,
            positions,
            word_index: HashMap::new(),
        };
        tokenizer.rebuild_index();
        tokenizer
    }
}

impl From<Tokenizer> for TokenizerState {
    fn from(tokenizer: Tokenizer) -> Self {
        Self {
            num_words: tokenizer.num_words,
            sequence_length: tokenizer.sequence_length,
            word_counts: tokenizer.word_counts,
        }
    }
}

impl Tokenizer {
    /// `num_words` 为词表上限（含 0 号填充位），`sequence_length` 为编码后的长度
    pub fn new(num_words: usize, sequence_length: usize) -> MLResult<Self> {
        if num_words < 2 {
            return Err(MLError::InvalidConfig(format!(
                "词表上限至少为 2: {num_words}"
            )));
        }
        if sequence_length == 0 {
            return Err(MLError::InvalidConfig("序列长度必须大于 0".to_string()));
        }
        Ok(Self {
            num_words,
            sequence_length,
            word_counts: Vec::new(),
            positions: HashMap::new(),
            word_index: HashMap::new(),
        })
    }

    /// 把文本切成词
    pub fn text_to_words(text: &str) -> Vec<String> {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .map(|c| if FILTERS.contains(c) { ' ' } else { c })
            .collect();
        cleaned
            .split(' ')
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// 累计词频并重新编号
    pub fn fit_on_texts<S: AsRef<str>>(&mut self, texts: &[S]) {
        for text in texts {
            for word in Self::text_to_words(text.as_ref()) {
                match self.positions.get(&word) {
                    Some(&pos) => self.word_counts[pos].1 += 1,
                    None => {
                        self.positions.insert(word.clone(), self.word_counts.len());
                        self.word_counts.push((word, 1));
                    }
                }
            }
        }
        self.rebuild_index();
        tracing::debug!("分词器词表大小: {}", self.word_index.len());
    }

    fn rebuild_index(&mut self) {
        let mut ranked: Vec<&(String, usize)> = self.word_counts.iter().collect();
        // 稳定排序，次数相同保持首次出现顺序
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        self.word_index = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (word, _))| (word.clone(), i + 1))
            .collect();
    }

    pub fn is_fitted(&self) -> bool {
        !self.word_index.is_empty()
    }

    pub fn num_words(&self) -> usize {
        self.num_words
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// 编码结果中可能出现的最大索引加一
    pub fn vocab_size(&self) -> usize {
        self.num_words.min(self.word_index.len() + 1)
    }

    pub fn word_index(&self, word: &str) -> Option<usize> {
        self.word_index.get(word).copied()
    }

    /// 文本转索引序列，词表外和超出上限的词被丢弃
    pub fn texts_to_sequences<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<usize>> {
        texts
            .iter()
            .map(|text| {
                Self::text_to_words(text.as_ref())
                    .iter()
                    .filter_map(|word| self.word_index.get(word).copied())
                    .filter(|&idx| idx < self.num_words)
                    .collect()
            })
            .collect()
    }

    /// 前置填充 0，过长时保留末尾 `maxlen` 个索引
    pub fn pad_sequences(sequences: &[Vec<usize>], maxlen: usize) -> Array2<f64> {
        let mut padded = Array2::zeros((sequences.len(), maxlen));
        for (row, seq) in sequences.iter().enumerate() {
            let kept = &seq[seq.len().saturating_sub(maxlen)..];
            let offset = maxlen - kept.len();
            for (j, &idx) in kept.iter().enumerate() {
                padded[[row, offset + j]] = idx as f64;
            }
        }
        padded
    }

    /// 编码为 (文本数, sequence_length) 的索引矩阵
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> MLResult<Array2<f64>> {
        if !self.is_fitted() {
            return Err(MLError::ModelNotTrained("tokenizer"));
        }
        Ok(Self::pad_sequences(
            &self.texts_to_sequences(texts),
            self.sequence_length,
        ))
    }
}
