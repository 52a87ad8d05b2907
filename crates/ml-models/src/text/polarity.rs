//! 基于词典的情感极性打分，不需要训练

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").expect("valid word regex"));

/// 否定词之后下一个打分词的系数
const NEGATION_FACTOR: f64 = -0.5;

const NEGATIONS: &[&str] = &["not", "no", "never", "nor", "without", "cannot"];

/// 极性分析器
#[derive(Debug, Clone)]
pub struct PolarityAnalyzer {
    lexicon: HashMap<String, f64>,
}

impl Default for PolarityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityAnalyzer {
    pub fn new() -> Self {
        let positive = [
            ("bullish", 0.8),
            ("bull", 0.6),
            ("surge", 0.8),
            ("soar", 0.8),
            ("rally", 0.8),
            ("gain", 0.6),
            ("gains", 0.6),
            ("rise", 0.5),
            ("profit", 0.6),
            ("profits", 0.6),
            ("growth", 0.6),
            ("positive", 0.5),
            ("good", 0.7),
            ("great", 0.8),
            ("excellent", 1.0),
            ("strong", 0.5),
            ("beat", 0.5),
            ("outperform", 0.6),
            ("upgrade", 0.6),
            ("success", 0.7),
            ("record", 0.4),
            ("love", 0.5),
            ("happy", 0.8),
            ("best", 1.0),
            ("optimistic", 0.6),
        ];
        let negative = [
            ("bearish", -0.8),
            ("bear", -0.6),
            ("crash", -1.0),
            ("plunge", -1.0),
            ("drop", -0.6),
            ("fall", -0.6),
            ("fell", -0.6),
            ("loss", -0.6),
            ("losses", -0.6),
            ("negative", -0.3),
            ("bad", -0.7),
            ("poor", -0.4),
            ("terrible", -1.0),
            ("worst", -1.0),
            ("weak", -0.4),
            ("scam", -1.0),
            ("fraud", -1.0),
            ("risk", -0.4),
            ("decline", -0.6),
            ("miss", -0.4),
            ("downgrade", -0.6),
            ("crisis", -0.8),
            ("panic", -0.8),
            ("fear", -0.6),
            ("hate", -0.8),
            ("uncertain", -0.4),
        ];

        Self {
            lexicon: positive
                .into_iter()
                .chain(negative)
                .map(|(w, s)| (w.to_string(), s))
                .collect(),
        }
    }

    /// 增加或覆盖词典中的词
    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (word, score) in words {
            self.lexicon
                .insert(word.into().to_lowercase(), score.clamp(-1.0, 1.0));
        }
        self
    }

    fn is_negation(word: &str) -> bool {
        NEGATIONS.contains(&word) || word.ends_with("n't")
    }

    /// 极性分数，范围 [-1, 1]；没有打分词时为 0
    pub fn polarity(&self, text: &str) -> f64 {
        // 弯撇号统一为 ASCII 撇号，"isn’t" 与 "isn't" 一样识别为否定
        let lowered = text.to_lowercase().replace('\u{2019}', "'");
        let mut total = 0.0;
        let mut scored = 0usize;
        let mut negated = false;

        for word in WORD_REGEX.find_iter(&lowered).map(|m| m.as_str()) {
            if Self::is_negation(word) {
                negated = true;
                continue;
            }
            if let Some(&score) = self.lexicon.get(word) {
                total += if negated { score * NEGATION_FACTOR } else { score };
                scored += 1;
                negated = false;
            }
        }

        if scored == 0 {
            0.0
        } else {
            (total / scored as f64).clamp(-1.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_sign() {
        let analyzer = PolarityAnalyzer::new();
        assert!(analyzer.polarity("Great earnings, strong growth!") > 0.0);
        assert!(analyzer.polarity("Shares crash after fraud charges") < 0.0);
    }

    #[test]
    fn test_neutral_and_empty() {
        let analyzer = PolarityAnalyzer::new();
        assert_eq!(analyzer.polarity(""), 0.0);
        assert_eq!(analyzer.polarity("the company reported on tuesday"), 0.0);
    }

    #[test]
    fn test_negation_flips_next_word() {
        let analyzer = PolarityAnalyzer::new();
        assert!((analyzer.polarity("good") - 0.7).abs() < 1e-12);
        assert!((analyzer.polarity("not good") + 0.35).abs() < 1e-12);
        assert!(analyzer.polarity("It isn't bad") > 0.0);
        assert!(analyzer.polarity("It isn\u{2019}t good") < 0.0);
        assert_eq!(
            analyzer.polarity("Sales don\u{2019}t look good"),
            analyzer.polarity("Sales don't look good")
        );
        // 否定只作用于下一个打分词
        assert!((analyzer.polarity("not good, great") - (0.8 - 0.35) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_range_and_custom_words() {
        let analyzer = PolarityAnalyzer::new().with_words([("Moon", 5.0)]);
        let score = analyzer.polarity("to the moon moon moon");
        assert!((score - 1.0).abs() < 1e-12);
        assert!((-1.0..=1.0).contains(&analyzer.polarity("worst crash ever, terrible")));
    }
}
