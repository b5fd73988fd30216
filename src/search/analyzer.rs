//! Script detection and tokenization pipelines
//!
//! Articles mix Chinese and English freely, so the index registers a single
//! script-aware analyzer:
//!
//! ```text
//!   text ──► split into script runs
//!              ├─ CJK ideographs ──► jieba search-mode segmentation
//!              └─ everything else ─► split on non-alphanumeric chars
//!          ──► drop tokens >= 40 bytes ──► lowercase ──► English stop words
//! ```
//!
//! The `cjk` and `latin` pipelines returned by [`select_analyzer`] produce
//! the same tokens as the index analyzer for the text they are selected for,
//! so highlighting never disagrees with what was indexed.

use jieba_rs::Jieba;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tantivy::tokenizer::{
    LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, Token,
    TokenStream, Tokenizer, TokenizerManager,
};

/// Analyzer applied to every indexed text field
pub const MULTILINGUAL_ANALYZER: &str = "multilingual";
/// Analyzer selected for text containing CJK ideographs
pub const CJK_ANALYZER: &str = "cjk";
/// Analyzer selected for text without CJK ideographs
pub const LATIN_ANALYZER: &str = "latin";

const MAX_TOKEN_BYTES: usize = 40;

/// English stop words removed by every pipeline
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

static JIEBA: Lazy<Jieba> = Lazy::new(Jieba::new);

/// Writing system detected in a piece of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Script {
    Cjk,
    Latin,
}

impl Script {
    /// Name of the analyzer used for this script
    pub fn analyzer_name(self) -> &'static str {
        match self {
            Script::Cjk => CJK_ANALYZER,
            Script::Latin => LATIN_ANALYZER,
        }
    }
}

/// Whether `ch` is a unified CJK ideograph (U+4E00..=U+9FA5)
pub fn is_cjk(ch: char) -> bool {
    matches!(ch, '\u{4e00}'..='\u{9fa5}')
}

/// Whether the text contains at least one CJK ideograph
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Classify text by the presence of any CJK ideograph
pub fn classify(text: &str) -> Script {
    if contains_cjk(text) {
        Script::Cjk
    } else {
        Script::Latin
    }
}

/// Tokenizer that segments CJK runs with jieba and splits other runs on
/// non-alphanumeric characters
#[derive(Clone, Default)]
pub struct ScriptAwareTokenizer;

impl Tokenizer for ScriptAwareTokenizer {
    type TokenStream<'a> = VecTokenStream;

    fn token_stream<'a>(&mut self, text: &'a str) -> Self::TokenStream<'a> {
        VecTokenStream {
            tokens: segment(text),
            index: 0,
        }
    }
}

/// Token stream over pre-computed tokens
pub struct VecTokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream for VecTokenStream {
    fn advance(&mut self) -> bool {
        if self.index < self.tokens.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.index - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.index - 1]
    }
}

fn segment(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut run_start = 0;
    let mut run_script: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let cjk = is_cjk(ch);
        if let Some(prev) = run_script {
            if prev != cjk {
                push_run(text, run_start, idx, prev, &mut tokens);
                run_start = idx;
            }
        }
        run_script = Some(cjk);
    }
    if let Some(prev) = run_script {
        push_run(text, run_start, text.len(), prev, &mut tokens);
    }

    for (position, token) in tokens.iter_mut().enumerate() {
        token.position = position;
    }
    tokens
}

fn push_run(text: &str, start: usize, end: usize, cjk: bool, tokens: &mut Vec<Token>) {
    let run = &text[start..end];
    if cjk {
        let base = run.as_ptr() as usize;
        for word in JIEBA.cut_for_search(run, false) {
            if !word.chars().any(char::is_alphanumeric) {
                continue;
            }
            // jieba returns sub-slices of `run`
            let from = start + (word.as_ptr() as usize - base);
            tokens.push(make_token(word, from, from + word.len()));
        }
    } else {
        let mut word_start: Option<usize> = None;
        for (idx, ch) in run.char_indices() {
            match (ch.is_alphanumeric(), word_start) {
                (true, None) => word_start = Some(idx),
                (false, Some(ws)) => {
                    tokens.push(make_token(&run[ws..idx], start + ws, start + idx));
                    word_start = None;
                }
                _ => {}
            }
        }
        if let Some(ws) = word_start {
            tokens.push(make_token(&run[ws..], start + ws, end));
        }
    }
}

fn make_token(text: &str, offset_from: usize, offset_to: usize) -> Token {
    Token {
        offset_from,
        offset_to,
        position: 0,
        text: text.to_string(),
        position_length: 1,
    }
}

fn stop_words() -> StopWordFilter {
    StopWordFilter::remove(ENGLISH_STOP_WORDS.iter().map(|word| word.to_string()))
}

/// Index-time analyzer for all article text fields
pub fn multilingual_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(ScriptAwareTokenizer)
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .filter(LowerCaser)
        .filter(stop_words())
        .build()
}

/// Pipeline for text containing CJK ideographs
pub fn cjk_analyzer() -> TextAnalyzer {
    multilingual_analyzer()
}

/// Pipeline for Latin-script text: case folding plus stop-word removal
pub fn latin_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .filter(LowerCaser)
        .filter(stop_words())
        .build()
}

/// Pick the pipeline for `text` by its script
pub fn select_analyzer(text: &str) -> TextAnalyzer {
    match classify(text) {
        Script::Cjk => cjk_analyzer(),
        Script::Latin => latin_analyzer(),
    }
}

/// Register every analyzer on a tokenizer manager
pub fn register_analyzers(manager: &TokenizerManager) {
    manager.register(MULTILINGUAL_ANALYZER, multilingual_analyzer());
    manager.register(CJK_ANALYZER, cjk_analyzer());
    manager.register(LATIN_ANALYZER, latin_analyzer());
}

/// A token with its byte span in the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
    pub text: String,
    pub offset_from: usize,
    pub offset_to: usize,
}

/// Run `text` through an analyzer and collect the tokens
pub fn analyze(analyzer: &mut TextAnalyzer, text: &str) -> Vec<AnalyzedToken> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        let token = stream.token();
        tokens.push(AnalyzedToken {
            text: token.text.clone(),
            offset_from: token.offset_from,
            offset_to: token.offset_to,
        });
    }
    tokens
}

/// Token texts only
pub fn analyze_terms(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    analyze(analyzer, text).into_iter().map(|t| t.text).collect()
}
