use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{Language, LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

/// Pre-tokenized corpus text: tokens are joined with single spaces.
pub const CORPUS_TOKENIZER: &str = "corpus_whitespace";

pub const ROW_FIELD: &str = "row";
pub const TOKENS_FIELD: &str = "tokens";

pub fn build_corpus_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_u64_field(ROW_FIELD, STORED);
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(CORPUS_TOKENIZER)
        .set_index_option(IndexRecordOption::WithFreqs);
    schema_builder.add_text_field(TOKENS_FIELD, TextOptions::default().set_indexing_options(indexing));
    schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
    let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default()).build();
    index.tokenizers().register(CORPUS_TOKENIZER, tokenizer);
}

/// Word analyzer for term-frequency retrieval: alphanumeric runs, lowercased,
/// with tantivy's English stop list (Lucene's 33 words) removed.
pub fn english_analyzer() -> TextAnalyzer {
    let stop_words = StopWordFilter::new(Language::English).unwrap_or_else(|| StopWordFilter::remove(Vec::<String>::new()));
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .filter(stop_words)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tantivy::tokenizer::TokenStream;

    fn words(text: &str) -> Vec<String> {
        let mut analyzer = english_analyzer();
        let mut stream = analyzer.token_stream(text);
        let mut out = Vec::new();
        while stream.advance() {
            out.push(stream.token().text.clone());
        }
        out
    }

    #[test]
    fn english_stop_list_is_applied() {
        assert_eq!(words("Such a claim falls into the Tribunal's jurisdiction"), vec!["claim", "falls", "tribunal", "s", "jurisdiction"]);
    }
}
