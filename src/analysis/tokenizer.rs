use tantivy::tokenizer::{Token as TantivyToken, TokenStream, Tokenizer};
use tantivy::Index;

use super::{Analyzer, Tokens};

/// Name the analyzer is registered under on the index.
pub const TOKENIZER_NAME: &str = "markup";

/// Adapts [`Analyzer`] to tantivy's tokenizer interface.
#[derive(Debug, Clone, Default)]
pub struct MarkupTokenizer {
    analyzer: Analyzer,
}

impl Tokenizer for MarkupTokenizer {
    type TokenStream<'a> = MarkupTokenStream<'a>;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> Self::TokenStream<'a> {
        MarkupTokenStream {
            tokens: self.analyzer.tokenize(text),
            token: TantivyToken::default(),
        }
    }
}

pub struct MarkupTokenStream<'a> {
    tokens: Tokens<'a>,
    token: TantivyToken,
}

impl TokenStream for MarkupTokenStream<'_> {
    fn advance(&mut self) -> bool {
        match self.tokens.next() {
            Some(next) => {
                self.token.text = next.text;
                self.token.position = next.position;
                self.token.offset_from = next.offset_from;
                self.token.offset_to = next.offset_to;
                self.token.position_length = 1;
                true
            }
            None => false,
        }
    }

    fn token(&self) -> &TantivyToken {
        &self.token
    }

    fn token_mut(&mut self) -> &mut TantivyToken {
        &mut self.token
    }
}

/// Register the analyzer on `index` under [`TOKENIZER_NAME`].
pub fn register(index: &Index) {
    index
        .tokenizers()
        .register(TOKENIZER_NAME, MarkupTokenizer::default());
}
