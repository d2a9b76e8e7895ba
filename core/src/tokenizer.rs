use crate::scoring::Query;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Punctuation never matches, so it is dropped along with whitespace.
    static ref WORD: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "i","me","my","myself","we","our","ours","ourselves","you","you're","you've","you'll","you'd",
            "your","yours","yourself","yourselves","he","him","his","himself","she","she's","her","hers",
            "herself","it","it's","its","itself","they","them","their","theirs","themselves",
            "what","which","who","whom","this","that","that'll","these","those",
            "am","is","are","was","were","be","been","being","have","has","had","having","do","does","did","doing",
            "a","an","the","and","but","if","or","because","as","until","while",
            "of","at","by","for","with","about","against","between","into","through","during","before","after",
            "above","below","to","from","up","down","in","out","on","off","over","under",
            "again","further","then","once","here","there","when","where","why","how",
            "all","any","both","each","few","more","most","other","some","such",
            "no","nor","not","only","own","same","so","than","too","very",
            "s","t","can","will","just","don","don't","should","should've","now",
            "d","ll","m","o","re","ve","y",
            "ain","aren","aren't","couldn","couldn't","didn","didn't","doesn","doesn't","hadn","hadn't",
            "hasn","hasn't","haven","haven't","isn","isn't","ma","mightn","mightn't","mustn","mustn't",
            "needn","needn't","shan","shan't","shouldn","shouldn't","wasn","wasn't","weren","weren't",
            "won","won't","wouldn","wouldn't",
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Analyze text into stemmed `(term, position)` pairs.
///
/// NFKC-normalizes and lowercases, extracts word tokens, drops stopwords and
/// stems the rest (Snowball English). Positions count every extracted word, so a
/// dropped stopword leaves a gap the same way it does in the indexed documents.
pub fn tokenize(text: &str) -> Vec<(String, usize)> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    WORD.find_iter(&normalized)
        .enumerate()
        .filter(|(_, m)| !is_stopword(m.as_str()))
        .map(|(pos, m)| (STEMMER.stem(m.as_str()).into_owned(), pos))
        .collect()
}

/// Analyze a query description with the same pipeline used for documents.
pub fn analyze_query(text: &str) -> Query {
    tokenize(text).into_iter().map(|(term, _)| term).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_keep_stopword_gaps() {
        let t = tokenize("The fox and the dog");
        assert_eq!(t, vec![("fox".to_string(), 1), ("dog".to_string(), 4)]);
    }

    #[test]
    fn query_keeps_order_and_repeats() {
        let q = analyze_query("Foxes, foxes! Where are the dogs?");
        assert_eq!(q.terms(), &["fox", "fox", "dog"]);
    }
}
