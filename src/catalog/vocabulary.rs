//! Static vocabulary shared by entity and column resolution.

/// Tokens that never name a schema entity
pub const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "be", "by", "can", "do", "does", "did", "each",
    "for", "from", "get", "give", "has", "have", "had", "how", "i", "in", "is", "it", "its", "list",
    "many", "me", "much", "my", "number", "of", "on", "or", "our", "per", "please", "show", "than",
    "that", "the", "their", "there", "these", "this", "those", "to", "us", "was", "we", "were",
    "what", "which", "who", "whose", "with", "you",
];

/// Domain synonyms, keyed by the word as asked and mapped to the singular
/// entity name they stand for.
pub const ENTITY_SYNONYMS: &[(&str, &str)] = &[
    ("client", "customer"),
    ("user", "customer"),
    ("buyer", "customer"),
    ("shopper", "customer"),
    ("item", "product"),
    ("good", "product"),
    ("purchase", "order"),
];

/// Question words mapped to column-name fragments, in priority order.
pub const MEASURE_HINTS: &[(&[&str], &[&str])] = &[
    (
        &[
            "spending", "spend", "spent", "revenue", "sales", "sale", "paid", "pay", "earning",
            "earnings", "income", "value", "worth",
        ],
        &["total_amount", "amount", "total", "revenue", "value", "price"],
    ),
    (
        &["sold", "selling", "sell", "popular", "purchased", "bought", "quantity", "units", "volume"],
        &["quantity", "qty", "units"],
    ),
    (
        &["expensive", "cheap", "cheapest", "costly", "price", "priced", "cost", "costs"],
        &["price", "cost", "amount"],
    ),
    (&["stock", "inventory", "available"], &["stock", "quantity", "available"]),
    (&["rating", "rated", "score"], &["rating", "score"]),
];

/// Question words that pick the alias of a summed measure
pub const SPENDING_WORDS: &[&str] = &["spending", "spend", "spent", "paid", "revenue", "sales"];
pub const SOLD_WORDS: &[&str] = &["sold", "selling", "sell", "popular", "purchased", "bought"];

/// Columns that hold a place name, most specific first
pub const LOCATION_COLUMNS: &[&str] = &["country", "state", "region", "city", "location"];

/// Spelled-out quantities
pub const NUMBER_WORDS: &[(&str, u64)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
    ("fifty", 50),
    ("hundred", 100),
];

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

pub fn synonym_for(word: &str) -> Option<&'static str> {
    ENTITY_SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == word)
        .map(|(_, canonical)| *canonical)
}

pub fn number_word(word: &str) -> Option<u64> {
    NUMBER_WORDS.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
}
