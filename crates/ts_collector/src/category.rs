use ts_core::Category;

/// Keyword sets checked in order; the first category with a keyword
/// contained in the topic wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Technology,
        &[
            "tech", "technology", "ai", "software", "hardware", "digital", "computer",
            "internet", "app", "artificial intelligence",
        ],
    ),
    (
        Category::Culture,
        &[
            "culture", "art", "music", "film", "entertainment", "movie", "tv", "television",
            "book", "literature",
        ],
    ),
    (
        Category::Business,
        &[
            "business", "economy", "finance", "market", "stock", "investment", "company",
            "startup", "entrepreneur",
        ],
    ),
    (
        Category::Fashion,
        &[
            "fashion", "style", "clothing", "design", "trend", "wear", "apparel", "luxury",
            "brand",
        ],
    ),
    (
        Category::Sports,
        &[
            "sports", "game", "athlete", "football", "basketball", "soccer", "tennis",
            "baseball", "olympics",
        ],
    ),
    (
        Category::Politics,
        &[
            "politics", "government", "policy", "election", "president", "congress", "senate",
            "law", "vote",
        ],
    ),
    (
        Category::Health,
        &[
            "health", "medical", "wellness", "healthcare", "disease", "medicine", "doctor",
            "hospital", "fitness",
        ],
    ),
];

pub fn classify_topic(topic: &str) -> Category {
    let topic = topic.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| topic.contains(k)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Miscellaneous)
}

/// A valid requested category wins over classification.
pub fn resolve_category(topic: &str, requested: Option<&str>) -> Category {
    requested
        .and_then(|c| c.parse().ok())
        .unwrap_or_else(|| classify_topic(topic))
}
