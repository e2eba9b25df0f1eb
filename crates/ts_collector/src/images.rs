use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use ts_core::{Category, Error, ImageResolver, Result};

const UNSPLASH_BASE_URL: &str = "https://api.unsplash.com";
const MAX_KEYWORDS: usize = 5;

const TECHNOLOGY_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1518770660439-4636190af475?w=800",
    "https://images.unsplash.com/photo-1526374965328-7f61d4dc18c5?w=800",
    "https://images.unsplash.com/photo-1550751827-4bd374c3f58b?w=800",
];
const CULTURE_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1603190287605-e6ade32fa852?w=800",
    "https://images.unsplash.com/photo-1598899134739-24c46f58b8c0?w=800",
    "https://images.unsplash.com/photo-1470229722913-7c0e2dbbafd3?w=800",
];
const BUSINESS_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1507679799987-c73779587ccf?w=800",
    "https://images.unsplash.com/photo-1486406146926-c627a92ad1ab?w=800",
    "https://images.unsplash.com/photo-1664575602554-2087b04935a5?w=800",
];
const SPORTS_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1461896836934-ffe607ba8211?w=800",
    "https://images.unsplash.com/photo-1579952363873-27f3bade9f55?w=800",
    "https://images.unsplash.com/photo-1535131749006-b7f58c99034b?w=800",
];
const POLITICS_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1529107386315-e1a2ed48a620?w=800",
    "https://images.unsplash.com/photo-1541872703-74c5e44368f9?w=800",
    "https://images.unsplash.com/photo-1575320181282-9afab399332c?w=800",
];
const HEALTH_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1505751172876-fa1923c5c528?w=800",
    "https://images.unsplash.com/photo-1532938911079-1b06ac7ceec7?w=800",
    "https://images.unsplash.com/photo-1506126613408-eca07ce68773?w=800",
];
const MISCELLANEOUS_IMAGES: &[&str] = &[
    "https://images.unsplash.com/photo-1507842217343-583bb7270b66?w=800",
    "https://images.unsplash.com/photo-1618005182384-a83a8bd57fbe?w=800",
    "https://images.unsplash.com/photo-1485827404703-89b55fcc595e?w=800",
];

const STOP_WORDS: &[&str] = &[
    "the", "and", "about", "from", "with", "that", "this", "these", "those", "have", "been",
    "being", "were", "does", "then", "else", "when", "into", "over", "what", "will", "their",
];

pub fn fallback_images(category: Category) -> &'static [&'static str] {
    match category {
        Category::Technology => TECHNOLOGY_IMAGES,
        Category::Culture => CULTURE_IMAGES,
        Category::Business => BUSINESS_IMAGES,
        Category::Sports => SPORTS_IMAGES,
        Category::Politics => POLITICS_IMAGES,
        Category::Health => HEALTH_IMAGES,
        Category::Fashion | Category::Miscellaneous => MISCELLANEOUS_IMAGES,
    }
}

/// Same title, same image.
pub fn fallback_image(title: &str, category: Category) -> &'static str {
    let images = fallback_images(category);
    let hash = title
        .bytes()
        .fold(2166136261u32, |h, b| (h ^ b as u32).wrapping_mul(16777619));
    images[hash as usize % images.len()]
}

/// Distinct significant words of the title, in order.
pub fn title_keywords(title: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in title.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.chars().count() > 3
            && !STOP_WORDS.contains(&word.as_str())
            && !keywords.contains(&word)
        {
            keywords.push(word);
        }
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Deserialize)]
struct PhotoUrls {
    regular: String,
}

/// Unsplash search by title keywords, then by category, then the fixed list.
pub struct UnsplashResolver {
    client: Client,
    access_key: Option<String>,
    base_url: String,
}

impl UnsplashResolver {
    pub fn new(access_key: Option<String>) -> Self {
        if access_key.is_none() {
            info!("Using fallback images only (UNSPLASH_ACCESS_KEY not set)");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            access_key,
            base_url: UNSPLASH_BASE_URL.to_string(),
        }
    }

    async fn search(&self, access_key: &str, query: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/search/photos", self.base_url))
            .header("Authorization", format!("Client-ID {}", access_key))
            .query(&[("query", query), ("per_page", "1"), ("orientation", "landscape")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Collection(format!("Unsplash returned {}", status)));
        }
        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().next().map(|p| p.urls.regular))
    }
}

#[async_trait]
impl ImageResolver for UnsplashResolver {
    async fn resolve(&self, title: &str, category: Category) -> String {
        if let Some(access_key) = &self.access_key {
            let mut queries = title_keywords(title);
            queries.push(category.as_str().to_string());
            for query in queries {
                match self.search(access_key, &query).await {
                    Ok(Some(url)) => {
                        debug!("Found image for '{}'", query);
                        return url;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Error fetching image from Unsplash: {}", e);
                        break;
                    }
                }
            }
        }
        fallback_image(title, category).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_deterministic() {
        let first = fallback_image("The Future of AI", Category::Technology);
        assert_eq!(first, fallback_image("The Future of AI", Category::Technology));
        assert!(TECHNOLOGY_IMAGES.contains(&first));
        assert!(MISCELLANEOUS_IMAGES.contains(&fallback_image("Runway", Category::Fashion)));
    }

    #[test]
    fn test_title_keywords() {
        assert_eq!(
            title_keywords("The Future of Artificial Intelligence: what the future holds"),
            vec!["future", "artificial", "intelligence", "holds"]
        );
    }

    #[tokio::test]
    async fn test_without_key_uses_fallback() {
        let resolver = UnsplashResolver::new(None);
        let url = resolver.resolve("Election night", Category::Politics).await;
        assert!(POLITICS_IMAGES.contains(&url.as_str()));
    }
}
