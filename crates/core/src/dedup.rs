use std::collections::HashSet;

use crate::article::Article;
use crate::source::namespace::ALL_REGIONS;

/// Drop later articles whose [`Article::dedup_key`] was already seen.
///
/// First occurrence wins, so which duplicate survives depends purely on
/// arrival order (i.e. fetch order), not on content quality. Articles
/// without a key are always kept. Relative order is preserved.
pub fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let mut seen: HashSet<String> = HashSet::with_capacity(articles.len());
    let before = articles.len();

    let kept: Vec<Article> = articles
        .into_iter()
        .filter(|article| match article.dedup_key() {
            Some(key) => seen.insert(key.to_string()),
            None => true,
        })
        .collect();

    tracing::debug!(before, after = kept.len(), "Deduplicated articles");
    kept
}

/// Keep articles whose `region` equals `region` exactly. Empty or `all`
/// passes everything through.
pub fn filter_region(articles: Vec<Article>, region: &str) -> Vec<Article> {
    if region.is_empty() || region == ALL_REGIONS {
        return articles;
    }
    articles.into_iter().filter(|a| a.region == region).collect()
}

/// Case-insensitive substring match on title, summary, and source.
pub fn filter_search(articles: Vec<Article>, query: &str) -> Vec<Article> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return articles;
    }
    articles
        .into_iter()
        .filter(|a| {
            [&a.title, &a.summary, &a.source]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
