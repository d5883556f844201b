//! Article reconciliation for the newsroom dashboard: reads scraper and
//! news-API output from an object store, normalizes it into one article
//! shape, and serves deduplicated, cached, filtered feeds.

pub mod access;
pub mod article;
pub mod cache;
pub mod clock;
pub mod credentials;
pub mod dedup;
pub mod extract;
pub mod identity;
pub mod ownership;
pub mod preferences;
pub mod queue;
pub mod reconcile;
pub mod source;
pub mod storage;
pub mod trigger;

pub use article::Article;
pub use reconcile::{ArticleQuery, ReconcileError, ReconciliationService};
