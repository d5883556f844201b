pub mod model;
pub mod normalize;

pub use model::{infer_region, Article, Category, ContentQuality, KeyEntities, SourceType};
pub use normalize::{normalize_article, NormalizeError};
