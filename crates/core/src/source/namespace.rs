use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::article::SourceType;

use super::dates::format_date;

/// Regions the scrapers publish batches for.
pub const KNOWN_REGIONS: [&str; 2] = ["eu", "tr"];
pub const ALL_REGIONS: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown region '{0}', expected one of eu, tr, all")]
pub struct UnknownRegion(pub String);

/// A validated region selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Region {
    All,
    Named(String),
}

impl Region {
    pub fn as_str(&self) -> &str {
        match self {
            Region::All => ALL_REGIONS,
            Region::Named(name) => name,
        }
    }

    /// Concrete regions covered by this selector.
    pub fn expand(&self) -> Vec<&str> {
        match self {
            Region::All => KNOWN_REGIONS.to_vec(),
            Region::Named(name) => vec![name.as_str()],
        }
    }
}

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == ALL_REGIONS {
            return Ok(Region::All);
        }
        if KNOWN_REGIONS.contains(&trimmed) {
            Ok(Region::Named(trimmed.to_string()))
        } else {
            Err(UnknownRegion(s.to_string()))
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-prefix convention of one producing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Scraper batch-prediction output, partitioned by region.
    ScrapedBatch,
    /// Raw news-API ingestion.
    ApiIngestion,
    /// Ingestion after enrichment/classification.
    EnrichedIngestion,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [
        Namespace::ScrapedBatch,
        Namespace::ApiIngestion,
        Namespace::EnrichedIngestion,
    ];

    pub fn source_type(self) -> SourceType {
        match self {
            Namespace::ScrapedBatch => SourceType::Scraped,
            Namespace::ApiIngestion => SourceType::Api,
            Namespace::EnrichedIngestion => SourceType::Processed,
        }
    }

    /// Object-store prefixes holding this namespace's files for one date.
    pub fn prefixes(self, region: &Region, date: NaiveDate) -> Vec<String> {
        let day = format_date(date);
        match self {
            Namespace::ScrapedBatch => {
                let month = date.format("%Y-%m").to_string();
                region
                    .expand()
                    .into_iter()
                    .map(|r| format!("batch_processing/{r}/{month}/{day}/"))
                    .collect()
            }
            Namespace::ApiIngestion => vec![format!("ingestion/api/{day}/")],
            Namespace::EnrichedIngestion => vec![format!("ingestion/{day}/")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
    }

    #[test]
    fn parse_regions() {
        assert_eq!("eu".parse::<Region>().unwrap(), Region::Named("eu".into()));
        assert_eq!("all".parse::<Region>().unwrap(), Region::All);
        assert_eq!("".parse::<Region>().unwrap(), Region::All);
        assert_eq!("EU".parse::<Region>().unwrap_err(), UnknownRegion("EU".into()));
        assert!("us".parse::<Region>().is_err());
    }

    #[test]
    fn scraped_prefix_is_region_partitioned() {
        let eu = Region::Named("eu".into());
        assert_eq!(
            Namespace::ScrapedBatch.prefixes(&eu, date()),
            ["batch_processing/eu/2025-01/2025-01-02/"]
        );
        assert_eq!(
            Namespace::ScrapedBatch.prefixes(&Region::All, date()),
            [
                "batch_processing/eu/2025-01/2025-01-02/",
                "batch_processing/tr/2025-01/2025-01-02/"
            ]
        );
    }

    #[test]
    fn ingestion_prefixes_ignore_region() {
        let tr = Region::Named("tr".into());
        assert_eq!(Namespace::ApiIngestion.prefixes(&tr, date()), ["ingestion/api/2025-01-02/"]);
        assert_eq!(Namespace::EnrichedIngestion.prefixes(&tr, date()), ["ingestion/2025-01-02/"]);
    }

    #[test]
    fn namespaces_map_to_provenance() {
        assert_eq!(Namespace::ScrapedBatch.source_type(), SourceType::Scraped);
        assert_eq!(Namespace::ApiIngestion.source_type(), SourceType::Api);
        assert_eq!(Namespace::EnrichedIngestion.source_type(), SourceType::Processed);
    }
}
