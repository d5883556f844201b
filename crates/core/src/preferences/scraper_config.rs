use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperSource {
    pub id: String,
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperRegionConfig {
    pub id: String,
    pub name: String,
    pub keywords: Vec<String>,
    pub sources: Vec<ScraperSource>,
    pub scrape_depth: u8,
}

/// Per-region scraper settings, one entry per supported region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScraperConfig {
    pub eu: ScraperRegionConfig,
    pub tr: ScraperRegionConfig,
}

const DEFAULT_KEYWORDS: [&str; 3] = ["fenerbahce", "galatasaray", "tedesco"];

const EU_SOURCES: [(&str, &str, &str); 17] = [
    ("lequipe", "L'Équipe", "https://www.lequipe.fr/Football/"),
    ("francefootball", "France Football", "https://www.francefootball.fr/"),
    ("rmcsport", "RMC Sport", "https://rmcsport.bfmtv.com/"),
    ("footmercato", "Foot Mercato", "https://www.footmercato.net/"),
    ("leparisien", "Le Parisien", "https://www.leparisien.fr/sports/football/"),
    ("gazzetta", "Gazzetta dello Sport", "https://www.gazzetta.it/Calcio/Estero/"),
    ("corriere", "Corriere dello Sport", "https://www.corrieredellosport.it/calcio/calcio-estero"),
    ("tuttosport", "Tuttosport", "https://www.tuttosport.com/"),
    ("calciomercato", "Calciomercato", "https://www.calciomercato.com/"),
    ("skysports", "Sky Sports", "https://www.skysports.com/football"),
    ("bbc", "BBC Sport", "https://www.bbc.com/sport/football"),
    ("espn", "ESPN", "https://www.espn.co.uk/football/"),
    ("telegraph", "The Telegraph", "https://www.telegraph.co.uk/football/"),
    ("sport1", "Sport1", "https://www.sport1.de/channel/transfermarkt"),
    ("kicker", "Kicker", "https://www.kicker.de/"),
    ("sport_de", "Sport.de", "https://www.sport.de/fussball/magazin/"),
    ("sky_de", "Sky DE", "https://sport.sky.de/fussball/"),
];

const TR_SOURCES: [(&str, &str, &str); 4] = [
    ("fanatik", "Fanatik", "https://www.fanatik.com.tr"),
    ("ntvspor", "NTV Spor", "https://www.ntvspor.net/"),
    ("skor", "Skor Gazetesi", "https://www.skorgazetesi.com"),
    ("beinsports", "beIN SPORTS", "https://beinsports.com.tr"),
];

fn region(id: &str, name: &str, sources: &[(&str, &str, &str)]) -> ScraperRegionConfig {
    ScraperRegionConfig {
        id: id.to_string(),
        name: name.to_string(),
        keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        sources: sources
            .iter()
            .map(|(id, name, url)| ScraperSource {
                id: id.to_string(),
                name: name.to_string(),
                url: url.to_string(),
                enabled: true,
            })
            .collect(),
        scrape_depth: 1,
    }
}

impl Default for UserScraperConfig {
    fn default() -> Self {
        Self {
            eu: region("eu", "European Sources", &EU_SOURCES),
            tr: region("tr", "Turkish Sources", &TR_SOURCES),
        }
    }
}
