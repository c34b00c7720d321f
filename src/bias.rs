//! Heuristic political-bias scoring.
//!
//! Used when an article first enters the cache and as the fallback when the
//! model's score cannot be parsed. Scores live on a [-10, 10] scale where
//! negative leans left and positive leans right.

use crate::models::SourceType;

/// Known outlets and their baseline leaning.
const SOURCE_BIAS: &[(&str, f64)] = &[
    ("CNN", -6.5),
    ("MSNBC", -7.8),
    ("New York Times", -5.2),
    ("Washington Post", -4.8),
    ("NPR", -3.5),
    ("BBC", -1.2),
    ("Reuters", 0.3),
    ("Associated Press", 0.1),
    ("Wall Street Journal", 3.8),
    ("Fox News", 7.2),
    ("Breitbart", 8.5),
    ("Daily Wire", 7.9),
];

const LIBERAL_KEYWORDS: &[&str] = &[
    "progressive",
    "equity",
    "climate change",
    "social justice",
    "diversity",
    "inclusion",
];

const CONSERVATIVE_KEYWORDS: &[&str] = &[
    "traditional",
    "freedom",
    "liberty",
    "tax cuts",
    "small government",
    "family values",
];

/// Score an article from its source name and text, clamped to [-10, 10].
pub fn heuristic_score(source: &str, title: &str, description: &str) -> f64 {
    let mut score = SOURCE_BIAS
        .iter()
        .find(|(name, _)| *name == source)
        .map(|(_, bias)| *bias)
        .unwrap_or(0.0);

    let text = format!("{} {}", title, description).to_lowercase();

    for keyword in LIBERAL_KEYWORDS {
        if text.contains(keyword) {
            score -= 0.5;
        }
    }

    for keyword in CONSERVATIVE_KEYWORDS {
        if text.contains(keyword) {
            score += 0.5;
        }
    }

    score.clamp(-10.0, 10.0)
}

/// Derive the three-way source label. Thresholds at +/-3.
pub fn source_type_for(score: f64) -> SourceType {
    if score <= -3.0 {
        SourceType::Left
    } else if score >= 3.0 {
        SourceType::Right
    } else {
        SourceType::Center
    }
}
