//! Keyword sentiment scoring.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::PulseError;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word pattern"));

/// Weights applied per keyword hit.
///
/// Files written with the French key names (`mots_positifs`, `mots_negatifs`,
/// `variation_cours`) are read as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Coefficients {
    /// Added once per positive keyword occurrence.
    #[serde(alias = "mots_positifs")]
    pub positive: f64,
    /// Added once per negative keyword occurrence (normally negative).
    #[serde(alias = "mots_negatifs")]
    pub negative: f64,
    /// Not used in scoring; kept so coefficients files round-trip unchanged.
    #[serde(alias = "variation_cours")]
    pub price_variation: f64,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            positive: 1.0,
            negative: -1.0,
            price_variation: 0.5,
        }
    }
}

impl Coefficients {
    /// Reads coefficients from a JSON file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// I/O or JSON errors; use [`Coefficients::load_or_default`] at startup.
    pub fn load(path: &Path) -> Result<Self, PulseError> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Like [`Coefficients::load`], falling back to defaults (and logging) on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(c) => c,
            Err(PulseError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid coefficients file, using defaults");
                Self::default()
            }
        }
    }
}

/// Scores text by counting positive and negative keyword occurrences.
///
/// Text and keywords are lowercased and split into words; a keyword (possibly
/// several words long) matches wherever its words appear consecutively.
#[derive(Debug, Clone)]
pub struct KeywordScorer {
    positive: Vec<Vec<String>>,
    negative: Vec<Vec<String>>,
    coefficients: Coefficients,
}

impl KeywordScorer {
    /// # Errors
    ///
    /// [`PulseError::Config`] if a keyword appears in both lists or has no word characters.
    pub fn new<P, N>(positive: P, negative: N, coefficients: Coefficients) -> Result<Self, PulseError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let positive = tokenize_all(positive)?;
        let negative = tokenize_all(negative)?;
        if let Some(dup) = positive.iter().find(|p| negative.contains(p)) {
            return Err(PulseError::Config(format!(
                "keyword '{}' is both positive and negative",
                dup.join(" ")
            )));
        }
        Ok(Self {
            positive,
            negative,
            coefficients,
        })
    }

    /// The built-in French financial-press vocabulary.
    pub fn french(coefficients: Coefficients) -> Self {
        Self::new(POSITIVE_FR, NEGATIVE_FR, coefficients).expect("built-in keyword lists are disjoint")
    }

    pub fn coefficients(&self) -> Coefficients {
        self.coefficients
    }

    pub fn score(&self, text: &str) -> f64 {
        let words = tokenize(text);
        let hits = |phrases: &[Vec<String>]| -> f64 {
            phrases
                .iter()
                .map(|p| count_occurrences(&words, p) as f64)
                .sum()
        };
        hits(self.positive.as_slice()) * self.coefficients.positive
            + hits(self.negative.as_slice()) * self.coefficients.negative
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

fn tokenize_all<I>(keywords: I) -> Result<Vec<Vec<String>>, PulseError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| {
            let words = tokenize(k.as_ref());
            if words.is_empty() {
                Err(PulseError::Config(format!("empty keyword '{}'", k.as_ref())))
            } else {
                Ok(words)
            }
        })
        .collect()
}

fn count_occurrences(words: &[String], phrase: &[String]) -> usize {
    if phrase.is_empty() || phrase.len() > words.len() {
        return 0;
    }
    words.windows(phrase.len()).filter(|w| *w == phrase).count()
}

const POSITIVE_FR: &[&str] = &[
    "bons résultats",
    "croissance",
    "succès",
    "innovation",
    "révolutionnaire",
    "expansion",
    "rentabilité",
    "part de marché",
    "leadership",
    "nouveau produit",
    "collaboration fructueuse",
    "forte demande",
    "augmentation des bénéfices",
    "nouveaux contrats",
    "augmentation des ventes",
    "augmentation de la production",
    "bonnes perspectives",
    "récompense",
    "réalisation",
    "partenariat stratégique",
    "recrutement renforcé",
    "confiance",
    "durabilité",
    "prise de leadership",
    "investissement fructueux",
    "valeur ajoutée",
    "expansion internationale",
    "développement",
    "réussite",
    "excellence",
    "soutien gouvernemental",
    "amélioration",
    "performance exceptionnelle",
    "progrès exceptionnels",
    "croissance exponentielle",
    "innovation de rupture",
    "leadership sur le marché",
    "partenariat gagnant-gagnant",
    "prise de part de marché",
    "recrutement d'experts",
    "augmentation de la rentabilité",
    "récupération post-crise",
];

const NEGATIVE_FR: &[&str] = &[
    "guerre",
    "conflit",
    "récession",
    "inflation",
    "crise économique",
    "panne",
    "grève",
    "licenciements",
    "réduction des coûts",
    "réduction des effectifs",
    "fermeture d'usine",
    "détérioration",
    "incertitude",
    "perte",
    "faillite",
    "scandale",
    "retard",
    "suspension",
    "dépôt de bilan",
    "chômage",
    "problèmes de production",
    "plan de restructuration",
    "mauvais résultats",
    "abandon de projet",
    "pollution",
    "manque de financement",
    "concurrence accrue",
    "instabilité",
    "déclin",
    "crise de confiance",
    "ralentissement",
    "embargo",
    "désastre",
    "controverse",
    "disruption",
    "contraction",
    "scandale fiscal",
    "non-conformité",
    "mauvaise performance",
    "rétrogradation",
    "mauvaise gestion",
    "non-rentabilité",
    "retards significatifs",
    "dissolution de partenariat",
    "impact environnemental négatif",
    "démission du pdg",
    "départ d'un cadre clé",
    "appels à la liquidation",
    "perte de contrats majeurs",
    "dérives éthiques",
];
