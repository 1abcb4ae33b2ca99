//! Narrative summary client
//!
//! Turns a set of observations into a Finnish-language bulletin using a
//! Gemini-style `generateContent` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::Observation;

use crate::config::SummarizerConfig;
use crate::error::{AppError, AppResult};

/// Finnish wording of the severity levels used in prompts
const LEVEL_TEXT_FI: [&str; 4] = [
    "Ei levää",
    "Vähäinen määrä levää",
    "Runsaasti levää",
    "Erittäin runsaasti levää",
];

/// What kind of narrative to produce
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryKind {
    /// Country-wide bulletin over a recent window
    Weekly {
        start: NaiveDate,
        end: NaiveDate,
        today: NaiveDate,
    },
    /// Situation around one clicked point
    Local {
        place: String,
        radius_km: f64,
        today: NaiveDate,
        total_rows: usize,
    },
}

/// Text-generation boundary
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, records: &[Observation], kind: &SummaryKind) -> AppResult<String>;
}

/// System and user prompt pair
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn level_text(obs: &Observation) -> &'static str {
    LEVEL_TEXT_FI[obs.severity.index()]
}

fn notes_or_default(obs: &Observation) -> &str {
    if obs.notes.trim().is_empty() {
        "Ei lisätietoja."
    } else {
        obs.notes.trim()
    }
}

/// Build the prompt for a summary request.
///
/// `records` are expected newest first.
pub fn build_prompt(records: &[Observation], kind: &SummaryKind) -> Prompt {
    match kind {
        SummaryKind::Weekly { start, end, today } => {
            let table: Vec<String> = records
                .iter()
                .map(|obs| {
                    format!(
                        "{} | {} | {} | {} | {}",
                        obs.date.format("%d.%m.%Y"),
                        obs.station,
                        obs.region,
                        level_text(obs),
                        notes_or_default(obs)
                    )
                })
                .collect();

            Prompt {
                system: "Olet Suomen ympäristökeskuksen asiantuntija ja laadit virallisia \
                         sinilevätiedotteita. Tuota analyyttinen ja yleistajuinen raportti annetusta \
                         datasta. Käytä Lisätiedot-sarakkeen sisältöä laadullisena lisätietona. \
                         Vastaa ainoastaan suomeksi, yhtenäisenä raporttina ilman numeroituja \
                         luetteloita. Maksimipituus 400 sanaa."
                    .to_string(),
                user: format!(
                    "Tämänhetkinen päivämäärä on: {today}.\n\
                     Analysoi alla oleva sinilevähavaintoja koskeva data aikaväliltä {start} - {end} \
                     ja laadi siitä viikoittaista sinilevätiedotetta vastaava yhteenveto. \
                     Painota viimeisimpiä havaintoja.\n\
                     1. Yleistilanne: kuinka monessa havainnossa levää havaittiin ja kuinka monessa \
                     runsas tai erittäin runsas esiintymä.\n\
                     2. Alueellinen katsaus: ELY-keskusten alueet ja vesistöt, joissa runsaita \
                     esiintymiä oli eniten, Lisätiedot mukaan lukien.\n\
                     3. Toimenpideohjeistus sinilevän havaitsemisen varalle.\n\
                     DATA ALKAA TÄSTÄ:\n\
                     Päivämäärä | Havaintopaikka | ELY-keskus | Levätilanne | Lisätiedot\n\
                     {table}\n\
                     DATA PÄÄTTYY TÄHÄN.",
                    today = today.format("%d.%m.%Y"),
                    start = start.format("%d.%m.%Y"),
                    end = end.format("%d.%m.%Y"),
                    table = table.join("\n"),
                ),
            }
        }
        SummaryKind::Local {
            place,
            radius_km,
            today,
            total_rows,
        } => {
            let history: Vec<String> = records
                .iter()
                .map(|obs| format!("{} | {}", obs.date.format("%d.%m.%Y"), level_text(obs)))
                .collect();

            let latest = match records.first() {
                Some(obs) => format!(
                    "{} ({}), levätilanne: {}. Lisätiedot: {}",
                    obs.station,
                    obs.date.format("%d.%m.%Y"),
                    level_text(obs),
                    notes_or_default(obs)
                ),
                None => "Ei havaintoja.".to_string(),
            };

            Prompt {
                system: "Olet vesistöasiantuntija. Laadi lyhyt, informatiivinen yhteenveto annetun \
                         vesistön sinilevätilanteesta. Perustele tilanteen tyypillisyys annettujen \
                         historiallisten havaintojen päivämäärien ja levätilanteiden perusteella. \
                         Tarkoitus on arvioida tilanne tällä hetkellä. Vastaa ainoastaan suomeksi. \
                         Maksimi 150 sanaa."
                    .to_string(),
                user: format!(
                    "Laadi otsikko muodossa '**{place} ({radius} km säde) – Sinilevätilanne**'.\n\
                     - Tämänhetkinen päivämäärä: {today}\n\
                     - Alueen viimeisin havainto: {latest}\n\
                     - Viimeiset {count} havaintoa (uudemmasta vanhempaan):\n{history}\n\
                     - Havaintoja alueelta yhteensä: {total_rows}\n\
                     Huomioi, kuinka pitkä aika viimeisimmästä havainnosta on kulunut, ja arvioi \
                     tämänhetkinen tilanne, sen tyypillisyys ja kehitys. Anna lopuksi lyhyt \
                     suositus toiminnasta sinilevän esiintyessä.",
                    radius = radius_km,
                    today = today.format("%d.%m.%Y"),
                    count = records.len(),
                    history = history.join("\n"),
                ),
            }
        }
    }
}

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiSummarizer {
    http_client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiSummarizer {
    /// Build a client, or `None` when no API key is configured
    pub fn from_config(config: &SummarizerConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Some(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
        }))
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, records: &[Observation], kind: &SummaryKind) -> AppResult<String> {
        let prompt = build_prompt(records, kind);
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);

        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part { text: prompt.system }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt.user }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::SummarizerUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::SummarizerUnavailable(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            AppError::SummarizerUnavailable(format!("Failed to parse response: {}", e))
        })?;

        let text: String = result
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(AppError::SummarizerUnavailable(
                "Response contained no text".to_string(),
            ));
        }

        Ok(text)
    }
}
