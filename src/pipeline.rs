//! Generation orchestrator.
//!
//! Three stages run strictly in order for each subject:
//! - header selection on the fast model; failure aborts the subject
//! - web research; failure degrades to an empty brief
//! - writing; failure aborts the subject, retries repeat the whole stage
//!
//! Every stage output is cached under its full request, so an unchanged
//! input never calls the model twice.

mod cache;

pub use cache::StageCache;

use chrono::Utc;
use quill_core::{
    config::Config,
    error::{QuillError, Stage},
    model::{Article, Claim, ResearchBrief, SourceRecord},
    prompts::{self, PromptConfig},
    traits::{Generation, GenerationRequest, Generator},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The selector only returns a short JSON array.
const SELECTOR_MAX_TOKENS: u32 = 200;

/// Model parameters for each stage, copied out of `Config`.
#[derive(Debug, Clone)]
struct StageSettings {
    selector_model: String,
    researcher_model: String,
    writer_model: String,
    max_tokens: u32,
    temperature: f32,
    research_enabled: bool,
    research_max_uses: u32,
    research_max_tokens: u32,
    writing_attempts: u32,
}

/// Prompts a dry run would send, without calling the model.
#[derive(Debug, Clone, Serialize)]
pub struct PromptPreview {
    pub headers: Vec<String>,
    pub system_prompt_chars: usize,
    pub user_prompt_chars: usize,
}

pub struct Pipeline {
    generator: Arc<dyn Generator>,
    prompts: PromptConfig,
    system_prompt: String,
    settings: StageSettings,
    cache: StageCache,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn Generator>,
        config: &Config,
        prompts: PromptConfig,
        cache: StageCache,
    ) -> Self {
        let system_prompt = prompts::build_system_prompt(&prompts);
        Self {
            generator,
            prompts,
            system_prompt,
            settings: StageSettings {
                selector_model: config.provider.selector_model.clone(),
                researcher_model: config.provider.researcher_model.clone(),
                writer_model: config.provider.writer_model.clone(),
                max_tokens: config.provider.max_tokens,
                temperature: config.provider.temperature,
                research_enabled: config.research.enabled,
                research_max_uses: config.research.max_uses,
                research_max_tokens: config.research.max_tokens,
                writing_attempts: config.generation.writing_attempts.max(1),
            },
            cache,
        }
    }

    /// Run all three stages for one subject.
    pub async fn run(&self, record: &SourceRecord) -> Result<Article, QuillError> {
        let headers = self.select_headers(record).await?;
        let brief = self.research(record).await;
        let generation = self.write(record, &headers, brief.as_ref()).await?;

        Ok(Article {
            slug: record.slug.clone(),
            subject: record.subject.clone(),
            page_url: record.page_url.clone(),
            body: generation.text,
            selected_headers: headers,
            model: generation.model,
            generated_at: Utc::now(),
            research_degraded: brief.is_some_and(|b| b.degraded),
        })
    }

    /// Assemble the writer prompts with the first templates as headers.
    pub fn preview(&self, record: &SourceRecord) -> PromptPreview {
        let headers: Vec<String> = record
            .templates
            .headers
            .iter()
            .take(self.prompts.header_count)
            .cloned()
            .collect();
        let user = prompts::build_user_prompt(&self.prompts, record, &headers, None);
        PromptPreview {
            headers,
            system_prompt_chars: self.system_prompt.len(),
            user_prompt_chars: user.len(),
        }
    }

    /// Stage 1: pick `header_count` H2 headers from the templates.
    pub async fn select_headers(&self, record: &SourceRecord) -> Result<Vec<String>, QuillError> {
        let stage = Stage::HeaderSelection;
        let templates = &record.templates.headers;
        let count = self.prompts.header_count;
        if templates.is_empty() {
            return Err(QuillError::Generation {
                stage,
                message: format!("no header templates for {}", record.subject),
            });
        }
        if templates.len() <= count {
            debug!("{}: {} header templates, nothing to select", record.slug, templates.len());
            return Ok(templates.clone());
        }

        let request = GenerationRequest {
            system: None,
            user: prompts::header_selection_prompt(
                &self.prompts,
                &record.subject,
                templates,
                &record.seo_terms,
            ),
            model: self.settings.selector_model.clone(),
            max_tokens: SELECTOR_MAX_TOKENS,
            temperature: 0.0,
            web_search: None,
        };
        let key = request_key(&request);
        if let Some(headers) = self.cache.get(&record.slug, stage, &key) {
            return Ok(headers);
        }

        let generation = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| e.in_stage(stage))?;
        log_usage(&record.slug, stage, &generation);
        let headers = prompts::parse_header_selection(&generation.text, templates, count)
            .map_err(|message| QuillError::Generation { stage, message })?;

        info!("{}: selected headers: {}", record.slug, headers.join(" | "));
        self.store(&record.slug, stage, &key, &headers);
        Ok(headers)
    }

    /// Stage 2: web research. `None` when research is disabled; a degraded
    /// empty brief when the call fails.
    pub async fn research(&self, record: &SourceRecord) -> Option<ResearchBrief> {
        let stage = Stage::Research;
        if !self.settings.research_enabled {
            return None;
        }

        let request = GenerationRequest {
            system: None,
            user: prompts::research_prompt(&record.subject, self.prompts.year),
            model: self.settings.researcher_model.clone(),
            max_tokens: self.settings.research_max_tokens,
            temperature: 0.0,
            web_search: Some(self.settings.research_max_uses),
        };
        let key = request_key(&request);
        if let Some(brief) = self.cache.get(&record.slug, stage, &key) {
            return Some(brief);
        }

        match self.generator.generate(&request).await {
            Ok(generation) => {
                log_usage(&record.slug, stage, &generation);
                let brief = brief_from(&generation);
                info!("{}: research brief with {} sourced claims", record.slug, brief.claims.len());
                self.store(&record.slug, stage, &key, &brief);
                Some(brief)
            }
            Err(e) => {
                let e = e.in_stage(stage);
                warn!("{}: {e}; writing without research", record.slug);
                Some(ResearchBrief::degraded())
            }
        }
    }

    /// Stage 3: write the article. Each retry re-sends the identical request.
    pub async fn write(
        &self,
        record: &SourceRecord,
        headers: &[String],
        brief: Option<&ResearchBrief>,
    ) -> Result<Generation, QuillError> {
        let stage = Stage::Writing;
        let request = GenerationRequest {
            system: Some(self.system_prompt.clone()),
            user: prompts::build_user_prompt(&self.prompts, record, headers, brief),
            model: self.settings.writer_model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            web_search: None,
        };
        let key = request_key(&request);
        if let Some(generation) = self.cache.get(&record.slug, stage, &key) {
            return Ok(generation);
        }

        let attempts = self.settings.writing_attempts;
        let mut attempt = 1;
        loop {
            let result = self
                .generator
                .generate(&request)
                .await
                .and_then(require_text);
            match result {
                Ok(generation) => {
                    log_usage(&record.slug, stage, &generation);
                    self.store(&record.slug, stage, &key, &generation);
                    return Ok(generation);
                }
                Err(e) if attempt < attempts => {
                    warn!("{}: writing attempt {attempt}/{attempts} failed: {e}", record.slug);
                    attempt += 1;
                }
                Err(e) => return Err(e.in_stage(stage)),
            }
        }
    }

    fn store<T: Serialize>(&self, slug: &str, stage: Stage, key: &str, value: &T) {
        if let Err(e) = self.cache.put(slug, stage, key, value) {
            warn!("{slug}: failed to cache {stage} output: {e}");
        }
    }
}

fn request_key(request: &GenerationRequest) -> String {
    let max_tokens = request.max_tokens.to_string();
    let temperature = request.temperature.to_string();
    let web_search = request
        .web_search
        .map(|n| n.to_string())
        .unwrap_or_default();
    StageCache::key(&[
        &request.model,
        request.system.as_deref().unwrap_or_default(),
        &request.user,
        &max_tokens,
        &temperature,
        &web_search,
    ])
}

fn require_text(generation: Generation) -> Result<Generation, QuillError> {
    if generation.text.trim().is_empty() {
        return Err(QuillError::Provider("model returned an empty article".into()));
    }
    Ok(generation)
}

/// Claims from bullet lines, plus API citations not already covered.
fn brief_from(generation: &Generation) -> ResearchBrief {
    let mut claims = prompts::parse_claims(&generation.text);
    for citation in &generation.citations {
        if claims.iter().any(|c| c.source_url == citation.url) {
            continue;
        }
        let text = if citation.cited_text.trim().is_empty() {
            citation.title.trim()
        } else {
            citation.cited_text.trim()
        };
        if text.is_empty() {
            continue;
        }
        claims.push(Claim {
            text: text.to_string(),
            source_url: citation.url.clone(),
        });
    }
    ResearchBrief {
        claims,
        context: generation.text.trim().to_string(),
        degraded: false,
    }
}

fn log_usage(slug: &str, stage: Stage, generation: &Generation) {
    info!(
        "{slug}: {stage} done in {:.1}s ({} in / {} out tokens, {} searches)",
        generation.elapsed_ms as f64 / 1000.0,
        generation.input_tokens,
        generation.output_tokens,
        generation.search_requests
    );
}
