//! Prompt assembly for the three generation stages.
//!
//! Every function here is pure: identical inputs give byte-identical prompts,
//! which is what makes the stage cache sound.

use crate::config::{BrandConfig, Config};
use crate::error::QuillError;
use crate::model::{CaseStudy, Claim, ResearchBrief, SeoTerm, SourceRecord};


/// Case studies offered to the writer.
const MAX_CASE_STUDIES: usize = 3;
const MAX_TESTIMONIALS: usize = 3;
/// Lower-importance SEO terms beyond this are dropped from the prompt.
const MAX_LOW_TERMS: usize = 30;
/// SEO terms shown to the header selector.
const SELECTOR_TERMS: usize = 20;

/// Everything prompt assembly needs from configuration.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Year the article should be current for.
    pub year: i32,
    pub brand: BrandConfig,
    pub header_count: usize,
    pub query_limit: usize,
    /// Replaces the built-in system prompt entirely.
    pub system_override: Option<String>,
}

impl PromptConfig {
    /// Build from the loaded config, reading the system prompt override file if set.
    pub fn from_config(config: &Config, year: i32) -> Result<Self, QuillError> {
        let system_override = match &config.generation.system_prompt_path {
            Some(path) => {
                let path = crate::shellexpand(path);
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    QuillError::Config(format!("failed to read system prompt {path}: {e}"))
                })?;
                Some(text)
            }
            None => None,
        };
        Ok(Self {
            year: config.generation.year.unwrap_or(year),
            brand: config.brand.clone(),
            header_count: config.generation.header_count,
            query_limit: config.generation.query_limit,
            system_override,
        })
    }
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Named system prompt sections, in assembly order.
pub const SECTION_ORDER: [&str; 10] = [
    "persona",
    "tone_and_authority",
    "technical_business_balance",
    "structural_rules",
    "keyword_rules",
    "brand_guidelines",
    "link_rules",
    "seo_terms",
    "content_quality",
    "uniqueness",
];

/// Text of one built-in system section.
pub fn system_section(name: &str, cfg: &PromptConfig) -> Option<String> {
    let brand = &cfg.brand.name;
    let year = cfg.year;
    let prev = year - 1;
    let text = match name {
        "persona" => format!(
            "You are a technical hiring specialist at {brand} who has vetted hundreds of developers \
and matched them with startups.\n\n\
You write landing page content (~3000 words) for {brand}'s \"Hire [Technology] Developers\" pages. \
This is conversion-oriented content on a commercial page, not a blog post. Help a founder or CTO \
who arrived from search understand:\n\
- What separates a strong developer in this technology from someone who only lists it on a resume\n\
- Which red flags show up during vetting\n\
- What these developers actually cost in {year}\n\
- How {brand} delivers a vetted match in under 24 hours"
        ),
        "tone_and_authority" => format!(
            "## TONE & AUTHORITY\n\n\
Write with the confidence of someone who reviews portfolios every week:\n\
- Speak to the reader's hiring situation directly, not about \"companies\" in the abstract\n\
- Prefer specifics over generalities\n\
- Reference concrete vetting scenarios\n\
- Acknowledge trade-offs honestly and do not oversell\n\n\
Use \"we/our\" when describing {brand}'s vetting and matching work. Keep the lexicon informal \
and precise. Use bullet points only where they help scanning."
        ),
        "technical_business_balance" => format!(
            "## TECHNICAL AND BUSINESS BALANCE\n\n\
Cover both dimensions and weave them together:\n\
- What the technology is good at and where it is a poor fit\n\
- The frameworks, tools and libraries that define professional work in this stack\n\
- What \"senior\" looks like in practice and common technical debt patterns\n\
- How hiring differs for a 3-person startup versus a 10+ person team\n\
- Real timelines and costs with {brand} compared to in-house hiring, large freelance platforms and agencies\n\
- Part-time versus full-time engagements and the concrete risks of a wrong hire\n\n\
Write for founders, CTOs, tech leads and SMB decision-makers working with remote teams in {year}."
        ),
        "structural_rules" => "## STRUCTURAL RULES (STRICT)\n\n\
1. No \"Introduction\" header. Open with a single 3-5 sentence paragraph; the first H2 follows it.\n\
2. The user prompt lists the H2 headers to use. Keep each H2 section around 300-400 words.\n\
3. H3 subsections are allowed inside H2 sections. Use H4 only when unavoidable.\n\
4. Headers never repeat each other.\n\
5. The first H2 is never immediately followed by an H3; body text comes between them.\n\
6. No \"Conclusion\" header. End with one closing paragraph.\n\
7. Total length ~3000 words (2800-3200). Never exceed 3200 words."
            .to_string(),
        "keyword_rules" => "## KEYWORD RULES\n\n\
The user prompt lists target keywords: exact phrases people search for. Include at least \
7 of them verbatim, spread across different sections, inside natural sentences."
            .to_string(),
        "brand_guidelines" => format!(
            "## {upper} GUIDELINES\n\n\
- Write from {brand}'s perspective when discussing sourcing, vetting, hiring and onboarding\n\
- {brand} is a marketplace of vetted, experienced developers serving startups, founders and SMBs\n\
- Do not position price as the differentiator. Emphasize risk reduction, speed, quality of hire and transparency\n\
- {brand} offers part-time and full-time developers\n\
- Never call {brand} developers \"freelancers\". Call them dedicated, remote developers, engineers or experts\n\
- Use the supplied case studies and testimonials as proof points with their real numbers and quotes\n\
- Mention modern tooling and AI-assisted workflows where they are relevant to the technology",
            upper = brand.to_uppercase()
        ),
        "link_rules" => format!(
            "## LINK RULES (MANDATORY)\n\n\
1. Include 2-3 external links and never more than 6. Prefer official documentation and recognized sources.\n\
2. Do not link to service companies, their blogs or statistics pages.\n\
3. Include 2-3 internal {brand} links from the provided list with short anchors. Never link to the homepage.\n\
4. Never link to {brand} competitors.\n\
5. Spread links evenly through the article.\n\
6. Format every link as markdown: [anchor text](URL)"
        ),
        "seo_terms" => "## SEO TERMS (MANDATORY)\n\n\
Use every SEO term listed in the user prompt, either the primary form or one of its variants. \
Align headers and structure with the high-importance terms."
            .to_string(),
        "content_quality" => format!(
            "## CONTENT QUALITY\n\n\
- Use the research brief throughout and prefer it over training data when they conflict\n\
- Use {year} data. Do not use data older than {prev} unless nothing newer exists\n\
- Every statistic must carry a source link next to it. No unattributed numbers\n\
- Keep every claim about the technology accurate and current"
        ),
        "uniqueness" => "## UNIQUENESS\n\n\
This article is one of many for different technologies and must not read as a template. \
Vary the opening hook, the business context, paragraph rhythm and transitions. Use examples \
specific to this technology's ecosystem and avoid stock transitional phrases."
            .to_string(),
        _ => return None,
    };
    Some(text)
}

const OUTPUT_INSTRUCTION: &str = "Output format: markdown. Use ## for main sections and ### for \
subsections, standard [anchor](URL) links, - for bullet lists. No front matter, no title line: \
start directly with the opening paragraph.";

/// Build the system prompt. Independent of any subject.
pub fn build_system_prompt(cfg: &PromptConfig) -> String {
    if let Some(text) = cfg.system_override.as_deref().filter(|t| !t.trim().is_empty()) {
        return text.to_string();
    }
    let mut parts: Vec<String> = SECTION_ORDER
        .iter()
        .filter_map(|name| system_section(name, cfg))
        .collect();
    parts.push(OUTPUT_INSTRUCTION.to_string());
    parts.join("\n\n")
}

// ---------------------------------------------------------------------------
// User prompt
// ---------------------------------------------------------------------------

/// Build the writer's user prompt for one subject.
pub fn build_user_prompt(
    cfg: &PromptConfig,
    record: &SourceRecord,
    headers: &[String],
    brief: Option<&ResearchBrief>,
) -> String {
    let subject = record.subject.as_str();
    let sections = [
        intro_section(cfg, subject, &record.page_url),
        brief.map(research_section).unwrap_or_default(),
        queries_section(cfg, record),
        seo_terms_section(&record.seo_terms),
        keyword_section(subject, &record.templates.keywords),
        header_section(headers),
        question_section(&record.templates.questions),
        case_study_section(cfg, record),
        internal_link_section(cfg, subject, &record.page_url),
        external_link_section(cfg, subject),
        requirements_section(cfg, subject),
        self_check_section(cfg),
    ];
    let body: Vec<String> = sections.into_iter().filter(|s| !s.is_empty()).collect();
    format!("{}\n\nWrite the article now.", body.join("\n"))
}

fn intro_section(cfg: &PromptConfig, subject: &str, page_url: &str) -> String {
    let brand = &cfg.brand.name;
    format!(
        "Write a ~3000-word article about hiring {subject} developers for the page: {page_url}\n\n\
The article is the hiring guide section of this {brand} landing page. It must help founders, \
CTOs and startup leaders understand why they need {subject} developers, what to look for, what \
it costs, and how to hire them through {brand}."
    )
}

/// Render a research brief for the writer.
pub fn research_section(brief: &ResearchBrief) -> String {
    if brief.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "\n## RESEARCH BRIEF (live web search results)\n\
Use these statistics and sources throughout the article. Keep each source URL exactly as given; \
every statistic you cite must link to its source.\n\n",
    );
    if !brief.context.trim().is_empty() {
        out.push_str(brief.context.trim());
        out.push('\n');
    }
    let extra: Vec<&Claim> = brief
        .claims
        .iter()
        .filter(|c| !brief.context.contains(&c.source_url))
        .collect();
    if !extra.is_empty() {
        out.push_str("\nAdditional sourced facts:\n");
        for claim in extra {
            out.push_str(&format!("  - {} ({})\n", claim.text, claim.source_url));
        }
    }
    out
}

fn queries_section(cfg: &PromptConfig, record: &SourceRecord) -> String {
    if record.queries.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = record
        .queries
        .iter()
        .take(cfg.query_limit)
        .map(|q| {
            format!(
                "  - \"{}\" (impressions: {}, position: {:.1})",
                q.query, q.impressions, q.position
            )
        })
        .collect();
    format!(
        "\n## SEARCH CONSOLE DATA\n\
Real queries people use to find this page. Weave the most relevant ones into the article:\n{}\n",
        lines.join("\n")
    )
}

fn format_term(term: &SeoTerm) -> String {
    let mut out = term.term.clone();
    if !term.variants.is_empty() {
        let shown: Vec<&str> = term.variants.iter().take(3).map(String::as_str).collect();
        out.push_str(&format!(" (also: {})", shown.join(", ")));
    }
    let min = term.uses_min.max(1);
    let max = term.uses_max.max(min);
    out.push_str(&format!(" [use {min}-{max}x]"));
    out
}

fn seo_terms_section(terms: &[SeoTerm]) -> String {
    if terms.is_empty() {
        return String::new();
    }
    let bucket = |pred: &dyn Fn(u8) -> bool, cap: usize| -> String {
        terms
            .iter()
            .filter(|t| pred(t.importance))
            .take(cap)
            .map(|t| format!("  - {}", format_term(t)))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let high = bucket(&|i| i >= 8, usize::MAX);
    let medium = bucket(&|i| (5..8).contains(&i), usize::MAX);
    let low = bucket(&|i| i < 5, MAX_LOW_TERMS);
    format!(
        "\n## SEO TERMS (MANDATORY: USE ALL OF THESE)\n\
Every term below must appear in the article, as the primary form or a listed variant. \
The [use Nx] hint is how often each should appear.\n\n\
HIGH IMPORTANCE:\n{high}\n\n\
MEDIUM IMPORTANCE:\n{medium}\n\n\
LOWER IMPORTANCE:\n{low}\n"
    )
}

fn keyword_section(subject: &str, keywords: &[String]) -> String {
    if keywords.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = keywords
        .iter()
        .enumerate()
        .map(|(i, k)| format!("  {}. \"{k}\"", i + 1))
        .collect();
    format!(
        "\n## TARGET KEYWORDS (exact-match phrases)\n\
Pick 8-12 of the {} phrases below and include them verbatim, spread across sections.\n\
Example: \"When startups hire dedicated {subject} developers, they gain access to...\"\n\n{}\n",
        keywords.len(),
        lines.join("\n")
    )
}

fn header_section(headers: &[String]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("  {}. {h}", i + 1))
        .collect();
    format!(
        "\n## ARTICLE STRUCTURE (STRICT)\n\
Use exactly these {n} sections as H2 headers, in this order, with the wording as-is or minimally changed:\n\n\
{lines}\n\n\
You may add H3 subsections of your own inside any H2. Do not add H2 sections beyond these {n}.\n",
        n = headers.len(),
        lines = lines.join("\n")
    )
}

fn question_section(questions: &[String]) -> String {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<&String> = questions.iter().filter(|q| seen.insert(*q)).collect();
    if unique.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = unique.iter().map(|q| format!("  - {q}")).collect();
    format!(
        "\n## QUESTIONS TO ADDRESS\n\
Answer 5-10 of these inside the article body. Do not create a FAQ section:\n{}\n",
        lines.join("\n")
    )
}

/// Case studies most relevant to `subject`: technology matches first, then file order.
pub fn select_case_studies<'a>(studies: &'a [CaseStudy], subject: &str) -> Vec<&'a CaseStudy> {
    let needle = subject.to_lowercase();
    let matches = |s: &CaseStudy| s.technologies.iter().any(|t| t.to_lowercase() == needle);
    let mut picked: Vec<&CaseStudy> = studies.iter().filter(|s| matches(s)).collect();
    picked.extend(studies.iter().filter(|s| !matches(s)));
    picked.truncate(MAX_CASE_STUDIES);
    picked
}

fn case_study_section(cfg: &PromptConfig, record: &SourceRecord) -> String {
    if record.case_studies.is_empty() && record.testimonials.is_empty() {
        return String::new();
    }
    let mut studies = Vec::new();
    for s in select_case_studies(&record.case_studies, &record.subject) {
        let label = if s.industry.is_empty() {
            &s.company
        } else {
            &s.industry
        };
        studies.push(format!("  - {label}: {} ({})", s.headline, s.stats.join("; ")));
        if !s.quote.is_empty() {
            studies.push(format!("    Quote: \"{}\" ({})", s.quote, s.quote_author));
        }
    }
    let testimonials: Vec<String> = record
        .testimonials
        .iter()
        .take(MAX_TESTIMONIALS)
        .map(|t| format!("  - \"{}\" ({})", t.quote, t.author))
        .collect();
    format!(
        "\n## {} CASE STUDIES & TESTIMONIALS\n\
Weave at least one of these into the article as a proof point, with its stats and a direct quote.\n\n\
Case studies:\n{}\n\nTestimonials:\n{}\n",
        cfg.brand.name.to_uppercase(),
        studies.join("\n"),
        testimonials.join("\n")
    )
}

fn internal_link_section(cfg: &PromptConfig, subject: &str, page_url: &str) -> String {
    let lines: Vec<String> = cfg
        .brand
        .internal_links
        .iter()
        .filter(|(_, url)| url.as_str() != page_url && url.as_str() != cfg.brand.homepage)
        .map(|(anchor, url)| format!("  - [{anchor}]({url})"))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    format!(
        "\n## INTERNAL LINKS (MANDATORY: 2-3)\n\
Include 2-3 of these, picking the ones most relevant to {subject} development. Use short anchors. \
Do not link to the homepage.\n\n{}\n",
        lines.join("\n")
    )
}

fn external_link_section(cfg: &PromptConfig, subject: &str) -> String {
    let key = subject.trim().to_lowercase();
    match cfg.brand.official_links.get(&key) {
        Some(links) if !links.is_empty() => {
            let lines: Vec<String> = links
                .iter()
                .map(|(label, url)| format!("  - [{label}]({url})"))
                .collect();
            format!(
                "\n## EXTERNAL LINKS (MANDATORY: 2-3, maximum 6)\n\
Use these official URLs when first mentioning the technology or a framework:\n\n{}\n",
                lines.join("\n")
            )
        }
        _ => format!(
            "\n## EXTERNAL LINKS (MANDATORY: 2-3, maximum 6)\n\
Link to official {subject} documentation or recognized research such as developer surveys.\n"
        ),
    }
}

fn requirements_section(cfg: &PromptConfig, subject: &str) -> String {
    let brand = &cfg.brand.name;
    let year = cfg.year;
    format!(
        "\n## ADDITIONAL REQUIREMENTS\n\
- Approximately 3000 words (2800-3200)\n\
- Open with a paragraph, not a header\n\
- End with a single closing paragraph that mentions {brand} services with a link\n\
- Never link to hiring platforms that compete with {brand}\n\
- Use {year} data for every claim about {subject}, {prev} at the oldest\n\
- Every statistic carries a source link\n\
- Use every SEO term listed above",
        prev = year - 1
    )
}

fn self_check_section(cfg: &PromptConfig) -> String {
    let brand = &cfg.brand.name;
    format!(
        "\n## PRE-SUBMISSION SELF-CHECK\n\
1. Only the prescribed H2 headers are used\n\
2. Word count is between 2800 and 3200\n\
3. At least 7 target keywords appear verbatim\n\
4. 2-4 internal {brand} links, none to the homepage\n\
5. 2-6 external links, none to competitors\n\
6. The article starts and ends with a paragraph\n\
7. No {brand} developer is called a freelancer\n\
8. Every statistic has a source link from {} or {}\n\n\
If any check fails, revise before answering.",
        cfg.year,
        cfg.year - 1
    )
}

// ---------------------------------------------------------------------------
// Header selection
// ---------------------------------------------------------------------------

/// Prompt asking the selector model for `count` header indices.
pub fn header_selection_prompt(
    cfg: &PromptConfig,
    subject: &str,
    headers: &[String],
    seo_terms: &[SeoTerm],
) -> String {
    let count = cfg.header_count;
    let terms = if seo_terms.is_empty() {
        String::new()
    } else {
        let top: Vec<&str> = seo_terms
            .iter()
            .take(SELECTOR_TERMS)
            .map(|t| t.term.as_str())
            .collect();
        format!("\nTop SEO terms for this article: {}\n", top.join(", "))
    };
    let numbered: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("  {}. {h}", i + 1))
        .collect();
    format!(
        "You are choosing the structure of a ~3000-word hiring guide about {subject} developers on {brand}.\n\n\
Below are {total} header templates. Pick exactly {count} that make the best H2 sections. Choose headers that:\n\
- Cover the most important topics for someone hiring {subject} talent\n\
- Are specific to {subject}\n\
- Read as a logical sequence\n\
- Include at least one header about {brand}'s hiring process\n\
- Include at least one cost or pricing header\n\
{terms}\n\
Available headers:\n{numbered}\n\n\
Respond with ONLY a JSON array of the {count} selected header numbers (1-indexed), in article order.\n\n\
JSON array:",
        brand = cfg.brand.name,
        total = headers.len(),
        numbered = numbered.join("\n"),
    )
}

/// Parse the selector's reply into headers.
///
/// Tolerates code fences and surrounding prose. Out-of-range and repeated
/// indices are ignored; a short selection is topped up in template order.
/// A reply with no JSON array is an error.
pub fn parse_header_selection(
    reply: &str,
    headers: &[String],
    count: usize,
) -> Result<Vec<String>, String> {
    let start = reply.find('[');
    let end = reply.rfind(']');
    let indices: Vec<i64> = match (start, end) {
        (Some(s), Some(e)) if s < e => serde_json::from_str(&reply[s..=e])
            .map_err(|e| format!("selector reply is not a JSON number array: {e}"))?,
        _ => return Err(format!("selector reply has no JSON array: {:?}", truncate(reply, 80))),
    };

    let mut used = vec![false; headers.len()];
    let mut picked = Vec::with_capacity(count);
    for idx in indices {
        if picked.len() >= count {
            break;
        }
        let Some(i) = usize::try_from(idx).ok().and_then(|i| i.checked_sub(1)) else {
            continue;
        };
        if i < headers.len() && !used[i] {
            used[i] = true;
            picked.push(headers[i].clone());
        }
    }
    for (i, header) in headers.iter().enumerate() {
        if picked.len() >= count {
            break;
        }
        if !used[i] {
            used[i] = true;
            picked.push(header.clone());
        }
    }
    Ok(picked)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

/// Prompt for the web research stage.
pub fn research_prompt(subject: &str, year: i32) -> String {
    let prev = year - 1;
    format!(
        "You are a research assistant gathering current data about {subject} developers and the {subject} market.\n\n\
Search the web and compile the following. For EVERY data point include the exact source URL.\n\n\
1. Market statistics ({year} or latest): number of {subject} developers, popularity rankings, job demand trends.\n\
2. Salary data ({year} or {prev}): average salary in the US or globally, senior versus junior ranges, remote rates.\n\
3. Technology trends: recent releases, trending libraries and tools, use with AI/ML, notable adopters.\n\
4. Hiring market: developer shortage data, time-to-hire, remote hiring trends.\n\n\
Output one bullet per data point: the fact, the year, and the source as a markdown link.\n\
Example:\n\
- According to the [Stack Overflow {year} Developer Survey](https://survey.stackoverflow.co/{year}/), ...\n\n\
Do not invent statistics. If current data is unavailable, say so."
    )
}

/// Extract sourced claims from bullet lines that carry a markdown link.
pub fn parse_claims(text: &str) -> Vec<Claim> {
    text.lines()
        .filter_map(|line| {
            let item = strip_bullet(line.trim())?;
            let url = first_link_url(item)?;
            Some(Claim {
                text: item.to_string(),
                source_url: url.to_string(),
            })
        })
        .collect()
}

fn strip_bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

fn first_link_url(text: &str) -> Option<&str> {
    let open = text.find("](")?;
    let rest = &text[open + 2..];
    let close = rest.find(')')?;
    let url = rest[..close].trim();
    (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
}
