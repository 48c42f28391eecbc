// All LLM prompt constants for the batch drafting pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for document drafting — enforces JSON-only output.
pub const DRAFT_SYSTEM: &str =
    "You are an expert resume and cover letter writer for early-career candidates. \
    Produce tailored, truthful application documents from a verified applicant profile. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences around the JSON. \
    Do NOT include explanations or apologies.";

/// Drafting prompt template.
/// Replace: {grounding_instruction}, {profile_json}, {company}, {role}, {job_description}
/// Double-# delimiters: the schema example contains `"# Jane Doe"`, which
/// would terminate a plain `r#"…"#` literal.
pub const DRAFT_PROMPT_TEMPLATE: &str = r##"{grounding_instruction}

APPLICANT PROFILE (source of truth — ONLY use facts from this):
{profile_json}

TARGET ROLE:
Company: {company}
Role: {role}

JOB DESCRIPTION:
{job_description}

Draft a tailored resume AND a tailored cover letter for this role. Return a JSON object with this EXACT schema (no extra fields):
{
  "documents": [
    {
      "kind": "resume",
      "title": "Resume — Backend Intern at Nordwind Logistics",
      "markdown": "# Jane Doe\n..."
    },
    {
      "kind": "cover_letter",
      "title": "Cover Letter — Backend Intern at Nordwind Logistics",
      "markdown": "Dear Hiring Team,\n..."
    }
  ]
}

HARD RULES:
1. `kind` must be exactly "resume" or "cover_letter" — include exactly one of each
2. `markdown` is the full document body in Markdown — never empty
3. Use ONLY facts from the applicant profile — no interpolation, no invention
4. Mirror the job description's terminology where the profile genuinely supports it
5. Keep the resume to one page of content; keep the cover letter under 350 words
6. Address the cover letter to the target company by name"##;

/// System prompt for ATS scoring — enforces JSON-only output.
pub const ATS_SCORE_SYSTEM: &str =
    "You are an applicant tracking system simulator. \
    Score how well a resume will perform when screened against a job description. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// ATS scoring prompt template. Replace `{resume_markdown}` and `{job_description}`.
pub const ATS_SCORE_PROMPT_TEMPLATE: &str = r#"Score the following resume against the job description as an applicant tracking system would.

Return a JSON object with this EXACT schema (no extra fields):
{
  "ats_score": 87,
  "missing_keywords": ["Kubernetes", "CI/CD"]
}

Scoring rules:
- `ats_score` is an integer from 0 to 100
- Weight keyword coverage of the job description's requirements most heavily
- Penalize formatting that screeners parse poorly (tables, images, dense columns)
- Penalize missing sections (no skills section, no dated experience)
- `missing_keywords` lists job description terms the resume never mentions — empty array if none

RESUME:
{resume_markdown}

JOB DESCRIPTION:
{job_description}"#;
