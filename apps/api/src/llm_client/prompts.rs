// Cross-cutting prompt fragments shared by every drafting call.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Common instruction prepended to all drafting prompts.
pub const PROFILE_GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Every claim you generate must come from the applicant profile \
    provided in the prompt. Do NOT invent employers, degrees, dates, tools, \
    or accomplishments. If the profile does not support a claim, omit it \
    entirely. An honest, thinner document always beats an embellished one.";
