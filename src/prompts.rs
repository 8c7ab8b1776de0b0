//! Prompt rendering for the two personas.
//!
//! The recruiter persona carries its rules (greeting, follow-up suppression,
//! exact fallback sentence, no phone numbers) as instruction text for the
//! model. None of them are checked against the model's reply.

use clap::ValueEnum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::PromptConfig;

/// Canonical links, used for cache seeding and as prompt redirect targets.
pub const REDIRECT_LINKS: [&str; 6] = [
    "http://www.andrewholland.com",
    "https://www.andrewholland.com/career/Career_Identity.html",
    "https://www.andrewholland.com/timeline/index.html",
    "https://github.com/silicastormsiam",
    "https://www.youtube.com/@SilicaStormSiam",
    "https://www.andrewholland.com/downloads/aholland_executive_summary.pdf",
];

pub const DEFAULT_LINK: &str = "https://www.andrewholland.com/";

pub const DEFAULT_FALLBACK_REPLY: &str = "Forgive me, seeker. My archive holds no record of that yet. \
     The path continues at https://www.andrewholland.com/";

/// Sentence the recruiter persona must use verbatim for anything outside its brief.
pub const RECRUITER_FALLBACK: &str = "That specific detail isn’t in my current brief, but you can find more at https://www.andrewholland.com/ or connect with Andrew directly at andrewjohnholland@gmail.com. Would you like me to link you to his Executive Summary PDF?";

const MONK_PERSONA: &str = "You are Cyberpunk Monk, a calm digital ascetic who answers in short, \
     neon-lit parables while staying faithful to the archive you are given.";

const RECRUITER_PROMPT: &str = include_str!("../prompts/recruiter.md");
const OPERATING_RULES: &str = include_str!("../prompts/operating_rules.md");

const GREETINGS: [&str; 3] = ["hi", "hello", "hey"];

const GREET_DIRECTIVE: &str =
    "The message is a bare greeting. Open with a one-line greeting, then offer help.";
const NO_GREET_DIRECTIVE: &str = "The message is not a bare greeting. Do not greet; answer directly.";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persona {
    /// Answers from cached page content and links out
    Monk,
    /// Answers from a preloaded recruiter brief
    Recruiter,
}

/// Behaviour when the cache has nothing for a query.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyContentMode {
    /// Return the fallback reply without calling the model
    Direct,
    /// Send the fallback reply to the model as the whole prompt
    Llm,
}

/// What the chat pipeline should do with a rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Llm(String),
    Direct(String),
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: Persona,
    empty_content: EmptyContentMode,
    fallback_reply: String,
    seed: Option<u64>,
    system_prompt: String,
    max_context_chars: usize,
}

impl PromptBuilder {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            persona: config.persona,
            empty_content: config.empty_content,
            fallback_reply: config
                .fallback_reply
                .clone()
                .unwrap_or_else(|| DEFAULT_FALLBACK_REPLY.to_string()),
            seed: config.seed,
            system_prompt: render_system_prompt(config.persona, config.operating_rules),
            max_context_chars: config.max_context_chars,
        }
    }

    /// Persona instructions without any user content. Rendered once.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Render the model input for `user_message`.
    ///
    /// `cached_content` may be empty. With a fixed seed the output is a pure
    /// function of the two arguments.
    pub fn build(&self, user_message: &str, cached_content: &str) -> String {
        match self.persona {
            Persona::Monk => self.build_monk(user_message, cached_content),
            Persona::Recruiter => self.build_recruiter(user_message, cached_content),
        }
    }

    /// Like [`build`](Self::build), but short-circuits to the fallback reply
    /// when the monk has no cached content and the mode says so.
    pub fn plan(&self, user_message: &str, cached_content: &str) -> Prompt {
        let no_content = cached_content.trim().is_empty();
        if self.persona == Persona::Monk
            && no_content
            && self.empty_content == EmptyContentMode::Direct
        {
            return Prompt::Direct(self.fallback_reply.clone());
        }
        Prompt::Llm(self.build(user_message, cached_content))
    }

    fn build_monk(&self, user_message: &str, cached_content: &str) -> String {
        if cached_content.trim().is_empty() {
            return self.fallback_reply.clone();
        }
        let archive = truncate_chars(cached_content.trim(), self.max_context_chars);
        format!(
            "{MONK_PERSONA}\n\n\
             Archive:\n{archive}\n\n\
             Seeker's question: {query}\n\n\
             Rules:\n\
             - Answer only from the archive. If it does not cover the question, say so in one line.\n\
             - Reply in under 100 words.\n\
             - End with exactly one hyperlink, this one: {link}",
            query = user_message.trim(),
            link = self.pick_link(),
        )
    }

    fn build_recruiter(&self, user_message: &str, cached_content: &str) -> String {
        let mut prompt = self.system_prompt.clone();
        let user_message = user_message.trim();
        if user_message.is_empty() {
            return prompt;
        }

        if !cached_content.trim().is_empty() {
            let reference = truncate_chars(cached_content.trim(), self.max_context_chars);
            prompt.push_str("\n\n# Reference material (secondary to the brief)\n");
            prompt.push_str(reference);
        }

        let directive = if is_bare_greeting(user_message) {
            GREET_DIRECTIVE
        } else {
            NO_GREET_DIRECTIVE
        };
        prompt.push_str("\n\n# Turn directive\n");
        prompt.push_str(directive);
        prompt.push_str("\n\n### Conversation\nUser: ");
        prompt.push_str(user_message);
        prompt.push_str("\nAssistant:");
        prompt
    }

    fn pick_link(&self) -> &'static str {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        REDIRECT_LINKS.choose(&mut rng).copied().unwrap_or(DEFAULT_LINK)
    }
}

fn render_system_prompt(persona: Persona, operating_rules: bool) -> String {
    match persona {
        Persona::Monk => MONK_PERSONA.to_string(),
        Persona::Recruiter if operating_rules => {
            format!("{}\n\n{}", OPERATING_RULES.trim(), recruiter_prompt())
        }
        Persona::Recruiter => recruiter_prompt(),
    }
}

fn recruiter_prompt() -> String {
    RECRUITER_PROMPT.trim().replace("{fallback}", RECRUITER_FALLBACK)
}

/// True only for a message that is exactly "hi", "hello" or "hey".
pub fn is_bare_greeting(message: &str) -> bool {
    let message = message.trim();
    GREETINGS.iter().any(|g| message.eq_ignore_ascii_case(g))
}

// Cut at a char boundary. Zero means no limit.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return text;
    }
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(persona: Persona, seed: Option<u64>) -> PromptBuilder {
        PromptBuilder::new(&PromptConfig {
            persona,
            empty_content: EmptyContentMode::Direct,
            fallback_reply: None,
            seed,
            operating_rules: false,
            max_context_chars: 4000,
        })
    }

    fn chosen_link(prompt: &str) -> &str {
        prompt.rsplit("this one: ").next().unwrap()
    }

    #[test]
    fn monk_prompt_embeds_content_query_and_one_known_link() {
        let prompt = builder(Persona::Monk, Some(7)).build("what is the timeline?", "Timeline 1996-2004");

        assert!(prompt.starts_with(MONK_PERSONA));
        assert!(prompt.contains("Archive:\nTimeline 1996-2004"));
        assert!(prompt.contains("Seeker's question: what is the timeline?"));
        assert!(prompt.contains("under 100 words"));
        assert!(REDIRECT_LINKS.contains(&chosen_link(&prompt)));
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let a = builder(Persona::Monk, Some(42)).build("projects", "CAPM app");
        let b = builder(Persona::Monk, Some(42)).build("projects", "CAPM app");
        assert_eq!(a, b);
    }

    #[test]
    fn seeds_cover_the_whole_link_set() {
        let mut seen = std::collections::HashSet::new();
        for seed in 0..200 {
            let prompt = builder(Persona::Monk, Some(seed)).build("q", "content");
            seen.insert(chosen_link(&prompt).to_string());
        }
        assert_eq!(seen.len(), REDIRECT_LINKS.len());
    }

    #[test]
    fn empty_content_renders_fallback_with_default_link() {
        let b = builder(Persona::Monk, None);
        let prompt = b.build("anything", "   ");
        assert_eq!(prompt, DEFAULT_FALLBACK_REPLY);
        assert!(prompt.contains(DEFAULT_LINK));
    }

    #[test]
    fn plan_respects_empty_content_mode() {
        let direct = builder(Persona::Monk, None);
        assert_eq!(
            direct.plan("q", ""),
            Prompt::Direct(DEFAULT_FALLBACK_REPLY.to_string())
        );

        let mut via_llm = builder(Persona::Monk, None);
        via_llm.empty_content = EmptyContentMode::Llm;
        assert_eq!(via_llm.plan("q", ""), Prompt::Llm(DEFAULT_FALLBACK_REPLY.to_string()));
    }

    #[test]
    fn configured_fallback_reply_is_used_verbatim() {
        let b = PromptBuilder::new(&PromptConfig {
            persona: Persona::Monk,
            empty_content: EmptyContentMode::Direct,
            fallback_reply: Some("Nothing here. See https://example.org/".into()),
            seed: None,
            operating_rules: false,
            max_context_chars: 0,
        });
        assert_eq!(
            b.plan("q", ""),
            Prompt::Direct("Nothing here. See https://example.org/".into())
        );
    }

    #[test]
    fn recruiter_always_goes_to_the_model() {
        let b = builder(Persona::Recruiter, None);
        assert!(matches!(b.plan("Where is Andrew located?", ""), Prompt::Llm(_)));
    }

    #[test]
    fn bare_greeting_gets_greet_directive() {
        let b = builder(Persona::Recruiter, None);
        for input in ["hi", "HELLO", " Hey "] {
            let prompt = b.build(input, "");
            assert!(prompt.contains(GREET_DIRECTIVE), "{input}");
            assert!(!prompt.contains(NO_GREET_DIRECTIVE), "{input}");
        }
    }

    #[test]
    fn greeting_with_extra_text_is_not_greeted() {
        let prompt = builder(Persona::Recruiter, None).build("hi, what's up", "");
        assert!(prompt.contains(NO_GREET_DIRECTIVE));
        assert!(!prompt.contains(GREET_DIRECTIVE));
        assert!(prompt.ends_with("User: hi, what's up\nAssistant:"));
    }

    #[test]
    fn recruiter_prompt_carries_contract_rules() {
        let b = builder(Persona::Recruiter, None);
        let prompt = b.system_prompt();
        assert!(prompt.contains(RECRUITER_FALLBACK));
        assert!(prompt.contains("Never display, infer or guess a phone number."));
        assert!(prompt.contains("single-year timeline lookups"));
    }

    #[test]
    fn system_prompt_is_rendered_once() {
        let b = builder(Persona::Recruiter, None);
        let first = b.system_prompt();
        assert!(std::ptr::eq(first, b.system_prompt()));
        assert!(!first.contains("{fallback}"));
    }

    #[test]
    fn recruiter_without_message_is_system_only() {
        let b = builder(Persona::Recruiter, None);
        assert_eq!(b.build("  ", ""), b.system_prompt());
    }

    #[test]
    fn operating_rules_are_prepended() {
        let b = PromptBuilder::new(&PromptConfig {
            persona: Persona::Recruiter,
            empty_content: EmptyContentMode::Llm,
            fallback_reply: None,
            seed: None,
            operating_rules: true,
            max_context_chars: 4000,
        });
        let prompt = b.build("Any AWS experience?", "");
        assert!(prompt.starts_with("[OPERATING RULES."));
        assert!(prompt.find("[OPERATING RULES.").unwrap() < prompt.find("Cyberpunk Monk").unwrap());
    }

    #[test]
    fn recruiter_reference_material_is_truncated() {
        let mut b = builder(Persona::Recruiter, None);
        b.max_context_chars = 5;
        let prompt = b.build("projects", "ééééééééé");
        assert!(prompt.contains("# Reference material (secondary to the brief)\nééééé\n"));
    }

    #[test]
    fn greeting_detection() {
        assert!(is_bare_greeting("Hey"));
        assert!(!is_bare_greeting("hey there"));
        assert!(!is_bare_greeting("hi!"));
        assert!(!is_bare_greeting(""));
    }
}
