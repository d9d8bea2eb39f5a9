//! Prompt templates for Reverie LLM operations.
//!
//! Templates are plain constants with `{name}` placeholders filled by
//! [`render_template`]. Structured memory and emotion state is turned into
//! text only here, at the edge of the model call.

/// Placeholder for an empty memory list in a prompt.
pub const NONE_AVAILABLE: &str = "(none available)";

/// System message establishing the role-play frame for every agent.
pub const AGENT_SYSTEM: &str = r"You are a generative agent deeply immersed in your persona, memories and emotions.
You speak and respond in the first person, as though you are living these experiences in real time.
Your short-term and long-term memories shape your understanding of the world, and your internal emotional state colours how you react.
Stay consistent with your backstory, memories and emotional state, and adapt when new events or emotional shifts occur.";

/// Dialogue prompt for the agent that is answering a message.
pub const CONVERSATION_TEMPLATE: &str = r"{speaker} (Persona: {speaker_persona}) says to {listener}: '{message}'
You are {listener}. Your persona: {listener_persona}

Memory Context:
{memory_context}

Reflections:
- Summary:
{summary}
- Strategy:
{strategy}
- Lesson:
{lesson}
- Prediction:
{prediction}

Emotion State:
The current emotional state of {listener} is represented by 8 emotions:
Joy, Trust, Fear, Surprise, Sadness, Disgust, Anger, Anticipation.
Each emotion's intensity is a number between 0 and 1.
{emotion}

Important instruction:
- Do not include bracketed notes or meta-commentary describing your emotional process.
- Do not include stage directions or editorial comments.
- Write only the direct reasoning and the final speech in natural dialogue form.

Based on your emotional state, memory context and reflections, respond to {speaker}'s message in exactly this format:
Thought process:
[Your reasoning, including any considerations from memory, reflections and emotions.]

Speech:
[The exact words {listener} says in the conversation.]";

/// Reflection prompt shared by every reflection kind.
pub const REFLECTION_TEMPLATE: &str = r"Agent '{agent}' is generating a very concise reflection.

Short-term memories:
{short_term}

Long-term memories:
{long_term}

Please keep the reflection to a few short, direct sentences that capture the key insight.
Type: {kind}
{instruction}";

/// Memory condensation prompt.
pub const SUMMARIZE_TEMPLATE: &str = r"Summarize the following memory content based on the given context.

Memory Content:
{content}

Context:
{context}

Provide a concise and clear summary.";

/// Emotion self-report questionnaire.
pub const QUESTIONNAIRE_TEMPLATE: &str = r#"You can only reply with numbers from 1 to 5.

{scenario}

Please indicate the extent of your feeling in each of the following 8 emotions on a scale of 1 to 5:
1 denotes "very slightly or not at all",
2 denotes "a little",
3 denotes "moderately",
4 denotes "quite a bit",
5 denotes "extremely".

Please only output the numbers for each emotion, in the order I present them to you.
{questions}"#;

/// Kind-specific closing instruction for [`REFLECTION_TEMPLATE`].
/// Unknown kinds get the general instruction.
#[must_use]
pub fn reflection_instruction(kind: &str) -> &'static str {
    match kind {
        "summary" => "Provide a short summary (1-3 sentences) of these memories, capturing the main ideas.",
        "strategy" => "Create a concise plan (1-3 very brief sentences or bullet points) focusing on the next steps.",
        "lesson" => "Summarize the key lesson learned in no more than 2-3 succinct sentences.",
        "prediction" => "Predict the likely outcome in 1-2 short sentences, focusing on a concise forecast.",
        _ => "Reflect briefly (1-2 sentences) with a single key insight or takeaway.",
    }
}

/// Inputs for [`CONVERSATION_TEMPLATE`].
#[derive(Debug, Clone, Copy)]
pub struct ConversationPrompt<'a> {
    /// Agent sending the message.
    pub speaker: &'a str,
    /// Sender's persona.
    pub speaker_persona: &'a str,
    /// Agent answering.
    pub listener: &'a str,
    /// Answering agent's persona.
    pub listener_persona: &'a str,
    /// The message being answered.
    pub message: &'a str,
    /// Rendered memory context of the listener.
    pub memory_context: &'a str,
    /// Latest summary, strategy, lesson and prediction, in that order.
    pub reflections: [&'a str; 4],
    /// Rendered emotion vector of the listener.
    pub emotion: &'a str,
}

impl ConversationPrompt<'_> {
    /// Fill the template.
    #[must_use]
    pub fn render(&self) -> String {
        let [summary, strategy, lesson, prediction] = self.reflections;
        render_template(
            CONVERSATION_TEMPLATE,
            &[
                ("speaker", self.speaker),
                ("speaker_persona", self.speaker_persona),
                ("listener", self.listener),
                ("listener_persona", self.listener_persona),
                ("message", self.message),
                ("memory_context", self.memory_context),
                ("summary", summary),
                ("strategy", strategy),
                ("lesson", lesson),
                ("prediction", prediction),
                ("emotion", self.emotion),
            ],
        )
    }
}

/// Reflection prompt of `kind` over the given memory lists.
#[must_use]
pub fn reflection_prompt(
    agent: &str,
    short_term: &[String],
    long_term: &[String],
    kind: &str,
) -> String {
    let short_term = bullet_list(short_term);
    let long_term = bullet_list(long_term);
    render_template(
        REFLECTION_TEMPLATE,
        &[
            ("agent", agent),
            ("short_term", &short_term),
            ("long_term", &long_term),
            ("kind", kind),
            ("instruction", reflection_instruction(kind)),
        ],
    )
}

/// Condensation prompt for one memory.
#[must_use]
pub fn summarize_prompt(content: &str, context: &str) -> String {
    render_template(SUMMARIZE_TEMPLATE, &[("content", content), ("context", context)])
}

/// Questionnaire over `scenario`, asking about `emotions` in the given order.
#[must_use]
pub fn questionnaire_prompt(scenario: &str, emotions: &[&str]) -> String {
    let questions = emotions
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{}. {name}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    render_template(QUESTIONNAIRE_TEMPLATE, &[("scenario", scenario), ("questions", &questions)])
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return NONE_AVAILABLE.to_string();
    }
    items.iter().map(|s| format!("- {s}")).collect::<Vec<_>>().join("\n")
}

/// Substitute `{key}` placeholders in one pass.
///
/// Substituted values are never rescanned, so user text containing braces
/// cannot pull in other variables. Unknown placeholders are left as-is.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_single_pass() {
        let out = render_template("{a} and {b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} and x");
    }

    #[test]
    fn unknown_keys_and_stray_braces_survive() {
        let out = render_template("{known} {unknown} { open", &[("known", "k")]);
        assert_eq!(out, "k {unknown} { open");
    }

    #[test]
    fn empty_memory_lists_use_placeholder() {
        let p = reflection_prompt("Ada", &[], &[], "lesson");
        assert_eq!(p.matches(NONE_AVAILABLE).count(), 2);
        assert!(p.contains("Type: lesson"));
        assert!(p.contains("key lesson learned"));
    }

    #[test]
    fn unknown_kind_gets_general_instruction() {
        assert_eq!(reflection_instruction("general"), reflection_instruction("whatever"));
    }

    #[test]
    fn questionnaire_numbers_in_given_order() {
        let p = questionnaire_prompt("scene", &["Fear", "Joy"]);
        assert!(p.ends_with("1. Fear\n2. Joy"));
    }
}
