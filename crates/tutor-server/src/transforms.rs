//! Personalization and translation: a prompt template relayed to the generator

use tracing::debug;

use tutor_core::{ChatMessage, GenerationProvider, Result};

use crate::requests::{TargetLanguage, UserBackground};

const PERSONALIZE_SYSTEM: &str = "You are a helpful assistant.";
const TRANSLATE_SYSTEM: &str = "You are a helpful translator.";

pub fn personalize_prompt(content: &str, background: &UserBackground) -> String {
    format!(
        "You are an educational content personalizer. Adjust the following technical content for a student with this background:

Experience Level: {level}
Software Background: {software}
Hardware Background: {hardware}

Original Content:
{content}

Instructions:
- If beginner: Simplify technical terms, add more explanations, use analogies
- If intermediate: Balance theory and practice, assume basic programming knowledge
- If advanced: Add advanced topics, reduce basic explanations, include optimization tips
- Adjust code examples complexity based on software background
- Reference hardware they know when explaining concepts

Provide the personalized version of the content maintaining the same structure and format.",
        level = background.experience_level,
        software = background.software_background,
        hardware = background.hardware_background,
    )
}

pub fn translate_prompt(content: &str, language: TargetLanguage) -> String {
    match language {
        TargetLanguage::Urdu => format!(
            "Translate the following technical content to Urdu (اردو). 
Keep technical terms in English but explain them in Urdu.
Maintain markdown formatting.

Content to translate:
{content}

Provide the Urdu translation:"
        ),
        TargetLanguage::English => format!(
            "Translate the following Urdu technical content back to English.
Maintain markdown formatting.

Content to translate:
{content}

Provide the English translation:"
        ),
    }
}

async fn relay(
    generator: &dyn GenerationProvider,
    system: &str,
    prompt: String,
    context: &str,
) -> Result<String> {
    let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
    let result = generator
        .generate(&messages)
        .await
        .map_err(|e| e.context(context))?;
    debug!(model = %result.model_id, tokens = ?result.tokens_used, "{context} finished");
    Ok(result.text)
}

/// Rewrite content for the reader's experience level and background
pub async fn personalize(
    generator: &dyn GenerationProvider,
    content: &str,
    background: &UserBackground,
) -> Result<String> {
    relay(
        generator,
        PERSONALIZE_SYSTEM,
        personalize_prompt(content, background),
        "personalizing content",
    )
    .await
}

pub async fn translate(
    generator: &dyn GenerationProvider,
    content: &str,
    language: TargetLanguage,
) -> Result<String> {
    relay(
        generator,
        TRANSLATE_SYSTEM,
        translate_prompt(content, language),
        "translating content",
    )
    .await
}
