//! Prompt and request building.
//!
//! Pure string templating: the same request always renders to the same text,
//! so sessions are reproducible against a recorded backend.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::category::Category;
use super::state::History;
use crate::ai::{InlineImage, StyleMode};

/// Everything needed to render one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub description: String,
    pub category: Category,
    pub history: History,
    /// Reference images
    #[serde(default)]
    pub media: Vec<InlineImage>,
}

/// Role instruction prepended to every text prompt of a category.
pub fn role_instruction(category: Category) -> String {
    match category {
        Category::Contract { kind } => format!(
            "Ты опытный юрист по гражданскому праву РФ. Составь {} на русском языке. \
             Структура: предмет договора, права и обязанности сторон, порядок оплаты, сроки, \
             ответственность сторон, порядок разрешения споров, реквизиты и подписи.",
            kind.label()
        ),
        Category::Design { kind } => format!(
            "Ты арт-директор дизайн-студии. Подготовь техническое задание (бриф) на дизайн. \
             Тип работы: {}. Бриф должен содержать цели, целевую аудиторию, стилистику, \
             референсы, форматы, сроки и критерии приёмки.",
            kind.label()
        ),
        Category::SocialPlan => "Ты SMM-стратег. Составь контент-план для Instagram на месяц: \
             публикации по дням с форматом, темой и текстом подписи."
            .to_string(),
        Category::Presentation => "Ты бизнес-консультант. Составь структуру коммерческого \
             предложения и презентации: заголовок и слайды с ключевыми тезисами."
            .to_string(),
        Category::Photo { mode } => style_instruction(mode.style).to_string(),
    }
}

/// Style prefix for image prompts.
pub fn style_instruction(style: StyleMode) -> &'static str {
    match style {
        StyleMode::Realistic => {
            "Photorealistic photo, natural light, high detail, shot on a full-frame camera. "
        }
        StyleMode::Studio => {
            "Professional studio photo, softbox lighting, clean seamless background. "
        }
        StyleMode::Cinematic => {
            "Cinematic still, anamorphic lens, dramatic lighting, film color grading. "
        }
        StyleMode::Anime => "Anime illustration, clean line art, vibrant cel shading. ",
        StyleMode::Render3d => "3D render, soft global illumination, octane style, smooth materials. ",
        StyleMode::Sketch => "Pencil sketch, expressive hand-drawn lines, paper texture. ",
    }
}

/// Image prompt: style prefix followed by the user's text.
pub fn build_image_prompt(style: StyleMode, prompt: &str) -> String {
    format!("{}{}", style_instruction(style), prompt.trim())
}

fn push_description(out: &mut String, request: &GenerationRequest) {
    out.push_str(&role_instruction(request.category));
    out.push_str("\n\nОписание от пользователя:\n");
    out.push_str(request.description.trim());
    out.push('\n');
}

fn push_history(out: &mut String, history: &History) {
    if history.is_empty() {
        return;
    }
    out.push_str("\nОтветы на уточняющие вопросы:\n");
    for (index, item) in history.iter().enumerate() {
        let _ = writeln!(out, "{}. Вопрос: {}", index + 1, item.question);
        let _ = writeln!(out, "   Ответ: {}", item.answer);
    }
}

/// Prompt asking for the first batch of clarifying questions.
pub fn build_questions_prompt(request: &GenerationRequest) -> String {
    let mut out = String::new();
    push_description(&mut out, request);
    out.push_str(
        "\nЗадай от 2 до 5 коротких уточняющих вопросов, без ответов на которые нельзя \
         подготовить качественный результат. Не задавай вопросов, ответ на которые уже есть \
         в описании. Верни JSON вида {\"questions\": [\"...\"]}.",
    );
    out
}

/// Prompt asking for the draft, carrying the full history.
///
/// On the final round the model is told to finish with what it has.
pub fn build_draft_prompt(request: &GenerationRequest, final_round: bool) -> String {
    let mut out = String::new();
    push_description(&mut out, request);
    push_history(&mut out, &request.history);

    let key = artifact_key(request.category);
    let _ = write!(
        out,
        "\nЕсли информации достаточно, верни JSON {{\"status\": \"complete\", \"{key}\": ...}}. \
         Если данных не хватает, верни {{\"status\": \"needs_info\", \"questions\": [\"...\"]}} \
         только с новыми вопросами."
    );
    if final_round {
        out.push_str(
            " Новых ответов не будет: обязательно верни status \"complete\", \
             а недостающие данные оставь полями для заполнения.",
        );
    }
    out
}

/// Prompt for flows that go straight to the artifact.
pub fn build_direct_prompt(request: &GenerationRequest) -> String {
    let mut out = String::new();
    push_description(&mut out, request);
    push_history(&mut out, &request.history);
    out.push_str("\nВерни только готовый текст документа, без пояснений и без Markdown-разметки.");
    out
}

/// Image prompt text for a photo session: the description plus any answered
/// questions. The style prefix is added by the gateway.
pub fn build_photo_prompt(request: &GenerationRequest) -> String {
    let mut out = request.description.trim().to_string();
    for item in request.history.iter() {
        if item.answer.trim().is_empty() {
            continue;
        }
        let _ = write!(out, "\n{} {}", item.question.trim(), item.answer.trim());
    }
    out
}

/// JSON field holding the artifact in a complete draft reply.
pub fn artifact_key(category: Category) -> &'static str {
    if category.produces_plan() {
        "plan"
    } else {
        "contract"
    }
}

/// Response schema for the questions request.
pub fn questions_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "questions": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["questions"]
    })
}

/// Response schema for the draft request of a category.
pub fn draft_schema(category: Category) -> Value {
    let artifact = match category {
        Category::SocialPlan => json!({
            "type": "OBJECT",
            "properties": {
                "posts": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "day": { "type": "INTEGER" },
                            "format": { "type": "STRING" },
                            "topic": { "type": "STRING" },
                            "caption": { "type": "STRING" }
                        }
                    }
                }
            }
        }),
        Category::Presentation => json!({
            "type": "OBJECT",
            "properties": {
                "title": { "type": "STRING" },
                "slides": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": { "type": "STRING" },
                            "bullets": { "type": "ARRAY", "items": { "type": "STRING" } }
                        }
                    }
                }
            }
        }),
        _ => json!({ "type": "STRING" }),
    };

    let mut properties = json!({
        "status": { "type": "STRING", "enum": ["complete", "needs_info"] },
        "questions": { "type": "ARRAY", "items": { "type": "STRING" } }
    });
    properties[artifact_key(category)] = artifact;

    json!({ "type": "OBJECT", "properties": properties, "required": ["status"] })
}
