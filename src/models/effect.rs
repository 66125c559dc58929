//! Effect templates: curated presets for image and video generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents an effect template from the `effect_templates` table.
///
/// When a job references a template, the template's `model` and `prompt_template`
/// are used, and a non-NULL `credits_cost` replaces the computed price.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EffectTemplate {
    pub id: Uuid,
    pub kind: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub preview_url: Option<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub prompt_template: String,
    pub credits_cost: Option<i64>,
    #[serde(skip_serializing)]
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl EffectTemplate {
    /// Fill `{prompt}` in the template with the user's text. Templates without the
    /// placeholder are used as-is, followed by the user's text when there is any.
    pub fn render_prompt(&self, user_prompt: &str) -> String {
        let user_prompt = user_prompt.trim();
        if self.prompt_template.contains("{prompt}") {
            self.prompt_template.replace("{prompt}", user_prompt)
        } else if user_prompt.is_empty() {
            self.prompt_template.clone()
        } else if self.prompt_template.is_empty() {
            user_prompt.to_string()
        } else {
            format!("{}, {}", self.prompt_template, user_prompt)
        }
    }
}

/// Query parameters for `GET /api/v1/effects`.
#[derive(Debug, Deserialize)]
pub struct EffectsQuery {
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(prompt_template: &str) -> EffectTemplate {
        EffectTemplate {
            id: Uuid::new_v4(),
            kind: "image".into(),
            slug: "ghibli".into(),
            name: "Ghibli".into(),
            description: None,
            preview_url: None,
            model: "style-v1".into(),
            prompt_template: prompt_template.into(),
            credits_cost: Some(6),
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn placeholder_is_substituted() {
        let t = template("{prompt}, hand-drawn anime style");
        assert_eq!(t.render_prompt(" a fox "), "a fox, hand-drawn anime style");
    }

    #[test]
    fn template_without_placeholder_appends_user_text() {
        let t = template("watercolor");
        assert_eq!(t.render_prompt(""), "watercolor");
        assert_eq!(t.render_prompt("a lake"), "watercolor, a lake");
        assert_eq!(template("").render_prompt("a lake"), "a lake");
    }
}
