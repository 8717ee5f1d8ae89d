// Prompt templates
// System prompts loaded from disk plus the built-in tool budget message

use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use super::error::{ChatError, ChatResult};
use crate::models::Metadata;
use crate::services::provider::Model;

const BUDGET_TEMPLATE: &str = "__tool_budget";

const BUDGET_TEXT: &str = "\
You may call tools in this conversation. {% if remaining > 1 -%}
You have at most {{ remaining }} tool calls left out of {{ total }}. \
Prefer answering directly once you have enough information.
{%- else -%}
This is your last chance to call a tool; after it you must answer with what you have.
{%- endif %}";

/// Separator between a prompt file's display name and its template text
const PROMPT_SEPARATOR: &str = "---";

/// A selectable system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptInfo {
    pub key: String,
    pub name: String,
}

pub struct PromptLibrary {
    tera: Tera,
    prompts: Vec<PromptInfo>,
}

impl PromptLibrary {
    /// Library holding only the built-in templates
    pub fn builtin() -> ChatResult<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(BUDGET_TEMPLATE, BUDGET_TEXT)?;

        Ok(Self {
            tera,
            prompts: Vec::new(),
        })
    }

    /// Load every prompt file in `directory`.
    ///
    /// Files look like `Display Name\n---\ntemplate text`; the key is the
    /// file name without extension. Files without a separator are skipped.
    pub fn load(directory: &Path) -> ChatResult<Self> {
        let mut library = Self::builtin()?;

        let entries = std::fs::read_dir(directory).map_err(|e| {
            ChatError::Template(format!("cannot read {}: {}", directory.display(), e))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| ChatError::Template(e.to_string()))?
                .path();

            if !path.is_file() {
                continue;
            }

            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let body = std::fs::read_to_string(&path)
                .map_err(|e| ChatError::Template(format!("{}: {}", path.display(), e)))?;

            let Some((name, text)) = body.split_once(PROMPT_SEPARATOR) else {
                log::warn!("[chat] Invalid prompt file: {}", path.display());
                continue;
            };

            library.add(key, name.trim(), text.trim())?;
        }

        library.prompts.sort_by(|a, b| a.name.cmp(&b.name));

        log::info!("[chat] Loaded {} prompts", library.prompts.len());

        Ok(library)
    }

    pub fn add(&mut self, key: &str, name: &str, text: &str) -> ChatResult<()> {
        self.tera.add_raw_template(key, text)?;

        self.prompts.retain(|prompt| prompt.key != key);
        self.prompts.push(PromptInfo {
            key: key.to_string(),
            name: name.to_string(),
        });

        Ok(())
    }

    pub fn prompts(&self) -> &[PromptInfo] {
        &self.prompts
    }

    pub fn contains(&self, key: &str) -> bool {
        self.prompts.iter().any(|prompt| prompt.key == key)
    }

    /// Render the system prompt for a request, followed by the user's own prompt.
    /// `None` when neither is set.
    pub fn render_system(
        &self,
        key: &str,
        metadata: &Metadata,
        model: &Model,
    ) -> ChatResult<Option<String>> {
        let mut sections: Vec<String> = Vec::new();

        if !key.is_empty() {
            if !self.contains(key) {
                return Err(ChatError::UnknownPrompt(key.to_string()));
            }

            let mut context = Context::new();
            context.insert("name", &model.name);
            context.insert("slug", &model.id);
            context.insert("date", &chrono::Utc::now().to_rfc2822());
            context.insert("timezone", &metadata.timezone);
            context.insert("platform", &metadata.platform);
            context.insert("user", &metadata.settings.name);

            sections.push(self.tera.render(key, &context)?);
        }

        let custom = metadata.settings.prompt.trim();
        if !custom.is_empty() {
            sections.push(custom.to_string());
        }

        Ok((!sections.is_empty()).then(|| sections.join("\n\n")))
    }

    /// Render the per-iteration tool budget message
    pub fn render_budget(&self, total: i64, remaining: i64) -> ChatResult<String> {
        let mut context = Context::new();
        context.insert("total", &total);
        context.insert("remaining", &remaining);

        Ok(self.tera.render(BUDGET_TEMPLATE, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::models::UserSettings;

    fn model() -> Model {
        Model {
            id: "openai/gpt-4o".to_string(),
            name: "GPT-4o".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_budget_mentions_remaining_calls() {
        let library = PromptLibrary::builtin().unwrap();

        let text = library.render_budget(4, 3).unwrap();
        assert_eq!(
            text,
            "You may call tools in this conversation. You have at most 3 tool calls left out of 4. \
             Prefer answering directly once you have enough information."
        );

        let last = library.render_budget(4, 1).unwrap();
        assert!(last.contains("last chance"));
        assert!(!last.contains("at most"));
    }

    #[test]
    fn test_load_prompt_directory() {
        let dir = tempfile::tempdir().unwrap();

        let mut file = std::fs::File::create(dir.path().join("coder.txt")).unwrap();
        write!(file, "Coding Assistant\n---\nYou are {{{{ name }}}} ({{{{ slug }}}}) helping {{{{ user }}}} on {{{{ platform }}}}.").unwrap();

        std::fs::write(dir.path().join("broken.txt"), "no separator here").unwrap();

        let library = PromptLibrary::load(dir.path()).unwrap();

        assert_eq!(
            library.prompts(),
            &[PromptInfo {
                key: "coder".to_string(),
                name: "Coding Assistant".to_string(),
            }]
        );

        let metadata = Metadata {
            timezone: "Europe/Berlin".to_string(),
            platform: "Linux".to_string(),
            settings: UserSettings {
                name: "Ada".to_string(),
                prompt: "Answer in German.".to_string(),
            },
        };

        let rendered = library
            .render_system("coder", &metadata, &model())
            .unwrap()
            .unwrap();

        assert_eq!(
            rendered,
            "You are GPT-4o (openai/gpt-4o) helping Ada on Linux.\n\nAnswer in German."
        );
    }

    #[test]
    fn test_render_system_unknown_and_empty() {
        let library = PromptLibrary::builtin().unwrap();

        assert!(matches!(
            library.render_system("missing", &Metadata::default(), &model()),
            Err(ChatError::UnknownPrompt(_))
        ));
        assert_eq!(
            library
                .render_system("", &Metadata::default(), &model())
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let result = PromptLibrary::load(Path::new("/nonexistent/chatloop/prompts"));
        assert!(matches!(result, Err(ChatError::Template(_))));
    }
}
