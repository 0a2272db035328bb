//! Prompt templates for specsmith stages
//!
//! Templates are plain text with `{name}` placeholders. [`render`] fills them
//! in, [`PromptSet`] holds one template per stage, and [`corrective_prompt`]
//! builds the follow-up prompt sent after an invalid completion.

use camino::{Utf8Path, Utf8PathBuf};
use specsmith_utils::types::StageId;
use thiserror::Error;

const BUILTIN_FEATURES: &str = include_str!("../templates/features.md");
const BUILTIN_STORIES: &str = include_str!("../templates/stories.md");
const BUILTIN_API_DB: &str = include_str!("../templates/api_db.md");
const BUILTIN_REFINE: &str = include_str!("../templates/refine.md");

/// Errors loading prompt templates from disk
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Templates directory not found: {path}")]
    DirectoryNotFound { path: Utf8PathBuf },

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Replace every `{name}` placeholder that has a binding.
///
/// Substitution is single-pass: text coming from a bound value is never
/// scanned for placeholders again. Placeholders without a binding, and
/// braces that do not form a placeholder, are copied verbatim.
///
/// # Example
///
/// ```rust
/// use specsmith_prompt_template::render;
///
/// let out = render("Hi {who}, {who}! {missing}", &[("who", "Ann")]);
/// assert_eq!(out, "Hi Ann, Ann! {missing}");
/// ```
#[must_use]
pub fn render(template: &str, bindings: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };

        let name = &after[..close];
        match bindings.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => {
                out.push_str(value);
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

/// The four stage templates used by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    features: String,
    stories: String,
    api_db: String,
    refine: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptSet {
    /// Templates compiled into the binary.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            features: BUILTIN_FEATURES.to_string(),
            stories: BUILTIN_STORIES.to_string(),
            api_db: BUILTIN_API_DB.to_string(),
            refine: BUILTIN_REFINE.to_string(),
        }
    }

    /// Built-in templates, overridden by any `<stage>.md` file found in `dir`.
    ///
    /// # Errors
    ///
    /// Fails if `dir` does not exist or an existing template cannot be read.
    pub fn from_dir(dir: &Utf8Path) -> Result<Self, PromptError> {
        if !dir.is_dir() {
            return Err(PromptError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut set = Self::builtin();
        for stage in [
            StageId::Features,
            StageId::Stories,
            StageId::ApiDb,
            StageId::Refine,
        ] {
            let path = dir.join(format!("{}.md", stage.as_str()));
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|source| PromptError::Read {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(stage = %stage, path = %path, "Using template override");
            *set.slot_mut(stage) = text;
        }

        Ok(set)
    }

    /// Load from an optional override directory.
    pub fn load(dir: Option<&Utf8Path>) -> Result<Self, PromptError> {
        match dir {
            Some(dir) => Self::from_dir(dir),
            None => Ok(Self::builtin()),
        }
    }

    /// Replace one stage's template.
    #[must_use]
    pub fn with_template(mut self, stage: StageId, template: impl Into<String>) -> Self {
        *self.slot_mut(stage) = template.into();
        self
    }

    /// The template for `stage`.
    #[must_use]
    pub fn template(&self, stage: StageId) -> &str {
        match stage {
            StageId::Features => &self.features,
            StageId::Stories => &self.stories,
            StageId::ApiDb => &self.api_db,
            StageId::Refine => &self.refine,
        }
    }

    fn slot_mut(&mut self, stage: StageId) -> &mut String {
        match stage {
            StageId::Features => &mut self.features,
            StageId::Stories => &mut self.stories,
            StageId::ApiDb => &mut self.api_db,
            StageId::Refine => &mut self.refine,
        }
    }
}

/// First line of the corrective prompt for each stage.
#[must_use]
pub const fn corrective_header(stage: StageId) -> &'static str {
    match stage {
        StageId::Features => "INVALID JSON. Return only valid JSON.",
        StageId::Stories => "Invalid output. Return ONLY JSON with 'user_stories' array.",
        StageId::ApiDb => "Missing keys or invalid JSON. Return FULL JSON only.",
        StageId::Refine => "Invalid or incomplete JSON. Return FULL refined spec.",
    }
}

/// Build the prompt sent after an invalid completion.
///
/// Layout:
///
/// ```text
/// <stage header>
/// Required keys: <k1>, <k2>
/// Previous:
/// <previous cleaned output>
///
/// Try again:
/// <original rendered prompt>
/// ```
#[must_use]
pub fn corrective_prompt(
    stage: StageId,
    required_keys: &[&str],
    previous: &str,
    rendered: &str,
) -> String {
    format!(
        "{}\nRequired keys: {}\nPrevious:\n{}\n\nTry again:\n{}",
        corrective_header(stage),
        required_keys.join(", "),
        previous,
        rendered
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render("{a}-{a}-{b}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "1-1-2");
    }

    #[test]
    fn test_render_leaves_unbound_and_json_braces() {
        let template = "Return {\n  \"modules\": []\n} for {requirements_text} {other}";
        let out = render(template, &[("requirements_text", "REQ")]);
        assert_eq!(out, "Return {\n  \"modules\": []\n} for REQ {other}");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render(
            "{features_json} / {original_requirements}",
            &[
                ("features_json", "{original_requirements}"),
                ("original_requirements", "text"),
            ],
        );
        assert_eq!(out, "{original_requirements} / text");
    }

    #[test]
    fn test_render_unclosed_brace() {
        assert_eq!(render("tail {open", &[("open", "x")]), "tail {open");
    }

    #[test]
    fn test_builtin_templates_reference_their_bindings() {
        let set = PromptSet::builtin();
        assert!(set.template(StageId::Features).contains("{requirements_text}"));
        assert!(set.template(StageId::Stories).contains("{features_json}"));
        assert!(set.template(StageId::Stories).contains("{original_requirements}"));
        assert!(set.template(StageId::ApiDb).contains("{input_json}"));
        assert!(set.template(StageId::ApiDb).contains("{original_requirements}"));
        assert!(set.template(StageId::Refine).contains("{current_spec}"));
        assert!(set.template(StageId::Refine).contains("{refinement_text}"));
    }

    #[test]
    fn test_from_dir_overrides_present_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("stories.md"), "custom {features_json}").unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap();

        let set = PromptSet::from_dir(path).unwrap();

        assert_eq!(set.template(StageId::Stories), "custom {features_json}");
        assert_eq!(set.template(StageId::Features), BUILTIN_FEATURES);
    }

    #[test]
    fn test_from_dir_missing_directory() {
        let err = PromptSet::from_dir(Utf8Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PromptError::DirectoryNotFound { .. }));
    }

    #[test]
    fn test_corrective_prompt_layout() {
        let prompt = corrective_prompt(
            StageId::Features,
            &["modules", "features_by_module"],
            "not json",
            "ORIGINAL",
        );
        assert_eq!(
            prompt,
            "INVALID JSON. Return only valid JSON.\nRequired keys: modules, features_by_module\nPrevious:\nnot json\n\nTry again:\nORIGINAL"
        );
    }

    proptest! {
        #[test]
        fn prop_render_without_bindings_is_identity(template in ".*") {
            prop_assert_eq!(render(&template, &[]), template);
        }

        #[test]
        fn prop_bound_placeholder_fully_replaced(
            prefix in "[^{}]*",
            suffix in "[^{}]*",
            value in "[^{}]*",
        ) {
            let template = format!("{prefix}{{x}}{suffix}{{x}}");
            let out = render(&template, &[("x", value.as_str())]);
            prop_assert_eq!(out, format!("{prefix}{value}{suffix}{value}"));
        }
    }
}
