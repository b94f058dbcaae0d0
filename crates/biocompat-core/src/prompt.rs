//! Presentation data carried with a request

use serde::{Deserialize, Serialize};

use crate::error::{BiometricError, Result};

/// Texts the host shows in its biometric prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub negative_button_text: String,
}

impl PromptInfo {
    pub fn builder() -> PromptInfoBuilder {
        PromptInfoBuilder::default()
    }
}

/// Builder validating the required prompt texts
#[derive(Debug, Default, Clone)]
pub struct PromptInfoBuilder {
    title: Option<String>,
    subtitle: Option<String>,
    description: Option<String>,
    negative_button_text: Option<String>,
}

impl PromptInfoBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn negative_button_text(mut self, text: impl Into<String>) -> Self {
        self.negative_button_text = Some(text.into());
        self
    }

    /// Title and negative button text are required
    pub fn build(self) -> Result<PromptInfo> {
        let title = self
            .title
            .ok_or_else(|| BiometricError::Config("prompt title is required".to_string()))?;
        let negative_button_text = self.negative_button_text.ok_or_else(|| {
            BiometricError::Config("prompt negative button text is required".to_string())
        })?;

        Ok(PromptInfo {
            title,
            subtitle: self.subtitle,
            description: self.description,
            negative_button_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        assert!(PromptInfo::builder().title("Sign in").build().is_err());
        assert!(PromptInfo::builder().negative_button_text("Cancel").build().is_err());

        let prompt = PromptInfo::builder()
            .title("Sign in")
            .subtitle("Confirm it's you")
            .negative_button_text("Cancel")
            .build()
            .unwrap();
        assert_eq!(prompt.title, "Sign in");
        assert_eq!(prompt.description, None);
    }
}
