//! Card data: the declarative subjects of the data-driven suite

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Board column a card belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    WebApplication,
    Mobile,
    Marketing,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::WebApplication => "web-application",
            Category::Mobile => "mobile",
            Category::Marketing => "marketing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of UI behaviour to verify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Unique title; the lookup key into the scenario and tag registries
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Tag labels in display order
    #[serde(default)]
    pub tags: Vec<String>,

    pub category: Category,

    /// Declared tag count, checked against `tags` on load
    #[serde(default, rename = "tag_count", skip_serializing)]
    declared_tag_count: Option<usize>,
}

impl Card {
    pub fn new(title: impl Into<String>, tags: &[&str], category: Category) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category,
            declared_tag_count: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.title.trim().is_empty() {
            return Err(E2eError::CardData("card title must not be empty".to_string()));
        }
        if let Some(declared) = self.declared_tag_count {
            if declared != self.tags.len() {
                return Err(E2eError::CardData(format!(
                    "card '{}' declares tag_count {} but lists {} tag(s)",
                    self.title,
                    declared,
                    self.tags.len()
                )));
            }
        }
        Ok(())
    }
}

/// Expected design-system values asserted by the design scenarios
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTokens {
    /// Computed `background-color` of `button.primary`
    pub primary_button_color: String,

    /// Computed `font-family` of `body`
    pub body_font_family: String,

    /// Computed `font-size` of `h1`
    pub h1_font_size: String,
}

impl Default for DesignTokens {
    fn default() -> Self {
        Self {
            primary_button_color: "rgb(59, 130, 246)".to_string(),
            body_font_family: "Inter, system-ui, sans-serif".to_string(),
            h1_font_size: "36px".to_string(),
        }
    }
}

/// The full card data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDeck {
    pub cards: Vec<Card>,

    #[serde(default)]
    pub ui: DesignTokens,
}

impl CardDeck {
    /// Parse and validate a deck from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let deck: Self = serde_yaml::from_str(yaml)?;
        deck.validate()?;
        Ok(deck)
    }

    /// Parse and validate a deck from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::CardData(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    fn validate(&self) -> E2eResult<()> {
        let mut seen = HashSet::new();
        for card in &self.cards {
            card.validate()?;
            if !seen.insert(card.title.as_str()) {
                return Err(E2eError::CardData(format!("duplicate card title '{}'", card.title)));
            }
        }
        Ok(())
    }

    pub fn find(&self, title: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.title == title)
    }

    pub fn by_category(&self, category: Category) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.category == category).collect()
    }
}
