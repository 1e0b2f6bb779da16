//! Prompt template system for the advisor flows.
//!
//! This module provides:
//! - Handlebars-based prompt templates
//! - The crop recommendation and plant disease templates
//! - Dynamic template rendering with context

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::HashMap;

use crate::errors::{AdvisorError, AdvisorResult};

mod crop_recommendation;
mod plant_disease;

pub use crop_recommendation::{CropRecommendationContext, CROP_RECOMMENDATION};
pub use plant_disease::{PlantDiseaseContext, PLANT_DISEASE};

/// A prompt template with system and user messages.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Template ID
    pub id: String,
    /// Template version
    pub version: String,
    /// Description
    pub description: String,
    /// System prompt template
    pub system: String,
    /// User prompt template
    pub user: String,
}

impl PromptTemplate {
    /// Create a new prompt template.
    pub fn new(id: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: "1.0.0".to_string(),
            description: String::new(),
            system: system.into(),
            user: user.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Render the template with the given context.
    pub fn render<T: Serialize>(&self, context: &T) -> AdvisorResult<(String, String)> {
        let mut handlebars = create_handlebars();

        handlebars
            .register_template_string("system", &self.system)
            .map_err(|e| template_error(format!("Invalid system template: {e}")))?;

        handlebars
            .register_template_string("user", &self.user)
            .map_err(|e| template_error(format!("Invalid user template: {e}")))?;

        let system = handlebars
            .render("system", context)
            .map_err(|e| template_error(format!("Failed to render system prompt: {e}")))?;

        let user = handlebars
            .render("user", context)
            .map_err(|e| template_error(format!("Failed to render user prompt: {e}")))?;

        Ok((system, user))
    }
}

fn template_error(reason: String) -> AdvisorError {
    AdvisorError::Template { reason }
}

/// Create a Handlebars instance with custom helpers.
fn create_handlebars() -> Handlebars<'static> {
    let mut handlebars = Handlebars::new();

    // Prompts are not HTML
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars.set_strict_mode(true);

    // Helper: {{{json value}}}
    handlebars.register_helper(
        "json",
        Box::new(
            |h: &handlebars::Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut handlebars::RenderContext,
             out: &mut dyn handlebars::Output| {
                if let Some(param) = h.param(0) {
                    let json = serde_json::to_string_pretty(param.value())
                        .unwrap_or_else(|_| "null".to_string());
                    out.write(&json)?;
                }
                Ok(())
            },
        ),
    );

    // Helper: {{num value}} prints whole numbers without a trailing ".0"
    handlebars.register_helper(
        "num",
        Box::new(
            |h: &handlebars::Helper,
             _: &Handlebars,
             _: &handlebars::Context,
             _: &mut handlebars::RenderContext,
             out: &mut dyn handlebars::Output| {
                if let Some(value) = h.param(0).and_then(|p| p.value().as_f64()) {
                    out.write(&format_number(value))?;
                }
                Ok(())
            },
        ),
    );

    handlebars
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Prompt manager for loading and rendering templates.
pub struct PromptManager {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptManager {
    /// Create a new prompt manager with default templates.
    pub fn new() -> Self {
        let mut manager = Self {
            templates: HashMap::new(),
        };

        manager.register(crop_recommendation::template());
        manager.register(plant_disease::template());

        manager
    }

    /// Register a template, replacing one with the same ID.
    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// Get a template by ID.
    pub fn get(&self, id: &str) -> Option<&PromptTemplate> {
        self.templates.get(id)
    }

    /// Render a template with context.
    pub fn render<T: Serialize>(&self, id: &str, context: &T) -> AdvisorResult<(String, String)> {
        let template = self
            .get(id)
            .ok_or_else(|| template_error(format!("Template '{id}' not found")))?;
        template.render(context)
    }

    /// List all template IDs.
    pub fn template_ids(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::new()
    }
}
