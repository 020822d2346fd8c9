//! Template rendering - substitutes lead attributes into message templates
//!
//! Deliberately minimal string interpolation: named tokens only, no loops or
//! conditionals.

use nurture_storage::models::Lead;
use regex::Regex;

/// Placeholder used when a lead has no company on file
const COMPANY_FALLBACK: &str = "your company";

/// Render a message template with a lead's attributes
pub fn render_template(template: &str, lead: &Lead) -> String {
    let mut result = template.to_string();

    result = result.replace("{{first_name}}", lead.first_name.as_deref().unwrap_or(""));
    result = result.replace("{{last_name}}", lead.last_name.as_deref().unwrap_or(""));
    result = result.replace(
        "{{company}}",
        lead.company.as_deref().unwrap_or(COMPANY_FALLBACK),
    );
    result = result.replace("{{email}}", lead.email.as_deref().unwrap_or(""));

    remove_unused_placeholders(&result)
}

/// Render a subject line with a lead's attributes
pub fn render_subject(subject: &str, lead: &Lead) -> String {
    render_template(subject, lead)
}

/// Strip placeholders that had no matching lead field
fn remove_unused_placeholders(content: &str) -> String {
    let re = Regex::new(r"\{\{[^}]+\}\}").unwrap();
    re.replace_all(content, "").to_string()
}
