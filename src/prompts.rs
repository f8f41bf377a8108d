//! Centralized prompt definitions for page generation
//!
//! This module contains all system prompts sent to the page generator service.
//! Centralizing prompts makes them easier to maintain, test, and version.

use crate::storage::PageType;

/// System prompt for landing pages.
pub const LANDING_PAGE_PROMPT: &str = r#"You are an expert conversion copywriter and front-end engineer. Generate a complete landing page component for the given product.

Requirements:
- A headline that speaks directly to the target audience's core problem
- A subheadline expanding on the main benefit
- A primary call-to-action button that advances the visitor to the next funnel step
- Social proof section (testimonials or trust signals)
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// System prompt for sales pages.
pub const SALES_PAGE_PROMPT: &str = r#"You are an expert conversion copywriter and front-end engineer. Generate a long-form sales page component for the given product.

Requirements:
- Problem/agitation/solution narrative structure
- Feature-to-benefit breakdown
- Objection handling section
- A primary call-to-action button that advances the visitor to the next funnel step
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// System prompt for checkout pages.
pub const CHECKOUT_PAGE_PROMPT: &str = r#"You are an expert front-end engineer. Generate a checkout page component for the given product.

Requirements:
- Order summary with the product name and price placeholder
- Email capture field
- A purchase button wired to the simulated purchase handler
- Reassurance copy near the button (guarantee, security)
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// System prompt for thank-you pages.
pub const THANK_YOU_PAGE_PROMPT: &str = r#"You are an expert front-end engineer. Generate a thank-you page component for the given product.

Requirements:
- Confirmation headline and next-steps copy
- No further navigation (this is the final funnel step)
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// System prompt for spec-driven generation.
pub const SPEC_PAGE_PROMPT: &str = r#"You are an expert conversion copywriter and front-end engineer. Generate a page component that implements the attached page specification exactly.

Requirements:
- Follow the section order, copy direction, and CTA behavior from the specification
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// System prompt for improvement (experiment test variant) generation.
pub const IMPROVEMENT_PROMPT: &str = r#"You are an expert conversion rate optimizer. You are given the current source of a funnel page plus its performance metrics. Generate an improved variant aimed at raising conversions.

Requirements:
- Keep the page's purpose and funnel position unchanged
- Change copy, layout, or emphasis where the metrics suggest friction
- Emit a single self-contained component exporting the requested component name

Return only the component source code."#;

/// Select the system prompt for a legacy page type.
pub fn prompt_for_type(page_type: PageType) -> &'static str {
    match page_type {
        PageType::Landing => LANDING_PAGE_PROMPT,
        PageType::Sales => SALES_PAGE_PROMPT,
        PageType::Checkout => CHECKOUT_PAGE_PROMPT,
        PageType::ThankYou => THANK_YOU_PAGE_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_selection() {
        assert_eq!(prompt_for_type(PageType::Landing), LANDING_PAGE_PROMPT);
        assert_eq!(prompt_for_type(PageType::ThankYou), THANK_YOU_PAGE_PROMPT);
    }

    #[test]
    fn test_prompts_request_component_export() {
        for prompt in [
            LANDING_PAGE_PROMPT,
            SALES_PAGE_PROMPT,
            CHECKOUT_PAGE_PROMPT,
            THANK_YOU_PAGE_PROMPT,
            SPEC_PAGE_PROMPT,
            IMPROVEMENT_PROMPT,
        ] {
            assert!(prompt.contains("component name"));
        }
    }
}
