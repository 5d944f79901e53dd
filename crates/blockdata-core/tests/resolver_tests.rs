//! Root-level resolution over the fragment DOM

use blockdata_core::{AttributeResolver, JsonSchemaValidator, NoMetadata};
use blockdata_model::{AttributeSchema, AttributeSource};
use blockdata_test_utils::FragmentDom;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn resolver() -> AttributeResolver {
    AttributeResolver::new(
        Arc::new(FragmentDom),
        Arc::new(NoMetadata),
        Arc::new(JsonSchemaValidator::new()),
    )
}

fn root_html() -> AttributeSchema {
    AttributeSchema::new(AttributeSource::Html { selector: None }).with_default("fallback")
}

fn root_text() -> AttributeSchema {
    AttributeSchema::new(AttributeSource::Text { selector: None }).with_default("fallback")
}

#[test]
fn root_html_reads_first_element() {
    let value = resolver().resolve(&root_html(), "\n<p>hi <em>x</em></p>\n", 0).unwrap();
    assert_eq!(value, json!("hi <em>x</em>"));
}

#[test]
fn root_text_strips_markup() {
    let value = resolver().resolve(&root_text(), "<p>hi <em>x</em></p>", 0).unwrap();
    assert_eq!(value, json!("hi x"));
}

#[test]
fn root_sources_without_element_use_default() {
    let r = resolver();
    for html in ["", "   ", "just text"] {
        assert_eq!(r.resolve(&root_html(), html, 0).unwrap(), json!("fallback"), "{html:?}");
        assert_eq!(r.resolve(&root_text(), html, 0).unwrap(), json!("fallback"), "{html:?}");
    }
}

#[test]
fn root_html_of_empty_element_is_kept() {
    let value = resolver().resolve(&root_html(), "<p></p>", 0).unwrap();
    assert_eq!(value, json!(""));
}
