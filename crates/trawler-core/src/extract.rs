//! The extraction rule engine: pure functions from a parsed document and a
//! rule to extracted JSON values. Independent of networking; the document
//! is parsed once per page and shared across rules.

use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};
use url::Url;

use crate::error::ScrapeError;
use crate::rule::{DataType, ScrapingRule};
use crate::transform;

/// Apply one rule to a parsed document.
///
/// A selector that matches nothing yields an empty list for the rule, not
/// an error. `page_url` is the URL the document was fetched from; it anchors
/// root-relative link/image resolution.
pub fn apply_rule(
    document: &Html,
    rule: &ScrapingRule,
    page_url: &str,
) -> Result<Value, ScrapeError> {
    let selector = parse_selector(&rule.selector)?;
    let matches: Vec<ElementRef<'_>> = document.select(&selector).collect();

    match rule.data_type {
        DataType::Text => {
            let values = matches
                .iter()
                .map(|el| match rule.attribute.as_deref() {
                    Some(attribute) => el.value().attr(attribute).unwrap_or_default().to_string(),
                    None => element_text(el),
                })
                .collect();
            let values = match &rule.transformation {
                Some(t) => transform::apply(values, t)?,
                None => values,
            };
            Ok(string_list(values))
        }
        DataType::Link => {
            let values = matches
                .iter()
                .filter_map(|el| el.value().attr("href"))
                .map(|href| resolve_url(href, page_url))
                .collect();
            Ok(string_list(values))
        }
        DataType::Image => Ok(Value::Array(
            matches
                .iter()
                .map(|el| {
                    let src = el
                        .value()
                        .attr("src")
                        .map(|src| resolve_url(src, page_url))
                        .unwrap_or_default();
                    let alt = el.value().attr("alt").unwrap_or_default();
                    json!({ "src": src, "alt": alt })
                })
                .collect(),
        )),
        DataType::Table => {
            let mut tables = Vec::new();
            for table in &matches {
                tables.extend(extract_table(table)?);
            }
            Ok(Value::Array(tables))
        }
        DataType::List => {
            let item_selector = parse_selector("li")?;
            Ok(Value::Array(
                matches
                    .iter()
                    .map(|el| {
                        Value::Array(
                            el.select(&item_selector)
                                .map(|item| Value::String(element_text(&item)))
                                .collect(),
                        )
                    })
                    .collect(),
            ))
        }
        DataType::Json => {
            let mut fragments = Vec::new();
            for el in &matches {
                let script: String = el.text().collect();
                scan_json_fragments(&script, &mut fragments);
            }
            Ok(Value::Array(fragments))
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Concatenated descendant text, trimmed.
fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn string_list(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

/// Resolve root-relative URLs against the page origin; absolute and
/// other relative forms pass through unchanged. Deliberately not full
/// RFC 3986 resolution.
fn resolve_url(href: &str, page_url: &str) -> String {
    if href.starts_with('/') {
        if let Ok(base) = Url::parse(page_url) {
            return format!("{}{}", base.origin().ascii_serialization(), href);
        }
    }
    href.to_string()
}

/// Rows of one `<table>`: the `<thead>` header cells (when present) as the
/// first row, then each remaining row's cells. Ragged rows are preserved
/// as-is, no padding.
fn extract_table(table: &ElementRef<'_>) -> Result<Vec<Value>, ScrapeError> {
    let header_selector = parse_selector("thead th")?;
    let row_selector = parse_selector("tr")?;
    let cell_selector = parse_selector("th, td")?;

    let mut rows = Vec::new();

    let headers: Vec<Value> = table
        .select(&header_selector)
        .map(|cell| Value::String(element_text(&cell)))
        .collect();
    let has_header = !headers.is_empty();
    if has_header {
        rows.push(Value::Array(headers));
    }

    for row in table.select(&row_selector) {
        if has_header && in_thead(&row) {
            continue;
        }
        let cells: Vec<Value> = row
            .select(&cell_selector)
            .map(|cell| Value::String(element_text(&cell)))
            .collect();
        if !cells.is_empty() {
            rows.push(Value::Array(cells));
        }
    }

    Ok(rows)
}

fn in_thead(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| ancestor.value().name() == "thead")
}

/// Scan text for brace-delimited fragments that parse as strict JSON.
///
/// Best-effort: brace matching is depth-aware but not string-aware, so a
/// fragment whose string literals contain braces is skipped rather than
/// recovered, and non-JSON `{...}` text is silently dropped.
fn scan_json_fragments(text: &str, out: &mut Vec<Value>) {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = matching_brace(bytes, i) {
                if let Ok(value) = serde_json::from_str::<Value>(&text[i..=end]) {
                    out.push(value);
                    i = end + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
}

fn matching_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Transform;

    const PAGE_URL: &str = "https://example.com/page";

    fn rule(selector: &str, data_type: DataType) -> ScrapingRule {
        ScrapingRule::new("out", selector, data_type)
    }

    fn extract(html: &str, rule: &ScrapingRule) -> Value {
        let document = Html::parse_document(html);
        apply_rule(&document, rule, PAGE_URL).unwrap()
    }

    #[test]
    fn text_rule_takes_stripped_inner_text() {
        let value = extract("<p>  Hello </p><p>World</p>", &rule("p", DataType::Text));
        assert_eq!(value, json!(["Hello", "World"]));
    }

    #[test]
    fn text_rule_with_clean_transformation() {
        let r = rule("p", DataType::Text).with_transformation(Transform::Clean);
        let value = extract("<p>Hello  World</p>", &r);
        assert_eq!(value, json!(["Hello World"]));
    }

    #[test]
    fn text_rule_reads_attribute_when_set() {
        let r = rule("p", DataType::Text).with_attribute("data-id");
        let value = extract(r#"<p data-id="42">ignored</p>"#, &r);
        assert_eq!(value, json!(["42"]));
    }

    #[test]
    fn no_match_yields_empty_list() {
        let value = extract("<p>text</p>", &rule("h1", DataType::Text));
        assert_eq!(value, json!([]));
    }

    #[test]
    fn link_rule_resolves_root_relative_hrefs() {
        let value = extract(r#"<a href="/x">x</a>"#, &rule("a", DataType::Link));
        assert_eq!(value, json!(["https://example.com/x"]));
    }

    #[test]
    fn link_rule_passes_through_other_forms() {
        let html = r#"<a href="https://other.example/y">y</a><a href="page2.html">z</a>"#;
        let value = extract(html, &rule("a", DataType::Link));
        assert_eq!(value, json!(["https://other.example/y", "page2.html"]));
    }

    #[test]
    fn link_rule_skips_elements_without_href() {
        let value = extract(r#"<a name="anchor"></a><a href="/x">x</a>"#, &rule("a", DataType::Link));
        assert_eq!(value, json!(["https://example.com/x"]));
    }

    #[test]
    fn image_rule_resolves_src_and_reads_alt() {
        let html = r#"<img src="/logo.png" alt="Logo"><img src="https://cdn.example/i.png">"#;
        let value = extract(html, &rule("img", DataType::Image));
        assert_eq!(
            value,
            json!([
                { "src": "https://example.com/logo.png", "alt": "Logo" },
                { "src": "https://cdn.example/i.png", "alt": "" },
            ])
        );
    }

    #[test]
    fn table_rule_includes_header_row_as_data() {
        let html = r#"
            <table>
              <thead><tr><th>A</th><th>B</th></tr></thead>
              <tbody><tr><td>1</td><td>2</td></tr></tbody>
            </table>
        "#;
        let value = extract(html, &rule("table", DataType::Table));
        assert_eq!(value, json!([["A", "B"], ["1", "2"]]));
    }

    #[test]
    fn table_rule_without_thead_keeps_all_rows() {
        let html = r#"<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"#;
        let value = extract(html, &rule("table", DataType::Table));
        assert_eq!(value, json!([["1", "2"], ["3"]]));
    }

    #[test]
    fn list_rule_yields_one_inner_list_per_element() {
        let html = r#"<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol>"#;
        let value = extract(html, &rule("ul, ol", DataType::List));
        assert_eq!(value, json!([["a", "b"], ["c"]]));
    }

    #[test]
    fn json_rule_parses_brace_fragments_in_scripts() {
        let html = r#"<script>var x = {"a": 1};</script>"#;
        let value = extract(html, &rule("script", DataType::Json));
        assert_eq!(value, json!([{ "a": 1 }]));
    }

    #[test]
    fn json_rule_drops_malformed_fragments() {
        let html = r#"<script>if (a) { doThing(); } var x = {"ok": true};</script>"#;
        let value = extract(html, &rule("script", DataType::Json));
        assert_eq!(value, json!([{ "ok": true }]));
    }

    #[test]
    fn json_rule_handles_nested_objects() {
        let html = r#"<script>window.state = {"user": {"id": 7}};</script>"#;
        let value = extract(html, &rule("script", DataType::Json));
        assert_eq!(value, json!([{ "user": { "id": 7 } }]));
    }

    #[test]
    fn resolve_url_keeps_protocol_relative_simplification() {
        // Root-relative resolution is deliberately literal: anything that
        // starts with '/' is glued to the origin.
        assert_eq!(
            resolve_url("/a/b", "https://example.com/page?q=1"),
            "https://example.com/a/b"
        );
        assert_eq!(resolve_url("mailto:x@example.com", PAGE_URL), "mailto:x@example.com");
    }
}
