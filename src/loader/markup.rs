use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Parser, TagEnd};
use scraper::Html;

use super::{LoaderError, Section};

/// Elements whose text is never part of the readable content.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

fn read_string(path: &Path) -> Result<String, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub(crate) fn read_html(path: &Path) -> Result<Vec<Section>, LoaderError> {
    Ok(vec![Section::whole(html_to_text(&read_string(path)?))])
}

pub(crate) fn read_markdown(path: &Path) -> Result<Vec<Section>, LoaderError> {
    Ok(vec![Section::whole(markdown_to_text(&read_string(path)?))])
}

fn html_to_text(source: &str) -> String {
    let document = Html::parse_document(source);
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }

    parts.join("\n")
}

/// Plain text of a markdown document; block elements are separated by a
/// blank line so the chunker sees paragraph boundaries.
fn markdown_to_text(source: &str) -> String {
    let mut out = String::new();

    for event in Parser::new(source) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock,
            ) => out.push_str("\n\n"),
            _ => {}
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_skips_scripts() {
        let html = r#"<html><head><title>T</title><style>p { color: red }</style></head>
            <body><h1>Heading</h1><p>First <b>bold</b> line</p>
            <script>var x = 1;</script></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Heading"));
        assert!(text.contains("First"));
        assert!(text.contains("bold"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_markdown_to_text() {
        let md = "# Title\n\nSome *emphasis* and `code`.\n\n- item one\n- item two\n";
        let text = markdown_to_text(md);
        assert!(text.starts_with("Title\n\n"));
        assert!(text.contains("Some emphasis and code."));
        assert!(text.contains("item one"));
        assert!(!text.contains('#'));
        assert!(!text.contains('*'));
    }
}
