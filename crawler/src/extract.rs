//! Parses HTML tolerantly, resolving links against a base URL and
//! pulling out visible text. Built on `scraper`/`html5ever`, which are
//! error-correcting by construction: malformed markup never panics,
//! it just parses into whatever tree a browser would build from it.

use scraper::node::Node;
use scraper::{Html, Selector};
use url::Url;

const TEXT_EXCLUDED_TAGS: [&str; 5] = ["script", "style", "noscript", "iframe", "svg"];

pub struct ExtractedLinks {
    pub outlinks: Vec<String>,
    pub title: String,
}

/// Walks the document for `<a href>`s, resolving each against
/// `base_url` (or against a `<base href>` found in the document, if
/// any). Non-`http(s)` results are discarded. Never returns an error:
/// `scraper` always produces a best-effort tree, even for malformed
/// input.
pub fn extract_links(body: &str, base_url: &str) -> ExtractedLinks {
    let document = Html::parse_document(body);

    let base = effective_base(&document, base_url);

    let link_selector = Selector::parse("a").expect("static selector");
    let mut outlinks = Vec::new();
    for element in document.select(&link_selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() {
            continue;
        }
        if let Some(resolved) = resolve(&base, href) {
            outlinks.push(resolved);
        }
    }

    ExtractedLinks {
        outlinks,
        title: extract_title(&document),
    }
}

fn effective_base(document: &Html, base_url: &str) -> Url {
    let fallback = Url::parse(base_url).unwrap_or_else(|_| {
        Url::parse("about:blank").expect("about:blank always parses")
    });

    let base_selector = Selector::parse("base").expect("static selector");
    let Some(href) = document
        .select(&base_selector)
        .next()
        .and_then(|el| el.value().attr("href"))
    else {
        return fallback;
    };

    fallback.join(href).unwrap_or(fallback)
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.into()),
        _ => None,
    }
}

fn extract_title(document: &Html) -> String {
    let title_selector = Selector::parse("title").expect("static selector");
    document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default()
}

/// Whitespace-normalized visible text: text nodes joined by single
/// spaces, excluding descendants of `<script>`, `<style>`,
/// `<noscript>`, `<iframe>`, and `<svg>`.
pub fn extract_text(body: &str) -> String {
    let document = Html::parse_document(body);
    let mut buf = String::new();
    collect_text(document.tree.root(), &mut buf);
    normalize_whitespace(&buf)
}

fn collect_text(node: ego_tree::NodeRef<'_, Node>, buf: &mut String) {
    match node.value() {
        Node::Element(element) => {
            if TEXT_EXCLUDED_TAGS.contains(&element.name()) {
                return;
            }
        }
        Node::Text(text) => {
            buf.push_str(text);
            buf.push(' ');
            return;
        }
        _ => {}
    }
    for child in node.children() {
        collect_text(child, buf);
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_absolute_and_relative_links() {
        let html = r#"
            <html><body>
                <a href="/a">a</a>
                <a href="https://other.test/b">b</a>
                <a href="mailto:x@y.test">mail</a>
                <a>no href</a>
                <a href="">empty</a>
            </body></html>
        "#;
        let result = extract_links(html, "http://example.com/page");
        assert_eq!(
            result.outlinks,
            vec!["http://example.com/a", "https://other.test/b"]
        );
    }

    #[test]
    fn honors_base_tag() {
        let html = r#"
            <html><head><base href="https://cdn.test/assets/"></head>
            <body><a href="img.png">img</a></body></html>
        "#;
        let result = extract_links(html, "http://example.com/page");
        assert_eq!(result.outlinks, vec!["https://cdn.test/assets/img.png"]);
    }

    #[test]
    fn extracts_title() {
        let html = "<html><head><title>  Hello World </title></head><body></body></html>";
        let result = extract_links(html, "http://example.com/");
        assert_eq!(result.title, "  Hello World ");
    }

    #[test]
    fn title_empty_when_missing() {
        let result = extract_links("<html><body>no title</body></html>", "http://example.com/");
        assert_eq!(result.title, "");
    }

    #[test]
    fn never_panics_on_malformed_markup() {
        let html = "<html><body><div><a href='/x'>unterminated<div>";
        let result = extract_links(html, "http://example.com/");
        assert_eq!(result.outlinks, vec!["http://example.com/x"]);
    }

    #[test]
    fn text_excludes_script_and_style() {
        let html = r#"
            <html><body>
                <p>Visible one</p>
                <script>var x = "hidden";</script>
                <style>.c { color: red; }</style>
                <noscript>hidden too</noscript>
                <iframe>also hidden</iframe>
                <svg><text>svg text hidden</text></svg>
                <p>Visible two</p>
            </body></html>
        "#;
        let text = extract_text(html);
        assert_eq!(text, "Visible one Visible two");
    }

    #[test]
    fn text_collapses_whitespace() {
        let html = "<html><body>  multiple   \n\n spaces  \t here </body></html>";
        assert_eq!(extract_text(html), "multiple spaces here");
    }
}
