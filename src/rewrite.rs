use std::sync::OnceLock;
use std::time::Duration;

use ego_tree::NodeId;
use regex::{Captures, Regex};
use scraper::Html;
use scraper::node::Node;

use crate::error::BrowserError;
use crate::s3::ObjectStoreClient;

/// FastQC reports reference their assets through these two relative
/// subdirectories; everything else is left untouched.
pub const ASSET_DIRS: [&str; 2] = ["Images/", "Icons/"];

enum Edit {
    Attr { attr: &'static str, url: String },
    StyleText(String),
}

/// Rewrites relative `Images/` and `Icons/` references in a standalone FastQC
/// HTML page into presigned URLs resolved against the source key's parent.
/// Absolute references are skipped, so a second pass over already-rewritten
/// markup is a no-op.
pub fn rewrite_fastqc_html(
    client: &dyn ObjectStoreClient,
    bucket: &str,
    source_key: &str,
    ttl: Duration,
    markup: &str,
) -> Result<String, BrowserError> {
    let base = parent_prefix(source_key);
    let mut document = Html::parse_document(markup);
    let mut edits: Vec<(NodeId, Edit)> = Vec::new();

    for node in document.tree.nodes() {
        match node.value() {
            Node::Element(element) => {
                let attr = match element.name() {
                    "img" | "script" => "src",
                    "a" | "link" => "href",
                    _ => continue,
                };
                let Some(value) = element.attr(attr) else {
                    continue;
                };
                let Some(resolved) = resolve_asset_key(&base, value) else {
                    continue;
                };
                let url = client.presign_get(bucket, &resolved, ttl)?;
                edits.push((node.id(), Edit::Attr { attr, url }));
            }
            Node::Text(text) => {
                let inside_style = node.parent().is_some_and(|parent| {
                    matches!(parent.value(), Node::Element(el) if el.name() == "style")
                });
                if !inside_style {
                    continue;
                }
                if let Some(rewritten) = rewrite_style_urls(client, bucket, &base, ttl, text)? {
                    edits.push((node.id(), Edit::StyleText(rewritten)));
                }
            }
            _ => {}
        }
    }

    for (id, edit) in edits {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        match (node.value(), edit) {
            (Node::Element(element), Edit::Attr { attr, url }) => {
                if let Some((_, value)) = element
                    .attrs
                    .iter_mut()
                    .find(|(name, _)| &*name.local == attr)
                {
                    *value = url.as_str().into();
                }
            }
            (Node::Text(text), Edit::StyleText(rewritten)) => {
                text.text = rewritten.as_str().into();
            }
            _ => {}
        }
    }

    Ok(document.root_element().html())
}

fn style_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).unwrap())
}

fn rewrite_style_urls(
    client: &dyn ObjectStoreClient,
    bucket: &str,
    base: &str,
    ttl: Duration,
    text: &str,
) -> Result<Option<String>, BrowserError> {
    let mut failure: Option<BrowserError> = None;
    let mut changed = false;

    let rewritten = style_url_pattern().replace_all(text, |caps: &Captures<'_>| {
        if failure.is_some() {
            return caps[0].to_string();
        }
        match resolve_asset_key(base, caps[1].trim()) {
            Some(resolved) => match client.presign_get(bucket, &resolved, ttl) {
                Ok(url) => {
                    changed = true;
                    format!("url({url})")
                }
                Err(err) => {
                    failure = Some(err);
                    caps[0].to_string()
                }
            },
            None => caps[0].to_string(),
        }
    });

    if let Some(err) = failure {
        return Err(err);
    }
    Ok(changed.then(|| rewritten.into_owned()))
}

fn resolve_asset_key(base: &str, reference: &str) -> Option<String> {
    let trimmed = reference.trim();
    ASSET_DIRS
        .iter()
        .any(|dir| trimmed.starts_with(dir))
        .then(|| format!("{base}{trimmed}"))
}

fn parent_prefix(key: &str) -> String {
    key.rsplit_once('/')
        .map(|(parent, _)| format!("{parent}/"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_only_known_asset_dirs() {
        assert_eq!(
            resolve_asset_key("proj/FastQC/", "Images/per_base_quality.png").as_deref(),
            Some("proj/FastQC/Images/per_base_quality.png")
        );
        assert_eq!(
            resolve_asset_key("proj/FastQC/", "Icons/tick.png").as_deref(),
            Some("proj/FastQC/Icons/tick.png")
        );
        assert_eq!(resolve_asset_key("proj/FastQC/", "Data/raw.txt"), None);
        assert_eq!(
            resolve_asset_key("proj/FastQC/", "https://signed.example/Images/x.png"),
            None
        );
        assert_eq!(resolve_asset_key("proj/FastQC/", "/Images/x.png"), None);
    }

    #[test]
    fn parent_prefix_of_key() {
        assert_eq!(parent_prefix("proj/FastQC/sample_fastqc.html"), "proj/FastQC/");
        assert_eq!(parent_prefix("toplevel.html"), "");
    }

    #[test]
    fn style_pattern_matches_quoted_and_bare() {
        let pattern = style_url_pattern();
        let caps = pattern.captures(r#"background: url("Icons/bg.png");"#).unwrap();
        assert_eq!(&caps[1], "Icons/bg.png");
        let caps = pattern.captures("background: url(Icons/bg.png);").unwrap();
        assert_eq!(&caps[1], "Icons/bg.png");
    }
}
