//! Citations embedded in answer markdown.
//!
//! The backend rewrites rulebook references into markdown links of the form
//! `[Catan Rules, Page 4](Catan/Catan%20Rules.pdf#page=4)`. Links to
//! `https://` pages are web citations; links with any other scheme are not
//! trusted and are ignored.

use std::sync::OnceLock;

use regex::Regex;

const PAGE_FRAGMENT: &str = "#page=";
const DEFAULT_TITLE: &str = "Rulebook";

/// A reference to a document served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CitationRef {
    document_path: String,
    page: Option<u32>,
}

impl CitationRef {
    /// Parse a relative document link, e.g. `Catan/Rules.pdf#page=4`.
    ///
    /// Returns `None` for empty paths and for anything carrying a URL scheme.
    #[must_use]
    pub fn parse(link: &str) -> Option<Self> {
        let link = link.trim();
        if has_scheme(link) {
            return None;
        }

        let (path, fragment) = match link.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (link, None),
        };
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return None;
        }

        let page = fragment
            .and_then(|f| f.strip_prefix(&PAGE_FRAGMENT[1..]))
            .and_then(|n| n.parse::<u32>().ok());

        Some(Self {
            document_path: path.to_string(),
            page,
        })
    }

    #[must_use]
    pub fn new(document_path: impl Into<String>, page: Option<u32>) -> Self {
        Self {
            document_path: document_path.into(),
            page,
        }
    }

    /// The document path without any fragment. This is the cache key.
    #[must_use]
    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    #[must_use]
    pub const fn page(&self) -> Option<u32> {
        self.page
    }
}

impl std::fmt::Display for CitationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.document_path)?;
        if let Some(page) = self.page {
            write!(f, "{PAGE_FRAGMENT}{page}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationTarget {
    Document(CitationRef),
    Web(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub target: CitationTarget,
}

impl Citation {
    #[must_use]
    pub fn document(&self) -> Option<&CitationRef> {
        match &self.target {
            CitationTarget::Document(doc) => Some(doc),
            CitationTarget::Web(_) => None,
        }
    }
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("citation link pattern is valid")
    })
}

fn has_scheme(link: &str) -> bool {
    let Some((scheme, _)) = link.split_once(':') else {
        return false;
    };
    !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !scheme.contains('/')
}

fn citation_title(text: &str) -> String {
    let title = text.split(',').next().unwrap_or_default().trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// Extract every citation from answer markdown, in order of appearance.
#[must_use]
pub fn citations(content: &str) -> Vec<Citation> {
    link_pattern()
        .captures_iter(content)
        .filter_map(|caps| {
            let text = caps.get(1)?.as_str();
            let link = caps.get(2)?.as_str();
            let target = if link.starts_with("https://") {
                CitationTarget::Web(link.to_string())
            } else {
                CitationTarget::Document(CitationRef::parse(link)?)
            };
            Some(Citation {
                title: citation_title(text),
                target,
            })
        })
        .collect()
}

/// Only the document citations of `content`.
#[must_use]
pub fn document_citations(content: &str) -> Vec<CitationRef> {
    citations(content)
        .into_iter()
        .filter_map(|citation| match citation.target {
            CitationTarget::Document(doc) => Some(doc),
            CitationTarget::Web(_) => None,
        })
        .collect()
}
