//! Reading documents from disk. The engine never touches the filesystem;
//! everything it sees comes through here.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::parser::page::PageTextUnit;

/// Page separator in plain-text drawing sets.
pub const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, Clone, PartialEq)]
pub struct DrawingSet {
    pub name: String,
    pub pages: Vec<PageTextUnit>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DrawingSetFile {
    Pages(Vec<PageTextUnit>),
    Named {
        #[serde(default)]
        name: Option<String>,
        pages: Vec<PageTextUnit>,
    },
}

/// File stem, or the whole path when there is none.
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `.json` files hold pages; anything else is text split on form feeds.
pub fn load_drawing_set(path: &Path) -> Result<DrawingSet> {
    let content = read_text(path)?;
    let fallback = document_name(path);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Ok(DrawingSet {
            name: fallback,
            pages: pages_from_text(&content),
        });
    }
    let file: DrawingSetFile = serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let set = match file {
        DrawingSetFile::Pages(pages) => DrawingSet {
            name: fallback,
            pages,
        },
        DrawingSetFile::Named { name, pages } => DrawingSet {
            name: name.filter(|n| !n.trim().is_empty()).unwrap_or(fallback),
            pages,
        },
    };
    tracing::debug!(name = %set.name, pages = set.pages.len(), "loaded drawing set");
    Ok(set)
}

/// One page per form-feed-separated chunk, numbered from 1.
pub fn pages_from_text(text: &str) -> Vec<PageTextUnit> {
    text.split(PAGE_BREAK)
        .enumerate()
        .map(|(i, chunk)| PageTextUnit::new(i as u32 + 1, None, None, chunk))
        .collect()
}
