//! YAML frontmatter splitting/rendering and wiki-link extraction

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

const DELIMITER: &str = "---";

static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]]+?)\]\]").expect("wikilink pattern is valid"));

/// Plain scalars a YAML 1.1 reader (Obsidian, PyYAML) would turn into a
/// date or a boolean
static YAML11_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-\d{1,2}-\d{1,2}(?:(?:[Tt]|[ \t]+)\d{1,2}:\d{2}:\d{2}(?:\.\d*)?(?:[ \t]*(?:Z|[-+]\d{1,2}(?::\d{2})?))?)?$",
    )
    .expect("timestamp pattern is valid")
});

static YAML11_BOOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:y|Y|yes|Yes|YES|n|N|no|No|NO|on|On|ON|off|Off|OFF)$")
        .expect("bool pattern is valid")
});

/// Frontmatter errors
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// Opening `---` without a closing one
    #[error("Frontmatter block is not terminated")]
    Unterminated,

    /// Block is not valid YAML
    #[error("Invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    /// Block parsed, but not to a key/value mapping
    #[error("Frontmatter is not a key/value mapping")]
    NotAMapping,
}

/// A note split into its frontmatter and body
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote {
    pub frontmatter: Mapping,
    pub body: String,
}

/// Split raw note text into its frontmatter mapping and body.
///
/// A frontmatter block must open on the first line with `---` and close on
/// a later line holding only `---`. The body is everything after the
/// closing line, unmodified. Without an opening delimiter the whole text is
/// body and the mapping is empty.
pub fn parse_note(text: &str) -> Result<ParsedNote, FrontmatterError> {
    let Some((yaml, body)) = split_frontmatter(text)? else {
        return Ok(ParsedNote {
            frontmatter: Mapping::new(),
            body: text.to_string(),
        });
    };

    Ok(ParsedNote {
        frontmatter: parse_mapping(yaml)?,
        body: body.to_string(),
    })
}

/// Locate the frontmatter block. Returns `(yaml, body)` slices.
fn split_frontmatter(text: &str) -> Result<Option<(&str, &str)>, FrontmatterError> {
    let Some(first_end) = text.find('\n') else {
        return Ok(None);
    };
    if text[..first_end].trim_end() != DELIMITER {
        return Ok(None);
    }

    let yaml_start = first_end + 1;
    let mut line_start = yaml_start;
    while line_start <= text.len() {
        let line_end = text[line_start..]
            .find('\n')
            .map(|i| line_start + i)
            .unwrap_or(text.len());

        if text[line_start..line_end].trim_end() == DELIMITER {
            let body_start = (line_end + 1).min(text.len());
            return Ok(Some((&text[yaml_start..line_start], &text[body_start..])));
        }

        if line_end == text.len() {
            break;
        }
        line_start = line_end + 1;
    }

    Err(FrontmatterError::Unterminated)
}

fn parse_mapping(yaml: &str) -> Result<Mapping, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }

    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => Err(FrontmatterError::NotAMapping),
    }
}

/// Render a note from a frontmatter mapping and an untouched body
///
/// String values that YAML 1.1 readers would retype (`2019-05-17`, `yes`)
/// are single-quoted so every reader sees a string.
pub fn render_note(frontmatter: &Mapping, body: &str) -> Result<String, FrontmatterError> {
    let yaml = quote_yaml11_scalars(&serde_yaml::to_string(frontmatter)?);
    let mut out = String::with_capacity(yaml.len() + body.len() + 8);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body);
    Ok(out)
}

/// Quote plain scalar values in emitted YAML that look like YAML 1.1
/// timestamps or booleans. Block scalar contents are left alone.
fn quote_yaml11_scalars(yaml: &str) -> String {
    let mut out = String::with_capacity(yaml.len() + 16);
    // indent of the line that opened a block scalar, while inside one
    let mut block_indent: Option<usize> = None;

    for line in yaml.split_inclusive('\n') {
        let content = line.trim_end_matches('\n');
        let indent = content.len() - content.trim_start_matches(' ').len();

        if let Some(opener) = block_indent {
            if content.trim().is_empty() || indent > opener {
                out.push_str(line);
                continue;
            }
            block_indent = None;
        }

        let Some((prefix, value)) = split_scalar(content) else {
            out.push_str(line);
            continue;
        };

        if value.starts_with('|') || value.starts_with('>') {
            block_indent = Some(indent);
            out.push_str(line);
        } else if YAML11_TIMESTAMP.is_match(value) || YAML11_BOOL.is_match(value) {
            out.push_str(prefix);
            out.push('\'');
            out.push_str(value);
            out.push('\'');
            out.push_str(&line[content.len()..]);
        } else {
            out.push_str(line);
        }
    }

    out
}

/// Split an emitted line into `(prefix, value)` where the value follows a
/// plain `key: ` or a `- ` sequence marker
fn split_scalar(line: &str) -> Option<(&str, &str)> {
    let mut rest = line.trim_start_matches(' ');
    while let Some(stripped) = rest.strip_prefix("- ") {
        rest = stripped;
    }

    let value = if rest.starts_with(['\'', '"', '?']) {
        // quoted or complex key
        return None;
    } else if let Some(pos) = rest.find(": ") {
        &rest[pos + 2..]
    } else if rest.len() < line.trim_start_matches(' ').len() {
        // sequence item without a key
        rest
    } else {
        return None;
    };

    let value = value.trim_start_matches(' ');
    if value.is_empty() {
        return None;
    }
    Some((&line[..line.len() - value.len()], value))
}

/// Every `[[...]]` occurrence in `text`, inner text only, in order
pub fn extract_wikilinks(text: &str) -> Vec<String> {
    WIKILINK
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Note name a raw wiki-link points at.
///
/// - `Name` gives `Name`
/// - `path/to/Name|Display` gives `Display` (text after the last pipe)
/// - `path/to/Name` gives `Name` (segment after the last slash)
///
/// A `#heading` suffix on an unaliased link is dropped.
pub fn link_target(raw: &str) -> Option<String> {
    let target = match raw.rfind('|') {
        Some(pipe) => &raw[pipe + 1..],
        None => {
            let name = raw.rsplit('/').next().unwrap_or(raw);
            name.split('#').next().unwrap_or(name)
        }
    };

    let target = target.trim();
    (!target.is_empty()).then(|| target.to_string())
}

/// `[[name]]`, unless `name` already is a wiki-link
pub fn format_wikilink(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("[[") && name.ends_with("]]") {
        name.to_string()
    } else {
        format!("[[{}]]", name)
    }
}
