/*!
 * Inline markup handling shared by the exchange formats.
 *
 * Markup tags inside a leaf are its structural elements. Their number is
 * recorded on export and compared on import. For XLIFF they can be masked
 * as `<bpt>`, `<ept>` and `<x>` inline elements so translation tools do not
 * touch them.
 */

use once_cell::sync::Lazy;
use quick_xml::escape::escape;
use regex::Regex;
use std::collections::BTreeMap;

use crate::data::{apply_escape, DataLeaf, EscapeMarkers, EscapedString};

/// Regex for a single markup tag: closing slash, name, self-closing slash
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:-]*)(?:\s[^<>]*?)?(/?)>").expect("Invalid tag regex")
});

/// Elements that never have a closing tag
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Private use code points marking protected substrings while markup is rewritten
const PROTECTED_START: &str = "\u{E000}";
const PROTECTED_END: &str = "\u{E001}";

/// Number of structural elements (markup tags) in a text
pub fn structural_count(text: &str) -> usize {
    TAG_REGEX.find_iter(text).count()
}

/// Escape entries of `text` that do not overlap a markup tag
///
/// Markers placed inside a tag would land in attribute values, where
/// neither exchange format can carry them.
pub fn escapes_outside_tags(
    text: &str,
    escape: &BTreeMap<usize, EscapedString>,
) -> BTreeMap<usize, EscapedString> {
    let tags: Vec<(usize, usize)> = TAG_REGEX
        .find_iter(text)
        .map(|tag| (tag.start(), tag.end()))
        .collect();
    escape
        .iter()
        .filter(|&(&offset, escaped)| {
            let end = offset + escaped.string.len();
            !tags.iter().any(|&(start, stop)| offset < stop && end > start)
        })
        .map(|(&offset, escaped)| (offset, escaped.clone()))
        .collect()
}

/// Render a leaf as escaped XML content
///
/// Protected substrings are wrapped with `markers`, which are inserted
/// verbatim. With `mask_tags`, markup tags become XLIFF inline elements;
/// otherwise they are escaped as text.
pub fn render_leaf(leaf: &DataLeaf, markers: &EscapeMarkers, mask_tags: bool) -> String {
    let protected = apply_escape(
        &leaf.text,
        &escapes_outside_tags(&leaf.text, &leaf.escape),
        &EscapeMarkers::new(PROTECTED_START, PROTECTED_END),
    );
    let content = if mask_tags {
        mask_markup(&protected)
    } else {
        escape(protected.as_str()).into_owned()
    };
    content
        .replace(PROTECTED_START, &markers.start)
        .replace(PROTECTED_END, &markers.end)
}

/// Replace markup tags with XLIFF inline elements, escaping the text between
fn mask_markup(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut open: Vec<(String, usize)> = Vec::new();
    let mut next_id = 1;
    let mut last = 0;

    for captures in TAG_REGEX.captures_iter(text) {
        let Some(tag) = captures.get(0) else {
            continue;
        };
        output.push_str(&escape(&text[last..tag.start()]));
        last = tag.end();

        let closing = !captures[1].is_empty();
        let self_closing = !captures[3].is_empty();
        let name = captures[2].to_lowercase();
        let id = next_id;
        next_id += 1;
        let markup = escape(tag.as_str());

        if closing {
            match open.iter().rposition(|(open_name, _)| *open_name == name) {
                Some(position) => {
                    let (_, rid) = open.remove(position);
                    output.push_str(&format!(
                        r#"<ept id="{}" rid="{}">{}</ept>"#,
                        id, rid, markup
                    ));
                }
                None => output.push_str(&placeholder(id, &name, &markup)),
            }
        } else if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            output.push_str(&placeholder(id, &name, &markup));
        } else {
            open.push((name.clone(), id));
            output.push_str(&format!(
                r#"<bpt id="{}" rid="{}" ctype="x-{}">{}</bpt>"#,
                id, id, name, markup
            ));
        }
    }
    output.push_str(&escape(&text[last..]));
    output
}

fn placeholder(id: usize, name: &str, markup: &str) -> String {
    format!(r#"<x id="{}" ctype="x-{}" equiv-text="{}"/>"#, id, name, markup)
}
