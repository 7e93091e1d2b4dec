/*!
 * HTML exchange format.
 *
 * The job id and languages are stored in `<meta>` elements. Every job item
 * is a `<div class="asset">` and every translatable leaf a
 * `<div class="atom">` whose content the translator replaces. Protected
 * substrings are wrapped in `<span translate="no">`.
 */

use log::debug;
use quick_xml::escape::{escape, unescape as unescape_entities};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::{self, Write};

use crate::data::{apply_escape, is_html_format, unescape, EscapeMarkers};
use crate::errors::JobError;
use crate::job::Job;

use super::inline::{escapes_outside_tags, render_leaf, structural_count};
use super::{
    malformed, parse_unit_id, unit_id, ExchangeDocument, ExchangeFormat, ExchangeHeader,
    ExchangeUnit, ExportOptions,
};

/// Format id
pub const HTML_FORMAT_ID: &str = "html";

/// HTML exchange format
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlFormat;

impl HtmlFormat {
    /// Create the format
    pub fn new() -> Self {
        Self
    }

    /// Markers wrapped around protected substrings
    pub fn escape_markers() -> EscapeMarkers {
        EscapeMarkers::new(r#"<span translate="no">"#, "</span>")
    }
}

impl ExchangeFormat for HtmlFormat {
    fn id(&self) -> &str {
        HTML_FORMAT_ID
    }

    fn label(&self) -> &str {
        "HTML"
    }

    fn export(&self, job: &Job, _options: &ExportOptions) -> Result<Vec<u8>, JobError> {
        let mut out = String::new();
        write_document(&mut out, job)
            .map_err(|e| JobError::InvalidData(format!("cannot render HTML for job {}: {}", job.id, e)))?;
        Ok(out.into_bytes())
    }

    fn parse(&self, bytes: &[u8]) -> Result<ExchangeDocument, JobError> {
        let mut reader = Reader::from_reader(bytes);
        reader.trim_text(false);
        reader.check_end_names(false);

        let mut buf = Vec::new();
        let mut saw_root = false;
        let mut job_id = None;
        let mut source_language = None;
        let mut target_language = None;
        let mut item_leaf_counts = Vec::new();
        let mut units = Vec::new();
        let mut div_depth: usize = 0;
        let mut atom: Option<OpenAtom> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(malformed)?;
            match event {
                Event::Eof => break,
                Event::Start(element) | Event::Empty(element)
                    if element.local_name().as_ref() == b"meta" && atom.is_none() =>
                {
                    let name = attribute(&element, "name")?;
                    let content = attribute(&element, "content")?;
                    match (name.as_deref(), content) {
                        (Some("JobID"), Some(content)) => {
                            job_id = Some(content.trim().parse::<i64>().map_err(|_| {
                                malformed(format!("invalid job id '{}'", content))
                            })?);
                        }
                        (Some("languageSource"), content) => source_language = content,
                        (Some("languageTarget"), content) => target_language = content,
                        _ => {}
                    }
                }
                Event::Start(element) if element.local_name().as_ref() == b"html" => {
                    saw_root = true;
                }
                Event::Start(element) if element.local_name().as_ref() == b"div" => {
                    div_depth += 1;
                    let class = if atom.is_none() { class_of(&element)? } else { None };
                    match class.as_deref() {
                        Some("asset") => {
                            let id = attribute(&element, "id")?.and_then(|id| id.trim().parse().ok());
                            let leaves = attribute(&element, "data-leaves")?
                                .and_then(|count| count.trim().parse().ok());
                            if let (Some(id), Some(leaves)) = (id, leaves) {
                                item_leaf_counts.push((id, leaves));
                            }
                        }
                        Some("atom") => {
                            atom = Some(OpenAtom::read(&element, div_depth, reader.buffer_position())?);
                        }
                        _ => {}
                    }
                }
                Event::Empty(element)
                    if element.local_name().as_ref() == b"div" && atom.is_none() =>
                {
                    if class_of(&element)?.as_deref() == Some("atom") {
                        let open = OpenAtom::read(&element, div_depth, 0)?;
                        units.push(open.into_unit(String::new())?);
                    }
                }
                Event::End(element) if element.local_name().as_ref() == b"div" => {
                    let closes_atom = atom.as_ref().is_some_and(|open| open.depth == div_depth);
                    if closes_atom {
                        let end = reader.buffer_position();
                        if let Some(open) = atom.take() {
                            let content_end = bytes[..end]
                                .windows(2)
                                .rposition(|window| window == b"</")
                                .filter(|position| *position >= open.start)
                                .ok_or_else(|| malformed("unterminated atom"))?;
                            let raw = String::from_utf8_lossy(&bytes[open.start..content_end]);
                            let target = open.decode(&raw);
                            units.push(open.into_unit(target)?);
                        }
                    }
                    div_depth = div_depth
                        .checked_sub(1)
                        .ok_or_else(|| malformed("unbalanced div"))?;
                }
                _ => {}
            }
            buf.clear();
        }

        if atom.is_some() || div_depth != 0 {
            return Err(malformed("unexpected end of document"));
        }
        if !saw_root {
            return Err(malformed("not an HTML document"));
        }
        let job_id = job_id.ok_or_else(|| malformed("missing JobID meta element"))?;
        let source_language =
            source_language.ok_or_else(|| malformed("missing languageSource meta element"))?;
        let target_language =
            target_language.ok_or_else(|| malformed("missing languageTarget meta element"))?;

        debug!("Parsed HTML document for job {} with {} units", job_id, units.len());
        Ok(ExchangeDocument {
            header: ExchangeHeader {
                job_id,
                source_language,
                target_language,
                item_leaf_counts,
            },
            units,
        })
    }
}

fn write_document(out: &mut String, job: &Job) -> fmt::Result {
    let markers = HtmlFormat::escape_markers();

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>")?;
    writeln!(out, "  <head>")?;
    writeln!(out, r#"    <meta charset="utf-8"/>"#)?;
    writeln!(out, r#"    <meta name="JobID" content="{}"/>"#, job.id)?;
    writeln!(
        out,
        r#"    <meta name="languageSource" content="{}"/>"#,
        escape(job.source_language.as_str())
    )?;
    writeln!(
        out,
        r#"    <meta name="languageTarget" content="{}"/>"#,
        escape(job.target_language.as_str())
    )?;
    writeln!(out, "    <title>Job ID {}</title>", job.id)?;
    writeln!(out, "  </head>")?;
    writeln!(out, "  <body>")?;

    for item in &job.items {
        let leaves = item.data.translatable_leaves();
        writeln!(
            out,
            r#"    <div class="asset" id="{}" data-leaves="{}">"#,
            item.id,
            leaves.len()
        )?;
        for (path, leaf) in leaves {
            let content = if leaf.is_html() {
                apply_escape(&leaf.text, &escapes_outside_tags(&leaf.text, &leaf.escape), &markers)
            } else {
                render_leaf(leaf, &markers, false)
            };
            writeln!(
                out,
                r#"      <div class="atom" id="{}" data-format="{}" data-structure="{}">{}</div>"#,
                escape(unit_id(item.id, &path).as_str()),
                escape(leaf.format.as_str()),
                structural_count(&leaf.text),
                content
            )?;
        }
        writeln!(out, "    </div>")?;
    }

    writeln!(out, "  </body>")?;
    writeln!(out, "</html>")?;
    Ok(())
}

/// An atom whose content is being read
#[derive(Debug)]
struct OpenAtom {
    id: String,
    format: String,
    recorded_count: Option<usize>,
    depth: usize,
    start: usize,
}

impl OpenAtom {
    fn read(element: &BytesStart, depth: usize, start: usize) -> Result<Self, JobError> {
        Ok(Self {
            id: attribute(element, "id")?.ok_or_else(|| malformed("atom without id"))?,
            format: attribute(element, "data-format")?.unwrap_or_default(),
            recorded_count: attribute(element, "data-structure")?
                .and_then(|count| count.trim().parse().ok()),
            depth,
            start,
        })
    }

    /// Remove protection markers and, for plain text, entity escaping
    fn decode(&self, raw: &str) -> String {
        let text = unescape(raw, &HtmlFormat::escape_markers());
        if is_html_format(&self.format) {
            return text;
        }
        match unescape_entities(&text) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => text,
        }
    }

    fn into_unit(self, target: String) -> Result<ExchangeUnit, JobError> {
        let (item_id, path) = parse_unit_id(&self.id)?;
        Ok(ExchangeUnit {
            item_id,
            path,
            target,
            recorded_count: self.recorded_count,
        })
    }
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>, JobError> {
    match element.try_get_attribute(name).map_err(malformed)? {
        Some(attribute) => Ok(Some(attribute.unescape_value().map_err(malformed)?.into_owned())),
        None => Ok(None),
    }
}

fn class_of(element: &BytesStart) -> Result<Option<String>, JobError> {
    Ok(attribute(element, "class")?.map(|class| class.trim().to_string()))
}
