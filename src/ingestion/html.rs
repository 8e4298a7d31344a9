//! Minimal HTML reading for the NRCan publication: tables as text grids, page text as lines

use regex::Regex;

/// A `<table>` reduced to the text of its cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// All cell text, one line per row
    pub fn text(&self) -> String {
        self.rows
            .iter()
            .map(|r| r.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.rows
            .iter()
            .any(|r| r.iter().any(|c| c.contains(needle)))
    }
}

/// Parsed page: its tables and its visible text
#[derive(Debug, Clone, Default)]
pub struct HtmlDocument {
    pub tables: Vec<HtmlTable>,
    pub text: String,
}

pub struct HtmlParser {
    table: Regex,
    row: Regex,
    cell: Regex,
    invisible: Regex,
    line_break: Regex,
    cell_break: Regex,
    tag: Regex,
    numeric_entity: Regex,
    spaces: Regex,
}

impl HtmlParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            table: Regex::new(r"(?is)<table\b.*?</table>")?,
            row: Regex::new(r"(?is)<tr\b.*?</tr>")?,
            cell: Regex::new(r"(?is)<t[hd]\b[^>]*>(.*?)</t[hd]>")?,
            invisible: Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")?,
            line_break: Regex::new(r"(?i)<br\s*/?>|</(tr|p|li|div|h[1-6]|caption|table|thead|tbody)>")?,
            cell_break: Regex::new(r"(?i)</t[hd]>")?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
            numeric_entity: Regex::new(r"&#(x?)([0-9a-fA-F]+);")?,
            spaces: Regex::new(r"[ \t\r\u{a0}]+")?,
        })
    }

    pub fn parse(&self, html: &str) -> HtmlDocument {
        let html = self.invisible.replace_all(html, "");

        let tables = self
            .table
            .find_iter(&html)
            .map(|m| self.parse_table(m.as_str()))
            .collect();

        HtmlDocument {
            tables,
            text: self.page_text(&html),
        }
    }

    fn parse_table(&self, html: &str) -> HtmlTable {
        let rows = self
            .row
            .find_iter(html)
            .map(|row| {
                self.cell
                    .captures_iter(row.as_str())
                    .map(|c| self.inline_text(c.get(1).map_or("", |m| m.as_str())))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        HtmlTable { rows }
    }

    /// Text of a fragment with all whitespace collapsed to single spaces
    fn inline_text(&self, html: &str) -> String {
        let text = self.tag.replace_all(html, " ");
        let text = self.decode_entities(&text);
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Visible text with one line per block element and table row
    fn page_text(&self, html: &str) -> String {
        let text = self.cell_break.replace_all(html, " ");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.tag.replace_all(&text, "");
        let text = self.decode_entities(&text);
        let text = self.spaces.replace_all(&text, " ");

        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn decode_entities(&self, text: &str) -> String {
        let text = self.numeric_entity.replace_all(text, |caps: &regex::Captures| {
            let radix = if caps[1].is_empty() { 10 } else { 16 };
            u32::from_str_radix(&caps[2], radix)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        });

        text.replace("&nbsp;", " ")
            .replace("&dollar;", "$")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }
}
