// Minimal HTML table extraction for FBref pages.
//
// FBref serves regular, non-nested tables, many of them wrapped in HTML
// comments. Only what the adapter needs is parsed: table ids and captions,
// the header rows (including `over_header` groups), and body cells with
// their `data-stat`, `class` and first link.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HtmlError {
    #[error("table `{0}` not found on page")]
    TableNotFound(String),

    #[error("table `{id}` is malformed: {detail}")]
    Malformed { id: String, detail: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlColumn {
    /// Text of the `over_header` cell spanning this column, if any.
    pub group: Option<String>,
    pub label: String,
    pub data_stat: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlCell {
    pub text: String,
    pub data_stat: Option<String>,
    pub class: String,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlTable {
    pub id: String,
    pub caption: Option<String>,
    pub columns: Vec<HtmlColumn>,
    pub rows: Vec<Vec<HtmlCell>>,
}

impl HtmlTable {
    pub fn column_index(&self, data_stat: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.data_stat.as_deref() == Some(data_stat))
    }

    /// Cell of `row` under the column with the given `data-stat`.
    pub fn cell<'a>(&self, row: &'a [HtmlCell], data_stat: &str) -> Option<&'a HtmlCell> {
        row.get(self.column_index(data_stat)?)
    }
}

/// Remove comment markers so commented-out tables become visible.
pub fn uncomment(html: &str) -> String {
    html.replace("<!--", "").replace("-->", "")
}

// ---------------------------------------------------------------------------
// Element scanning
// ---------------------------------------------------------------------------

struct Element<'a> {
    attrs: &'a str,
    inner: &'a str,
    end: usize,
}

/// Offset of the next `<tag` that is a whole tag name (so `<th` does not
/// match `<thead`).
fn find_open(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let pat = format!("<{tag}");
    let mut pos = from;
    loop {
        let at = lower.get(pos..)?.find(&pat)? + pos;
        let next = lower[at + pat.len()..].chars().next();
        if matches!(next, Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/') {
            return Some(at);
        }
        pos = at + pat.len();
    }
}

/// Element starting at `start` (which must point at `<tag`).
fn element_at<'a>(html: &'a str, lower: &str, tag: &str, start: usize) -> Option<Element<'a>> {
    let open_end = lower[start..].find('>')? + start;
    let attrs = &html[start + 1 + tag.len()..open_end];
    let close_pat = format!("</{tag}");
    let close = lower[open_end + 1..].find(&close_pat)? + open_end + 1;
    let end = lower[close..].find('>').map(|i| close + i + 1).unwrap_or(lower.len());
    Some(Element {
        attrs,
        inner: &html[open_end + 1..close],
        end,
    })
}

/// Every `<tag>` element in `html`, in document order.
fn elements<'a>(html: &'a str, tag: &str) -> Vec<Element<'a>> {
    let lower = html.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(start) = find_open(&lower, tag, pos) {
        match element_at(html, &lower, tag, start) {
            Some(el) => {
                pos = el.end;
                out.push(el);
            }
            None => break,
        }
    }
    out
}

fn first_element<'a>(html: &'a str, tag: &str) -> Option<Element<'a>> {
    let lower = html.to_ascii_lowercase();
    let start = find_open(&lower, tag, 0)?;
    element_at(html, &lower, tag, start)
}

/// `th` and `td` cells of one row, in order.
fn cells(row_html: &str) -> Vec<Element<'_>> {
    let lower = row_html.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut pos = 0;
    loop {
        let th = find_open(&lower, "th", pos);
        let td = find_open(&lower, "td", pos);
        let (start, tag) = match (th, td) {
            (Some(a), Some(b)) if a < b => (a, "th"),
            (Some(a), None) => (a, "th"),
            (_, Some(b)) => (b, "td"),
            (None, None) => break,
        };
        match element_at(row_html, &lower, tag, start) {
            Some(el) => {
                pos = el.end;
                out.push(el);
            }
            None => break,
        }
    }
    out
}

/// Value of attribute `name` in a tag's attribute text.
pub fn attr(attrs: &str, name: &str) -> Option<String> {
    let lower = attrs.to_ascii_lowercase();
    let pat = format!("{name}=");
    let mut pos = 0;
    while let Some(rel) = lower[pos..].find(&pat) {
        let at = pos + rel;
        let boundary = at == 0 || lower[..at].ends_with(|c: char| c.is_ascii_whitespace());
        let value_start = at + pat.len();
        if !boundary {
            pos = value_start;
            continue;
        }
        let rest = &attrs[value_start..];
        let value = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let body = &rest[1..];
                &body[..body.find(q).unwrap_or(body.len())]
            }
            _ => {
                let stop = rest
                    .find(|c: char| c.is_ascii_whitespace() || c == '>')
                    .unwrap_or(rest.len());
                &rest[..stop]
            }
        };
        return Some(decode_entities(value));
    }
    None
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Decode named and numeric character references. Unknown references are
/// left as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "ndash" => Some('\u{2013}'),
        "mdash" => Some('\u{2014}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Collapse whitespace runs (including non-breaking spaces) and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell_text(inner: &str) -> String {
    normalize_ws(&decode_entities(&strip_tags(inner)))
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Ids of every table on the page, in document order.
pub fn table_ids(html: &str) -> Vec<String> {
    elements(html, "table")
        .iter()
        .filter_map(|t| attr(t.attrs, "id"))
        .collect()
}

/// Parse the table whose id is exactly `id`.
pub fn find_table(html: &str, id: &str) -> Result<HtmlTable, HtmlError> {
    elements(html, "table")
        .into_iter()
        .find(|t| attr(t.attrs, "id").as_deref() == Some(id))
        .ok_or_else(|| HtmlError::TableNotFound(id.to_string()))
        .and_then(|t| parse_table(id, t.inner))
}

/// Parse every table whose id satisfies `wanted`.
pub fn find_tables<F>(html: &str, wanted: F) -> Result<Vec<HtmlTable>, HtmlError>
where
    F: Fn(&str) -> bool,
{
    elements(html, "table")
        .into_iter()
        .filter_map(|t| attr(t.attrs, "id").filter(|id| wanted(id.as_str())).map(|id| (id, t)))
        .map(|(id, t)| parse_table(&id, t.inner))
        .collect()
}

fn has_class(attrs: &str, class: &str) -> bool {
    attr(attrs, "class").is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

fn parse_table(id: &str, inner: &str) -> Result<HtmlTable, HtmlError> {
    let malformed = |detail: &str| HtmlError::Malformed {
        id: id.to_string(),
        detail: detail.to_string(),
    };

    let caption = first_element(inner, "caption").map(|c| cell_text(c.inner));
    let thead = first_element(inner, "thead").ok_or_else(|| malformed("no <thead>"))?;

    let mut groups: Vec<String> = Vec::new();
    let mut columns: Vec<HtmlColumn> = Vec::new();
    for tr in elements(thead.inner, "tr") {
        if has_class(tr.attrs, "over_header") {
            groups.clear();
            for th in cells(tr.inner) {
                let span = attr(th.attrs, "colspan")
                    .and_then(|s| s.trim().parse::<usize>().ok())
                    .unwrap_or(1)
                    .max(1);
                let text = cell_text(th.inner);
                groups.extend(std::iter::repeat(text).take(span));
            }
        } else {
            columns = cells(tr.inner)
                .iter()
                .map(|th| HtmlColumn {
                    group: None,
                    label: cell_text(th.inner),
                    data_stat: attr(th.attrs, "data-stat"),
                })
                .collect();
        }
    }
    if columns.is_empty() {
        return Err(malformed("no header cells"));
    }
    for (col, group) in columns.iter_mut().zip(&groups) {
        if !group.is_empty() {
            col.group = Some(group.clone());
        }
    }

    let body = first_element(inner, "tbody")
        .map(|b| b.inner)
        .unwrap_or(&inner[thead.end.min(inner.len())..]);

    let mut rows = Vec::new();
    for tr in elements(body, "tr") {
        if has_class(tr.attrs, "thead")
            || has_class(tr.attrs, "spacer")
            || has_class(tr.attrs, "over_header")
        {
            continue;
        }
        let row: Vec<HtmlCell> = cells(tr.inner)
            .iter()
            .map(|c| HtmlCell {
                text: cell_text(c.inner),
                data_stat: attr(c.attrs, "data-stat"),
                class: attr(c.attrs, "class").unwrap_or_default(),
                href: first_element(c.inner, "a").and_then(|a| attr(a.attrs, "href")),
            })
            .collect();
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Ok(HtmlTable {
        id: id.to_string(),
        caption,
        columns,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
