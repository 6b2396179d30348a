use super::types::{Detail, DetailBody, Row};

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Window title with the unread HTTP counter prefixed when non-zero.
pub fn title_with_unread(base: &str, unread: usize) -> String {
    if unread > 0 {
        format!("({}) {}", unread, base)
    } else {
        base.to_string()
    }
}

/// `<tr>` markup for the table body, one per row, in the order given.
pub fn render_rows_html(rows: &[Row]) -> String {
    rows.iter().map(render_row_html).collect()
}

fn render_row_html(row: &Row) -> String {
    let detail = row.detail.as_ref().map(render_detail).unwrap_or_default();
    format!(
        "<tr>\
         <td><div class=\"card small\">{}</div></td>\
         <td><div class=\"card mono\">{}</div></td>\
         <td><div class=\"card mono\">{}</div></td>\
         <td><div class=\"card\"><span class=\"badge {}\">{}</span></div></td>\
         <td><div class=\"card\">{}</div></td>\
         </tr>",
        escape_html(&row.time),
        escape_html(&row.source),
        escape_html(&row.host_or_query),
        row.badge_class,
        escape_html(&row.protocol),
        detail
    )
}

fn render_detail(detail: &Detail) -> String {
    let body = match &detail.body {
        DetailBody::Text(text) => format!("<pre class=\"mono\">{}</pre>", escape_html(text)),
        DetailBody::Fields(fields) => {
            let pairs: String = fields
                .iter()
                .map(|(label, value)| {
                    format!("<b>{}</b><div>{}</div>", escape_html(label), escape_html(value))
                })
                .collect();
            format!("<div class=\"kv mono\">{}</div>", pairs)
        }
    };
    format!(
        "<details><summary>{}</summary>{}</details>",
        escape_html(&detail.summary),
        body
    )
}
