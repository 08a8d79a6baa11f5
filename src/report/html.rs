// Static HTML view of a report. Everything user-supplied goes through `escape`.

use crate::error::Result;
use crate::model::RowSnapshot;
use crate::report::{Report, TableReport};
use crate::reconcile::TableDetails;

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;margin:0.5em 0}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}\
th{background:#f3f3f3}\
.bar{background:#eee;width:300px;height:14px;display:inline-block}\
.fill{background:#3a3;height:14px}\
.ok{color:#272}.bad{color:#b22}.note{color:#666;font-style:italic}\
.null{color:#999}";

pub fn render(report: &Report) -> Result<String> {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    out.push_str(&format!(
        "<title>Reconciliation {}</title><style>{}</style></head><body>\n",
        escape(&report.meta.report_id),
        STYLE
    ));

    let meta = &report.meta;
    out.push_str(&format!(
        "<h1>{} &rarr; {}</h1>\n<p>Generated {} &middot; {} tables compared</p>\n",
        escape(&meta.source_schema),
        escape(&meta.destination_schema),
        escape(&meta.timestamp.to_rfc3339()),
        meta.table_count
    ));
    if meta.cancelled {
        out.push_str("<p class=\"bad\">Run cancelled before all tables were compared.</p>\n");
    }

    let s = &report.summary;
    out.push_str("<h2>Summary</h2>\n");
    out.push_str(&percent_bar(s.match_percentage));
    out.push_str(&format!(
        " {:.1}% <span class=\"{}\">{}</span>\n",
        s.match_percentage,
        if s.all_matched { "ok" } else { "bad" },
        if s.all_matched { "all rows matched" } else { "differences found" }
    ));
    out.push_str("<table>\n");
    for (label, value) in [
        ("Tables", s.total_tables),
        ("Rows in source", s.total_rows_source),
        ("Rows in destination", s.total_rows_destination),
        ("Matching", s.total_matching_rows),
        ("Different", s.total_different_rows),
        ("Missing in destination", s.total_missing_rows),
        ("Extra in destination", s.total_extra_rows),
        ("Tables with errors", s.tables_with_errors),
    ] {
        out.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", label, value));
    }
    out.push_str("</table>\n");

    let only = &report.schema_only_tables;
    if !only.source_only.is_empty() || !only.destination_only.is_empty() {
        out.push_str("<h2>Tables on one side only</h2>\n");
        name_list(&mut out, &format!("Only in {}", meta.source_schema), only.source_only.iter());
        name_list(
            &mut out,
            &format!("Only in {}", meta.destination_schema),
            only.destination_only.iter(),
        );
    }

    out.push_str("<h2>Tables</h2>\n");
    for table in report.tables.values() {
        render_table(&mut out, table)?;
    }
    out.push_str("</body></html>\n");
    Ok(out)
}

fn render_table(out: &mut String, table: &TableReport) -> Result<()> {
    let s = &table.summary;
    out.push_str(&format!(
        "<h3 id=\"t-{0}\">{0}</h3>\n",
        escape(&table.table)
    ));
    if let Some(key) = &table.key {
        out.push_str(&format!("<p>Key: <code>{}</code></p>\n", escape(&key.label())));
    }
    if let Some(err) = &table.error {
        out.push_str(&format!("<p class=\"bad\">Error: {}</p>\n", escape(err)));
    }
    if let Some(note) = &table.note {
        out.push_str(&format!("<p class=\"note\">{}</p>\n", escape(note)));
    }
    out.push_str(&percent_bar(s.match_percentage));
    out.push_str(&format!(
        " {:.1}%\n<table><tr><th>Source</th><th>Destination</th><th>Matching</th>\
<th>Different</th><th>Missing</th><th>Extra</th></tr>\n\
<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr></table>\n",
        s.match_percentage,
        s.rows_in_source,
        s.rows_in_destination,
        s.matching,
        s.different,
        s.missing,
        s.extra
    ));

    if !s.has_differences {
        return Ok(());
    }
    let details = table.load_details()?;
    render_details(out, &details);
    Ok(())
}

fn render_details(out: &mut String, details: &TableDetails) {
    if !details.different.is_empty() {
        out.push_str(&format!(
            "<h4>Different rows ({} shown)</h4>\n",
            details.different.len()
        ));
        for row in &details.different {
            out.push_str(&format!(
                "<p>Key <code>{}</code></p>\n<table><tr><th>Field</th><th>Source</th>\
<th>Destination</th></tr>\n",
                escape(&row.key)
            ));
            for (field, diff) in &row.differences {
                out.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                    escape(field),
                    cell(diff.source.as_deref()),
                    cell(diff.destination.as_deref())
                ));
            }
            out.push_str("</table>\n");
        }
    }
    snapshot_table(out, "Missing in destination", &details.missing);
    snapshot_table(out, "Extra in destination", &details.extra);
}

fn snapshot_table(out: &mut String, title: &str, rows: &[RowSnapshot]) {
    let Some(first) = rows.first() else {
        return;
    };
    out.push_str(&format!("<h4>{} ({} shown)</h4>\n<table><tr>", title, rows.len()));
    let columns: Vec<&str> = first.columns().collect();
    for c in &columns {
        out.push_str(&format!("<th>{}</th>", escape(c)));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for c in &columns {
            out.push_str(&format!("<td>{}</td>", cell(row.get(c).flatten())));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}

fn name_list<'a>(out: &mut String, title: &str, names: impl Iterator<Item = &'a String>) {
    let names: Vec<&String> = names.collect();
    if names.is_empty() {
        return;
    }
    out.push_str(&format!("<h4>{}</h4>\n<ul>", escape(title)));
    for n in names {
        out.push_str(&format!("<li>{}</li>", escape(n)));
    }
    out.push_str("</ul>\n");
}

fn percent_bar(pct: f64) -> String {
    format!(
        "<span class=\"bar\"><span class=\"fill\" style=\"width:{:.1}%;display:block\"></span></span>",
        pct.clamp(0.0, 100.0)
    )
}

fn cell(value: Option<&str>) -> String {
    match value {
        Some(v) => escape(v),
        None => "<span class=\"null\">NULL</span>".to_string(),
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
