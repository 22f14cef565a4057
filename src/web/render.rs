//! HTML pages. Every piece of job data goes through `escape` before it
//! reaches the output.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::job::{Job, JobPage};
use crate::web::flash::{FlashLevel, FlashMessage};

const QUERY_PREVIEW_CHARS: usize = 120;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn timestamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn query_preview(query: Option<&str>) -> String {
    let query = query.unwrap_or_default();
    let mut preview: String = query.chars().take(QUERY_PREVIEW_CHARS).collect();
    if query.chars().count() > QUERY_PREVIEW_CHARS {
        preview.push('…');
    }
    escape(&preview)
}

/// Link to the next page of completed jobs, with the token url-encoded.
pub fn next_page_href(token: &str) -> Option<String> {
    if token.is_empty() {
        return None;
    }
    let url = reqwest::Url::parse_with_params("http://baqman.invalid/completed", &[("token", token)]).ok()?;
    Some(format!("/completed?{}", url.query().unwrap_or_default()))
}

fn layout(title: &str, flashes: &[FlashMessage], content: &str) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>BaqMan - {title}</title>
<link rel="stylesheet" href="/assets/style.css">
</head>
<body>
<nav><a href="/">Running</a> | <a href="/completed">Completed</a></nav>
<h1>{title}</h1>
"#,
        title = escape(title)
    );
    for flash in flashes {
        let class = match flash.level {
            FlashLevel::Info => "flash",
            FlashLevel::Error => "flash flash-error",
        };
        let _ = writeln!(html, r#"<div class="{}">{}</div>"#, class, escape(&flash.text));
    }
    html.push_str(content);
    html.push_str("\n</body>\n</html>\n");
    html
}

fn describe_link(job: &Job) -> String {
    format!(
        r#"<a href="/describe/{id}">{id}</a>"#,
        id = escape(&job.id)
    )
}

fn skipped_notice(page: &JobPage) -> String {
    match page.skipped {
        0 => String::new(),
        n => format!(
            "<p class=\"flash flash-error\">{} job record(s) on this page could not be read and are not shown.</p>\n",
            n
        ),
    }
}

pub fn index(flashes: &[FlashMessage], page: &JobPage) -> String {
    let mut content = skipped_notice(page);
    if page.running.is_empty() {
        content.push_str("<p>No running jobs.</p>");
        return layout("Running jobs", flashes, &content);
    }
    content.push_str(
        r#"<form method="post" action="/killmany">
<table>
<tr><th></th><th>Job</th><th>User</th><th>Started</th><th>Running for</th><th>Data</th><th>Cost</th><th>Query</th><th></th></tr>
"#,
    );
    for job in &page.running {
        let _ = writeln!(
            content,
            r#"<tr><td><input type="checkbox" name="jobkill" value="{id}"></td><td>{link}</td><td>{user}</td><td>{start}</td><td>{run_time}</td><td>{data}</td><td>{cost}</td><td><code>{query}</code></td><td><a href="/kill/{id}">kill</a></td></tr>"#,
            id = escape(&job.id),
            link = describe_link(job),
            user = escape(&job.user_name),
            start = timestamp(job.start_time),
            run_time = job.human_run_time(),
            data = escape(&job.human_data_queried),
            cost = escape(&job.query_cost),
            query = query_preview(job.query.as_deref()),
        );
    }
    content.push_str("</table>\n<button type=\"submit\">Kill selected</button>\n</form>");
    layout("Running jobs", flashes, &content)
}

pub fn completed(page: &JobPage) -> String {
    let mut content = skipped_notice(page);
    if page.done.is_empty() {
        content.push_str("<p>No completed jobs on this page.</p>");
    } else {
        content.push_str(
            "<table>\n<tr><th>Job</th><th>User</th><th>Status</th><th>Started</th><th>Ended</th><th>Run time</th><th>Data</th><th>Cost</th><th>Query</th></tr>\n",
        );
        for job in &page.done {
            let _ = writeln!(
                content,
                "<tr><td>{link}</td><td>{user}</td><td>{status}</td><td>{start}</td><td>{end}</td><td>{run_time}</td><td>{data}</td><td>{cost}</td><td><code>{query}</code></td></tr>",
                link = describe_link(job),
                user = escape(&job.user_name),
                status = job.status,
                start = timestamp(job.start_time),
                end = timestamp(job.end_time),
                run_time = job.human_run_time(),
                data = escape(&job.human_data_queried),
                cost = escape(&job.query_cost),
                query = query_preview(job.query.as_deref()),
            );
        }
        content.push_str("</table>");
    }
    if let Some(href) = next_page_href(&page.next_page_token) {
        let _ = write!(content, "\n<p><a href=\"{}\">Next page</a></p>", escape(&href));
    }
    layout("Completed jobs", &[], &content)
}

pub fn describe(flashes: &[FlashMessage], job: &Job) -> String {
    let mut content = String::from("<dl>\n");
    let mut row = |name: &str, value: String| {
        let _ = writeln!(content, "<dt>{}</dt><dd>{}</dd>", name, value);
    };
    row("Job", escape(&job.id));
    row("User", escape(&job.user_name));
    row("Status", job.status.to_string());
    row("Type", escape(job.job_type.as_deref().unwrap_or("-")));
    row("Started", timestamp(job.start_time));
    row("Ended", timestamp(job.end_time));
    row("Run time", job.human_run_time());
    row("Data processed", escape(&job.human_data_queried));
    row("Estimated cost", escape(&job.query_cost));
    if let Some(error) = &job.error_message {
        row("Error", escape(error));
    }
    content.push_str("</dl>\n");
    if let Some(query) = &job.query {
        let _ = writeln!(content, "<pre><code>{}</code></pre>", escape(query));
    }
    if job.is_running() {
        let _ = write!(
            content,
            r#"<p><a class="kill" href="/kill/{}">Kill this job</a></p>"#,
            escape(&job.id)
        );
    }
    layout(&format!("Job {}", job.id), flashes, &content)
}

pub fn error_page(status: u16, message: &str) -> String {
    let content = format!("<p class=\"error\">{}</p>", escape(message));
    layout(&format!("Error {}", status), &[], &content)
}
