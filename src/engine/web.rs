//! HTML views over a [`Report`].
//!
//! Every link is relative (`./top`, `./flamegraph`) so the UI keeps working
//! wherever the host mounts it.

use std::sync::Arc;

use askama::Template;
use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, MethodRouter},
};
use bytes::Bytes;
use serde::Deserialize;

use super::report::{Peek, Report};

const OVERVIEW_ROWS: usize = 20;

pub(super) struct Ui {
    pub title: String,
    pub report: Report,
    pub nodecount: usize,
    pub flame_svg: String,
    pub raw: Bytes,
}

#[derive(Debug, Deserialize)]
pub(super) struct PeekQuery {
    #[serde(default)]
    f: String,
}

/// Handler set for one loaded profile, in registration order.
pub(super) fn handlers(ui: Arc<Ui>) -> Vec<(String, MethodRouter)> {
    let mut handlers: Vec<(String, MethodRouter)> = Vec::new();

    let u = ui.clone();
    handlers.push((
        "/".into(),
        get(move || {
            let ui = u.clone();
            async move { ui.overview() }
        }),
    ));

    let u = ui.clone();
    handlers.push((
        "/top".into(),
        get(move || {
            let ui = u.clone();
            async move { ui.top() }
        }),
    ));

    let u = ui.clone();
    handlers.push((
        "/flamegraph".into(),
        get(move || {
            let ui = u.clone();
            async move { ui.flamegraph_page() }
        }),
    ));

    let u = ui.clone();
    handlers.push((
        "/flamegraph.svg".into(),
        get(move || {
            let ui = u.clone();
            async move {
                (
                    [(header::CONTENT_TYPE, "image/svg+xml")],
                    ui.flame_svg.clone(),
                )
            }
        }),
    ));

    let u = ui.clone();
    handlers.push((
        "/peek".into(),
        get(move |Query(q): Query<PeekQuery>| {
            let ui = u.clone();
            async move { ui.peek(&q.f) }
        }),
    ));

    let u = ui;
    handlers.push((
        "/download".into(),
        get(move || {
            let ui = u.clone();
            async move {
                (
                    [
                        (header::CONTENT_TYPE, "application/octet-stream"),
                        (header::CONTENT_DISPOSITION, "attachment; filename=\"profile.pb.gz\""),
                    ],
                    ui.raw.clone(),
                )
            }
        }),
    ));

    handlers
}

impl Ui {
    fn overview(&self) -> Response {
        let r = &self.report;
        render_html(&OverviewPage {
            title: &self.title,
            view: "Overview",
            sample_types: r.sample_types.join(", "),
            sample_type: &r.sample_type,
            duration: format!("{:.2}s", r.duration_nanos as f64 / 1e9),
            total: r.total,
            functions: r.function_count(),
            rows: self.rows(OVERVIEW_ROWS),
            more: r.function_count() > OVERVIEW_ROWS,
        })
    }

    fn top(&self) -> Response {
        render_html(&TopPage {
            title: &self.title,
            view: "Top",
            rows: self.rows(self.nodecount),
            dropped: self.report.function_count().saturating_sub(self.nodecount),
            nodecount: self.nodecount,
        })
    }

    fn flamegraph_page(&self) -> Response {
        render_html(&FlamegraphPage {
            title: &self.title,
            view: "Flame Graph",
        })
    }

    fn peek(&self, pattern: &str) -> Response {
        let peeks = if pattern.is_empty() {
            Vec::new()
        } else {
            match self.report.peek(pattern) {
                Ok(p) => p.into_iter().map(PeekView::from).collect(),
                Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            }
        };
        render_html(&PeekPage {
            title: &self.title,
            view: "Peek",
            pattern,
            peeks,
        })
    }

    fn rows(&self, limit: usize) -> Vec<TableRow> {
        let total = self.report.total;
        self.report
            .top(limit)
            .iter()
            .map(|f| TableRow {
                flat: f.flat,
                flat_pct: percent(f.flat, total),
                cum: f.cum,
                cum_pct: percent(f.cum, total),
                peek_href: format!("./peek?f={}", quote_meta(&f.name)),
                name: f.name.clone(),
            })
            .collect()
    }
}

struct TableRow {
    flat: i64,
    flat_pct: String,
    cum: i64,
    cum_pct: String,
    name: String,
    peek_href: String,
}

struct Edge {
    name: String,
    value: i64,
}

struct PeekView {
    name: String,
    cum: i64,
    callers: Vec<Edge>,
    callees: Vec<Edge>,
}

impl From<Peek> for PeekView {
    fn from(p: Peek) -> Self {
        let edges = |m: std::collections::BTreeMap<String, i64>| {
            m.into_iter()
                .map(|(name, value)| Edge { name, value })
                .collect()
        };
        PeekView {
            name: p.name,
            cum: p.cum,
            callers: edges(p.callers),
            callees: edges(p.callees),
        }
    }
}

#[derive(Template)]
#[template(path = "overview.html")]
struct OverviewPage<'a> {
    title: &'a str,
    view: &'a str,
    sample_types: String,
    sample_type: &'a str,
    duration: String,
    total: i64,
    functions: usize,
    rows: Vec<TableRow>,
    more: bool,
}

#[derive(Template)]
#[template(path = "top.html")]
struct TopPage<'a> {
    title: &'a str,
    view: &'a str,
    rows: Vec<TableRow>,
    dropped: usize,
    nodecount: usize,
}

#[derive(Template)]
#[template(path = "flamegraph.html")]
struct FlamegraphPage<'a> {
    title: &'a str,
    view: &'a str,
}

#[derive(Template)]
#[template(path = "peek.html")]
struct PeekPage<'a> {
    title: &'a str,
    view: &'a str,
    pattern: &'a str,
    peeks: Vec<PeekView>,
}

fn render_html<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("template render failed: {}", e),
        )
            .into_response(),
    }
}

fn percent(v: i64, total: i64) -> String {
    if total == 0 {
        return "0.00%".into();
    }
    format!("{:.2}%", v as f64 * 100.0 / total as f64)
}

/// Anchored regexp matching `name` literally, encoded for a query value.
fn quote_meta(name: &str) -> String {
    urlencoding::encode(&format!("^{}$", regex::escape(name))).into_owned()
}
