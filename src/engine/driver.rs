use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use inferno::flamegraph;

use super::profile;
use super::report::{compile, Report, ReportOptions};
use super::web::{self, Ui};
use super::{EngineError, EngineOptions, Flag, FlagSet, HttpServerArgs};

const USAGE: &str = "usage: pprof -http=[host]:[port] [options] <profile>";

/// pprof-compatible renderer for `perftools.profiles.Profile` files.
///
/// Only the interactive web mode is supported: the `http` option must be set,
/// and instead of serving, the engine hands its handler set to the
/// `http_server` callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct PprofEngine;

struct EngineFlags {
    http: Flag<String>,
    no_browser: Flag<bool>,
    sample_index: Flag<String>,
    nodecount: Flag<i64>,
    divide_by: Flag<f64>,
    hide: Flag<Vec<String>>,
}

impl EngineFlags {
    fn register(fs: &mut dyn FlagSet) -> Self {
        let nodecount = Flag::new(0);
        fs.int_var(&nodecount, "nodecount", 80, "Max number of functions to show");
        let flags = Self {
            http: fs.string("http", "", "Present interactive web UI at the specified http host:port"),
            no_browser: fs.bool("no_browser", false, "Skip opening a browser for the interactive web UI"),
            sample_index: fs.string("sample_index", "", "Sample value to report (name or 0-based index)"),
            nodecount,
            divide_by: fs.float("divide_by", 1.0, "Ratio to divide all samples before visualization"),
            hide: fs.string_list("hide", &[], "Skip frames matching this regexp (repeatable)"),
        };
        fs.add_extra_usage(USAGE);
        flags
    }
}

impl super::Engine for PprofEngine {
    fn run(&self, options: EngineOptions<'_>) -> Result<(), EngineError> {
        let EngineOptions {
            flagset,
            http_server,
        } = options;

        let flags = EngineFlags::register(flagset);
        let mut usage_requested = false;
        let sources = flagset.parse(&mut || usage_requested = true)?;
        if usage_requested || sources.len() != 1 {
            return Err(EngineError::Usage(flagset.extra_usage()));
        }
        let hostport = flags.http.get();
        if hostport.is_empty() {
            return Err(EngineError::Usage(format!(
                "only the web interface is supported\n{}",
                flagset.extra_usage()
            )));
        }

        let nodecount = usize::try_from(flags.nodecount.get()).map_err(|_| {
            EngineError::Usage(format!(
                "nodecount must not be negative, got {}",
                flags.nodecount.get()
            ))
        })?;

        let source = &sources[0];
        let raw = std::fs::read(source).map_err(|e| EngineError::Read {
            path: source.clone(),
            source: e,
        })?;
        let prof = profile::decode(&raw)?;

        let hide = flags
            .hide
            .get()
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;
        let opts = ReportOptions {
            sample_index: prof.sample_index(&flags.sample_index.get())?,
            divide_by: flags.divide_by.get(),
            hide,
        };
        let report = Report::build(&prof, &opts)?;
        tracing::info!(
            source = %source,
            sample_type = %report.sample_type,
            total = report.total,
            functions = report.function_count(),
            "profile loaded"
        );

        let title = Path::new(source)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.clone());
        let flame_svg = render_flamegraph(&report, &title)?;

        let (host, port) = resolve_listener(&hostport)?;
        let url = format!("http://{}:{}", host, port);
        if flags.no_browser.get() {
            tracing::debug!(%url, "serving web UI");
        } else {
            tracing::info!(%url, "serving web UI; open it in a browser");
        }

        let ui = Arc::new(Ui {
            title,
            report,
            nodecount,
            flame_svg,
            raw: Bytes::from(raw),
        });

        http_server(HttpServerArgs {
            hostport,
            host,
            port,
            handlers: web::handlers(ui),
        })
    }
}

/// Resolve `host:port`. Port 0 is replaced by a free port found by binding a
/// listener and closing it straight away; nothing is ever served on it.
fn resolve_listener(hostport: &str) -> Result<(String, u16), EngineError> {
    let listen_err = |source| EngineError::Listen {
        addr: hostport.to_string(),
        source,
    };
    let (host, port) = hostport.rsplit_once(':').ok_or_else(|| {
        listen_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "missing port",
        ))
    })?;
    let host = if host.is_empty() { "localhost" } else { host };
    let port: u16 = port.parse().map_err(|_| {
        listen_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "invalid port",
        ))
    })?;
    if port != 0 {
        return Ok((host.to_string(), port));
    }
    let bind_host = host.trim_start_matches('[').trim_end_matches(']');
    let listener = TcpListener::bind((bind_host, 0)).map_err(listen_err)?;
    let port = listener.local_addr().map_err(listen_err)?.port();
    drop(listener);
    Ok((host.to_string(), port))
}

fn render_flamegraph(report: &Report, title: &str) -> Result<String, EngineError> {
    let lines = report.folded();
    if lines.is_empty() {
        return Ok(format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"600\" height=\"40\">\
             <text x=\"10\" y=\"25\">{}: no samples</text></svg>",
            html_escape::encode_text(title)
        ));
    }
    let mut opts = flamegraph::Options::default();
    opts.title = format!("{} ({})", title, report.sample_type);
    opts.count_name = report.sample_type.clone();
    let mut svg = Vec::new();
    flamegraph::from_lines(&mut opts, lines.iter().map(String::as_str), &mut svg)
        .map_err(EngineError::FlameGraph)?;
    Ok(String::from_utf8_lossy(&svg).into_owned())
}
