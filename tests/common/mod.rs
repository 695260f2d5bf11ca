#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use flate2::{write::GzEncoder, Compression};
use pprofweb::api::{router, AppState};
use pprofweb::config::ServerConfig;
use pprofweb::engine::profile::{Function, Line, Location, Profile, Sample, ValueType};
use pprofweb::engine::{Engine, PprofEngine};
use prost::Message;

pub const BOUNDARY: &str = "pprofweb-test-boundary";

/// A router backed by the built-in engine, writing uploads into a temp dir.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    pub fn profile_path(&self) -> std::path::PathBuf {
        self.state.config.profile_path.clone()
    }
}

pub fn create_test_app() -> TestApp {
    create_test_app_with_limit(pprofweb::config::MAX_UPLOAD_BYTES)
}

pub fn create_test_app_with_limit(max_upload_bytes: usize) -> TestApp {
    create_test_app_with(Arc::new(PprofEngine), max_upload_bytes)
}

/// Same as [`create_test_app`] but rendering with `engine`.
pub fn create_test_app_with_engine(engine: Arc<dyn Engine>) -> TestApp {
    create_test_app_with(engine, pprofweb::config::MAX_UPLOAD_BYTES)
}

fn create_test_app_with(engine: Arc<dyn Engine>, max_upload_bytes: usize) -> TestApp {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = ServerConfig {
        profile_path: dir.path().join("pprofweb-temp"),
        max_upload_bytes,
    };
    let state = AppState::new(engine, config);
    TestApp {
        router: router(state.clone()),
        state,
        dir,
    }
}

/// Build a CPU-style profile. Each stack is listed root first.
pub fn profile_with_stacks(stacks: &[(&[&str], i64)]) -> Profile {
    let mut strings = vec![
        String::new(),
        "samples".to_string(),
        "count".to_string(),
        "cpu".to_string(),
        "nanoseconds".to_string(),
    ];
    let mut function = Vec::new();
    let mut location = Vec::new();
    let mut ids = std::collections::HashMap::new();

    let mut sample = Vec::new();
    for (stack, count) in stacks {
        let mut location_id = Vec::new();
        // Samples list locations leaf first.
        for name in stack.iter().rev() {
            let id = *ids.entry(name.to_string()).or_insert_with(|| {
                let id = function.len() as u64 + 1;
                strings.push(name.to_string());
                function.push(Function {
                    id,
                    name: strings.len() as i64 - 1,
                    ..Default::default()
                });
                location.push(Location {
                    id,
                    line: vec![Line {
                        function_id: id,
                        line: 1,
                        ..Default::default()
                    }],
                    ..Default::default()
                });
                id
            });
            location_id.push(id);
        }
        sample.push(Sample {
            location_id,
            value: vec![*count, count * 10_000_000],
            ..Default::default()
        });
    }

    Profile {
        sample_type: vec![
            ValueType { ty: 1, unit: 2 },
            ValueType { ty: 3, unit: 4 },
        ],
        sample,
        location,
        function,
        string_table: strings,
        period_type: Some(ValueType { ty: 3, unit: 4 }),
        period: 10_000_000,
        ..Default::default()
    }
}

/// Serialized profile in the gzip-wrapped form profilers write.
pub fn encode_gzipped(profile: &Profile) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&profile.encode_to_vec()).expect("gzip write");
    enc.finish().expect("gzip finish")
}

pub fn profile_a() -> Vec<u8> {
    encode_gzipped(&profile_with_stacks(&[
        (&["main", "alpha_work", "alpha_leaf"], 7),
        (&["main", "alpha_idle"], 2),
    ]))
}

pub fn profile_b() -> Vec<u8> {
    encode_gzipped(&profile_with_stacks(&[(&["main", "bravo_work"], 5)]))
}

/// A multipart/form-data body with a single field.
pub fn multipart_body(field: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"profile.pb.gz\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(field: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, data)))
        .expect("valid request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}
