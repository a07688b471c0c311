use std::{
    fmt::Write as _,
    path::{Component, Path},
    sync::Arc,
};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use crate::{
    analyze::analyze_dir,
    config::AppConfig,
    core::{cache::EngineCache, separate::separate},
    error::{Result, StudioError},
    types::{ModelKind, StemSummary},
};

/// Shared per-process state: directory roots plus the engine cache.
pub struct AppState {
    pub cfg: AppConfig,
    pub engines: EngineCache,
}

impl AppState {
    pub fn new(cfg: AppConfig) -> Self {
        let engines = EngineCache::with_manifest_override(cfg.manifest_url_override.clone());
        Self { cfg, engines }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index).post(upload))
        .route("/download/*path", get(download))
        .route("/static/*path", get(static_file))
        .layer(DefaultBodyLimit::max(200 * 1024 * 1024))
        .with_state(state)
}

pub async fn run_server(state: Arc<AppState>) -> Result<()> {
    state.cfg.ensure_dirs()?;

    let addr = state.cfg.listen_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(StudioError::from)?;
    tracing::info!(%addr, "stem-studio listening");

    axum::serve(listener, router(state))
        .await
        .map_err(StudioError::from)?;
    Ok(())
}

// ---------------------------------------------------------------
// GET /
// ---------------------------------------------------------------

async fn index() -> Html<String> {
    Html(render_page(ModelKind::TwoStems, None, None, None, &[]))
}

// ---------------------------------------------------------------
// POST /
// ---------------------------------------------------------------

async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Html<String> {
    let mut model = ModelKind::TwoStems;

    match process_upload(&state, multipart, &mut model).await {
        Ok((original, stems)) => Html(render_page(
            model,
            None,
            Some("Separation finished. Stems are listed below."),
            Some(&original),
            &stems,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "upload request failed");
            Html(render_page(model, Some(&user_message(&e)), None, None, &[]))
        }
    }
}

/// Everything that can fail on POST, so the handler renders one way.
async fn process_upload(
    state: &Arc<AppState>,
    mut multipart: Multipart,
    model: &mut ModelKind,
) -> Result<(String, Vec<StemSummary>)> {
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StudioError::Validation(format!("malformed upload: {e}")))?
    {
        match field.name().map(str::to_string).as_deref() {
            Some("model") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| StudioError::Validation(format!("malformed upload: {e}")))?;
                *model = text.parse()?;
            }
            Some("file") => {
                let name = field.file_name().map(str::to_string).unwrap_or_default();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| StudioError::Validation(format!("malformed upload: {e}")))?;
                file = Some((name, bytes));
            }
            _ => {}
        }
    }

    // Validate before anything touches the filesystem.
    let (raw_name, bytes) = file.ok_or_else(missing_file)?;
    let file_name = Path::new(&raw_name)
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .ok_or_else(missing_file)?;

    let upload_path = state.cfg.upload_dir().join(&file_name);
    tokio::fs::write(&upload_path, &bytes).await?;
    tracing::info!(file = %file_name, model = %model, "upload saved");

    let task_state = Arc::clone(state);
    let kind = *model;
    let summaries = tokio::task::spawn_blocking(move || -> Result<Vec<StemSummary>> {
        let out_dir = separate(&upload_path, kind, &task_state.engines, &task_state.cfg)?;
        analyze_dir(&out_dir, &task_state.cfg)
    })
    .await
    .map_err(|e| StudioError::Engine(format!("separation task failed: {e}")))??;

    Ok((file_name, summaries))
}

fn missing_file() -> StudioError {
    StudioError::Validation("Please select a file.".into())
}

fn user_message(e: &StudioError) -> String {
    match e {
        StudioError::Validation(msg) => msg.clone(),
        other => format!("Separation error: {other}"),
    }
}

// ---------------------------------------------------------------
// GET /download/<rel>  and  GET /static/<rel>
// ---------------------------------------------------------------

async fn download(State(state): State<Arc<AppState>>, UrlPath(rel): UrlPath<String>) -> Response {
    serve_under(&state.cfg.output_dir(), &rel, audio_content_type).await
}

async fn static_file(
    State(state): State<Arc<AppState>>,
    UrlPath(rel): UrlPath<String>,
) -> Response {
    serve_under(&state.cfg.static_dir(), &rel, image_content_type).await
}

/// Serve a file strictly under `root`; any non-normal path component
/// (traversal, absolute prefix) is treated as not found.
async fn serve_under(
    root: &Path,
    rel: &str,
    content_type: fn(&Path) -> &'static str,
) -> Response {
    let rel_path = Path::new(rel);
    if !rel_path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return not_found();
    }

    let full = root.join(rel_path);
    if !full.is_file() {
        return not_found();
    }

    match tokio::fs::read(&full).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&full))], bytes).into_response(),
        Err(_) => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn audio_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

fn image_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------
// Page rendering
// ---------------------------------------------------------------

fn render_page(
    model: ModelKind,
    error: Option<&str>,
    success: Option<&str>,
    original: Option<&str>,
    stems: &[StemSummary],
) -> String {
    let mut page = String::with_capacity(4096);

    page.push_str(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>stem-studio</title>\n<style>\n\
         body { font-family: sans-serif; max-width: 56rem; margin: 2rem auto; }\n\
         .error { color: #b00020; }\n.success { color: #1b5e20; }\n\
         table { border-collapse: collapse; width: 100%; }\n\
         td, th { border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }\n\
         </style>\n</head>\n<body>\n<h1>stem-studio</h1>\n",
    );

    page.push_str("<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n");
    page.push_str("<input type=\"file\" name=\"file\">\n<select name=\"model\">\n");
    for kind in ModelKind::ALL {
        let selected = if kind == model { " selected" } else { "" };
        let _ = writeln!(page, "<option value=\"{kind}\"{selected}>{kind}</option>");
    }
    page.push_str("</select>\n<button type=\"submit\">Separate</button>\n</form>\n");

    if let Some(msg) = error {
        let _ = writeln!(page, "<p class=\"error\">{}</p>", escape_html(msg));
    }
    if let Some(msg) = success {
        let _ = writeln!(page, "<p class=\"success\">{}</p>", escape_html(msg));
    }

    if let (Some(original), false) = (original, stems.is_empty()) {
        let input_stem = Path::new(original)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");

        let _ = writeln!(page, "<h2>Stems for {}</h2>", escape_html(original));
        page.push_str(
            "<table>\n<tr><th>Stem</th><th>Duration (s)</th><th>RMS</th>\
             <th>Peak</th><th>Links</th></tr>\n",
        );
        for stem in stems {
            let base = Path::new(&stem.name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("stem");
            let _ = writeln!(
                page,
                "<tr><td>{name}</td><td>{dur}</td><td>{rms}</td><td>{peak}</td>\
                 <td><a href=\"/download/{input}/{model}/{name_raw}\">download</a> \
                 <a href=\"/static/waveforms/{base}_wave.png\">waveform</a> \
                 <a href=\"/static/spectrograms/{base}_spec.png\">spectrogram</a></td></tr>",
                name = escape_html(&stem.name),
                dur = stem.duration,
                rms = stem.rms,
                peak = stem.peak,
                input = input_stem,
                model = model,
                name_raw = stem.name,
            );
        }
        page.push_str("</table>\n");
    }

    page.push_str("</body>\n</html>\n");
    page
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(escape_html("<b>&\"x\"</b>"), "&lt;b&gt;&amp;&quot;x&quot;&lt;/b&gt;");
    }

    #[test]
    fn form_preselects_the_requested_model() {
        let page = render_page(ModelKind::FourStems, None, None, None, &[]);
        assert!(page.contains("<option value=\"4stems\" selected>"));
        assert!(page.contains("<option value=\"2stems\">"));
    }
}
