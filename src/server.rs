use crate::catalog::Catalog;
use crate::config::Letterhead;
use crate::error::{AppError, Result};
use crate::form::SubmissionValues;
use crate::render::render_document;
use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const CATALOG_PLACEHOLDER: &str = "/*CATALOG_JSON*/null";
pub const DOCUMENT_TYPE_FIELD: &str = "documentType";

/// Everything a request handler needs. Cheap to clone; the catalog is shared.
#[derive(Debug, Clone)]
pub struct FormService {
    pub catalog: Arc<Catalog>,
    pub letterhead: Letterhead,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl SubmitResponse {
    fn success(filename: String) -> Self {
        Self {
            status: "success".to_string(),
            message: "Document generated successfully".to_string(),
            filename: Some(filename),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            filename: None,
        }
    }
}

impl FormService {
    pub fn new(catalog: Arc<Catalog>, letterhead: Letterhead, output_dir: PathBuf) -> Self {
        Self {
            catalog,
            letterhead,
            output_dir,
        }
    }

    /// The browser form with the catalog embedded as a JSON literal.
    pub fn index_page(&self) -> String {
        // keep "</script>" inside values from closing the script element
        let json = self.catalog.to_json().replace("</", "<\\/");
        INDEX_TEMPLATE.replace(CATALOG_PLACEHOLDER, &json)
    }

    /// Renders and writes the document for one submission. Nothing is printed.
    /// `documentType` stays in the values so a catalog field of that name keeps it.
    pub fn submit(&self, fields: HashMap<String, String>) -> (StatusCode, SubmitResponse) {
        let document_type = fields.get(DOCUMENT_TYPE_FIELD).cloned().unwrap_or_default();
        let Some(document) = self.catalog.get(&document_type) else {
            warn!("Rejected submission for unknown document type '{}'", document_type);
            return (
                StatusCode::BAD_REQUEST,
                SubmitResponse::error("Invalid document type"),
            );
        };

        let values: SubmissionValues = fields.into_iter().collect();
        let rendered = render_document(
            &self.letterhead,
            document,
            &values,
            Local::now().naive_local(),
            &self.output_dir,
        );
        match rendered.write_pdf() {
            Ok(path) => (
                StatusCode::OK,
                SubmitResponse::success(path.display().to_string()),
            ),
            Err(e) => {
                error!("Failed to generate '{}': {}", document_type, e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    SubmitResponse::error(format!("Failed to generate document: {}", e)),
                )
            }
        }
    }
}

pub fn router(service: FormService) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/submit", post(submit))
        .fallback(not_found)
        .with_state(service)
}

async fn index(State(service): State<FormService>) -> Html<String> {
    Html(service.index_page())
}

async fn submit(State(service): State<FormService>, request: Request) -> Response {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let fields = if is_json {
        Json::<HashMap<String, String>>::from_request(request, &())
            .await
            .map(|Json(fields)| fields)
            .map_err(|e| e.body_text())
    } else {
        Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map(|Form(fields)| fields)
            .map_err(|e| e.body_text())
    };

    let (status, body) = match fields {
        Ok(fields) => service.submit(fields),
        Err(reason) => {
            warn!("Malformed submission: {}", reason);
            (
                StatusCode::BAD_REQUEST,
                SubmitResponse::error(format!("Malformed submission: {}", reason)),
            )
        }
    };
    (status, Json(body)).into_response()
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not found")
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    service: FormService,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Form server listening on http://{}", addr);
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Running(SocketAddr),
    Stopped,
}

struct RunningServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<std::io::Result<()>>,
}

/// Start/stop handle for the form server, owned by the interactive menu.
/// Requests are handled on one background thread, one at a time.
pub struct RemoteFormServer {
    service: FormService,
    running: Option<RunningServer>,
    has_run: bool,
}

impl RemoteFormServer {
    pub fn new(service: FormService) -> Self {
        Self {
            service,
            running: None,
            has_run: false,
        }
    }

    pub fn state(&self) -> ServerState {
        match &self.running {
            Some(running) if !running.thread.is_finished() => ServerState::Running(running.addr),
            Some(_) => ServerState::Stopped,
            None if self.has_run => ServerState::Stopped,
            None => ServerState::Idle,
        }
    }

    /// Binds before returning so an occupied port is reported to the caller.
    pub fn start(&mut self, host: &str, port: u16) -> Result<SocketAddr> {
        if let ServerState::Running(addr) = self.state() {
            return Err(AppError::Server(format!("already running on {}", addr)));
        }
        // reap a server thread that died on its own
        if let Err(e) = self.stop() {
            warn!("Previous form server exited with an error: {}", e);
        }

        let listener = std::net::TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let service = self.service.clone();
        let thread = std::thread::Builder::new()
            .name("form-server".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener)?;
                    serve_until(listener, service, async move {
                        let _ = shutdown_rx.await;
                    })
                    .await
                })
            })?;

        self.running = Some(RunningServer {
            addr,
            shutdown,
            thread,
        });
        self.has_run = true;
        Ok(addr)
    }

    /// No-op unless running.
    pub fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let _ = running.shutdown.send(());
        let result = running
            .thread
            .join()
            .map_err(|_| AppError::Server("server thread panicked".to_string()))?;
        info!("Form server on {} stopped", running.addr);
        result.map_err(AppError::from)
    }
}

impl Drop for RemoteFormServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Error while stopping form server: {}", e);
        }
    }
}
