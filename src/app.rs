use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::form::{FormCollector, TerminalCollector};
use crate::print::{PrintDispatcher, PrintOutcome, dispatch};
use crate::qr::{local_url, render_terminal, save_qr_png};
use crate::render::render_document;
use crate::server::{FormService, RemoteFormServer, ServerState};
use chrono::Local;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// What happened to one filled-in form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillReport {
    pub path: PathBuf,
    /// `None` when printing is turned off.
    pub printed: Option<PrintOutcome>,
}

/// The primary interface: fills forms on the terminal, shows QR codes and
/// owns the lifecycle of the browser form server.
pub struct App {
    config: AppConfig,
    catalog: Arc<Catalog>,
    printer: Box<dyn PrintDispatcher>,
    server: RemoteFormServer,
}

impl App {
    pub fn new(config: AppConfig, catalog: Arc<Catalog>, printer: Box<dyn PrintDispatcher>) -> Self {
        let service = FormService::new(
            Arc::clone(&catalog),
            config.letterhead.clone(),
            config.output.dir.clone(),
        );
        Self {
            config,
            catalog,
            printer,
            server: RemoteFormServer::new(service),
        }
    }

    pub fn server_state(&self) -> ServerState {
        self.server.state()
    }

    /// Collects one form, writes the document and sends it to the printer.
    /// Returns `None` if the user ran out of input before picking a type.
    pub fn fill_form<R: BufRead, W: Write>(
        &self,
        term: &mut TerminalCollector<R, W>,
        document_type: Option<&str>,
    ) -> Result<Option<FillReport>> {
        let document = match document_type {
            Some(name) => self
                .catalog
                .get(name)
                .ok_or_else(|| AppError::UnknownDocumentType(name.to_string()))?,
            None => match term.choose_document_type(&self.catalog)? {
                Some(doc) => doc,
                None => return Ok(None),
            },
        };

        let values = term.collect(document)?;
        let rendered = render_document(
            &self.config.letterhead,
            document,
            &values,
            Local::now().naive_local(),
            &self.config.output.dir,
        );
        let path = rendered.write_pdf()?;

        let printed = self
            .config
            .output
            .print
            .then(|| dispatch(self.printer.as_ref(), &path));
        match &printed {
            Some(PrintOutcome::Sent) => term.say(format!(
                "{} generated and sent to the printer: {}",
                document.title,
                path.display()
            ))?,
            Some(PrintOutcome::Failed(reason)) => term.say(format!(
                "Warning: {} was saved to {} but could not be printed: {}",
                document.title,
                path.display(),
                reason
            ))?,
            None => term.say(format!("{} saved to {}", document.title, path.display()))?,
        }
        Ok(Some(FillReport { path, printed }))
    }

    /// Saves the QR image for `url` and draws it on the terminal.
    pub fn show_qr<R: BufRead, W: Write>(
        &self,
        term: &mut TerminalCollector<R, W>,
        url: &str,
    ) -> Result<PathBuf> {
        let path = save_qr_png(url, &self.config.qr.dir, Local::now().naive_local())?;
        term.say("Scan this QR code with your mobile device to access the form:")?;
        term.say(render_terminal(url)?)?;
        term.say(format!("URL: {}", url))?;
        term.say(format!("Saved to {}", path.display()))?;
        Ok(path)
    }

    pub fn public_url(&self) -> &str {
        &self.config.qr.public_url
    }

    /// Address of the running form server, if any.
    pub fn server_url(&self) -> Option<String> {
        match self.server.state() {
            ServerState::Running(addr) => Some(local_url(&self.config.server.host, addr.port())),
            _ => None,
        }
    }

    pub fn start_server(&mut self) -> Result<String> {
        self.server
            .start(&self.config.server.host, self.config.server.port)?;
        self.server_url()
            .ok_or_else(|| AppError::Server("server exited right after starting".to_string()))
    }

    pub fn stop_server(&mut self) -> Result<()> {
        self.server.stop()
    }

    /// Runs the menu until the user quits or input ends. The form server is
    /// stopped on the way out.
    pub fn run_menu<R: BufRead, W: Write>(&mut self, term: &mut TerminalCollector<R, W>) -> Result<()> {
        loop {
            term.say("\nVisa Application System")?;
            term.say("  1. Create document")?;
            term.say("  2. Show QR code (public form)")?;
            match self.server.state() {
                ServerState::Running(_) => term.say("  3. Stop form server")?,
                _ => term.say("  3. Start form server")?,
            }
            term.say("  4. Show QR code (local form server)")?;
            term.say("  5. Quit")?;

            let Some(choice) = term.ask("> ")? else {
                break;
            };
            // Errors from a single action are shown and the menu carries on.
            let outcome = match choice.as_str() {
                "1" => self.fill_form(term, None).map(|_| ()),
                "2" => {
                    let url = self.public_url().to_string();
                    self.show_qr(term, &url).map(|_| ())
                }
                "3" => self.toggle_server(term),
                "4" => match self.server_url() {
                    Some(url) => self.show_qr(term, &url).map(|_| ()),
                    None => term.say("Start the form server first (option 3)."),
                },
                "5" | "q" | "quit" => break,
                other => term.say(format!("Unknown option '{}'", other)),
            };
            if let Err(e) = outcome {
                term.say(format!("Error: {}", e))?;
            }
        }
        self.stop_server()
    }

    fn toggle_server<R: BufRead, W: Write>(&mut self, term: &mut TerminalCollector<R, W>) -> Result<()> {
        if let ServerState::Running(_) = self.server.state() {
            self.stop_server()?;
            return term.say("Form server stopped.");
        }
        let url = self.start_server()?;
        term.say(format!("Form server running at {}", url))
    }
}
