//! CLI binary for edgequake-pdfchat.
//!
//! A thin shim over the library crate that maps CLI flags to `ClientConfig`,
//! drives the upload → chat flow and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdfchat::render;
use edgequake_pdfchat::{
    ApiClient, ChatRoute, ChatSession, ChatState, ClientConfig, DocumentId, DocumentSession,
    Message, SessionObserver, SharedObserver, StagedFile, SubmitRejection, UploadController,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: shows a spinner while the upload or a question is in
/// flight and prints one summary line when it settles.
struct CliObserver {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
        })
    }

    fn start(&self, prefix: &str, message: String) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        let bar = ProgressBar::new_spinner();
        bar.set_style(style);
        bar.set_prefix(prefix.to_string());
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));

        let previous = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(bar);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    fn stop(&self) {
        let bar = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
    }
}

impl SessionObserver for CliObserver {
    fn on_upload_start(&self, file_name: &str, size: usize) {
        self.start(
            "Uploading",
            format!("{file_name} {}", dim(&format!("({size} bytes)"))),
        );
    }

    fn on_upload_complete(&self, doc_id: &DocumentId, chunk_count: usize) {
        self.stop();
        eprintln!(
            "{} Uploaded as document {}  {}",
            green("✔"),
            bold(&doc_id.to_string()),
            dim(&format!("{chunk_count} chunks")),
        );
    }

    fn on_upload_error(&self, reason: &str) {
        self.stop();
        eprintln!("{} {}", red("✘"), red(reason));
    }

    fn on_question_sent(&self, _doc_id: &DocumentId, _question: &str) {
        self.start("Asking", render::send_label(ChatState::Sending).to_string());
    }

    fn on_answer(&self, _doc_id: &DocumentId, _citation_count: usize) {
        self.stop();
    }

    fn on_question_error(&self, _doc_id: &DocumentId, _message: &str) {
        self.stop();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Upload a PDF and chat interactively
  pdfchat notes.pdf

  # Upload with a document name and ask one question
  pdfchat --name "Lecture 3" notes.pdf --ask "What is the deadline?"

  # Upload straight from a URL
  pdfchat https://arxiv.org/pdf/1706.03762 --ask "Summarise the abstract"

  # Attach to an already-uploaded document
  pdfchat --doc-id 42 --ask "Who is the author?"

  # List the chunk previews of a document
  pdfchat --doc-id 42 --chunks-only

  # Machine-readable transcript
  pdfchat --doc-id 42 --ask "What is the deadline?" --json > transcript.json

  # Check the backend is up
  pdfchat --health

INTERACTIVE COMMANDS:
  /preview   Show the document preview pane
  /quit      Leave (also /exit or Ctrl-D)

ENVIRONMENT VARIABLES:
  PDFCHAT_BACKEND_URL     Backend root (default http://localhost:5000)
  PDFCHAT_DOC_ID          Attach to this document instead of uploading
  RUST_LOG                Override the log filter (e.g. edgequake_pdfchat=debug)
"#;

/// Upload a PDF and chat with it.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Upload a PDF and chat with it",
    long_about = "Upload a PDF (local file or URL) to a retrieval-augmented question-answer \
service, then ask questions about it and get answers with citations to the source chunks.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    #[arg(required_unless_present_any = ["doc_id", "health"])]
    input: Option<String>,

    /// Attach to an existing document instead of uploading.
    #[arg(long, env = "PDFCHAT_DOC_ID", conflicts_with = "input")]
    doc_id: Option<String>,

    /// Optional document name sent with the upload.
    #[arg(short, long, env = "PDFCHAT_NAME")]
    name: Option<String>,

    /// Ask this question and exit. Repeat for several questions.
    #[arg(short, long)]
    ask: Vec<String>,

    /// Print the document's chunk previews and exit.
    #[arg(long)]
    chunks_only: bool,

    /// Check the backend and exit.
    #[arg(long)]
    health: bool,

    /// Output JSON instead of text.
    #[arg(long, env = "PDFCHAT_JSON")]
    json: bool,

    /// Skip the embed probe and show chunk previews.
    #[arg(long)]
    no_embed: bool,

    /// Backend root URL.
    #[arg(long, env = "PDFCHAT_BACKEND_URL", default_value = edgequake_pdfchat::config::DEFAULT_BASE_URL)]
    backend: String,

    /// Timeout for chunk listing and questions, in seconds.
    #[arg(long, env = "PDFCHAT_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Timeout for the upload (includes server-side ingestion), in seconds.
    #[arg(long, env = "PDFCHAT_UPLOAD_TIMEOUT", default_value_t = 300)]
    upload_timeout: u64,

    /// HTTP download timeout for URL input, in seconds.
    #[arg(long, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable spinners.
    #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and answers.
    #[arg(short, long, env = "PDFCHAT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise while a spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer: Option<SharedObserver> = if show_progress {
        Some(CliObserver::new() as Arc<dyn SessionObserver>)
    } else {
        None
    };
    let config = build_config(&cli, observer)?;
    let api = ApiClient::new(&config).context("Failed to create API client")?;

    // ── Health-only mode ─────────────────────────────────────────────────
    if cli.health {
        let status = api.health().await.context("Backend health check failed")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            println!(
                "{} {}  {}",
                if status.is_ok() { green("✔") } else { red("✘") },
                status.status,
                dim(status.message.as_deref().unwrap_or_default()),
            );
        }
        if !status.is_ok() {
            anyhow::bail!("Backend reported status '{}'", status.status);
        }
        return Ok(());
    }

    let docs = DocumentSession::new(api.clone(), &config);

    // ── Upload (or attach) ───────────────────────────────────────────────
    let route = match cli.doc_id {
        Some(ref raw) => ChatRoute {
            doc_id: Some(raw.trim())
                .filter(|id| !id.is_empty())
                .map(DocumentId::from_param),
        },
        None => {
            let input = cli.input.as_deref().unwrap_or_default();
            let file = StagedFile::resolve(input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to stage '{input}'"))?;

            let mut upload = UploadController::new(api.clone(), &config).with_prefetch(docs.clone());
            upload.select_file(file);
            if let Some(ref name) = cli.name {
                upload.set_name(name);
            }

            let hand_off = upload.continue_to_chat().await;
            if !cli.quiet && !show_progress {
                if let Some(status) = render::upload_status(upload.state()) {
                    eprintln!("{status}");
                }
            }
            let hand_off = hand_off.context("Upload failed")?;
            if !cli.quiet && !cli.json {
                eprintln!("{}", dim(&format!("→ {}", hand_off.route())));
            }
            hand_off.route()
        }
    };

    let Some(doc_id) = route.doc_id.clone() else {
        anyhow::bail!(render::MISSING_DOCUMENT_NOTICE);
    };
    let chunks = docs.load(&doc_id).await;

    // ── Chunks-only mode ─────────────────────────────────────────────────
    if cli.chunks_only {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&*chunks)?);
        } else if chunks.is_empty() {
            println!("{}", render::NO_CHUNKS);
        } else {
            for c in chunks.iter() {
                println!("{} {}  {}", cyan(&format!("#{}", c.chunk_id)), dim(&format!("p.{}", c.page)), c.preview);
            }
        }
        return Ok(());
    }

    // ── Chat ─────────────────────────────────────────────────────────────
    let mut chat = ChatSession::open(&route, &docs, &config);
    if cli.no_embed {
        chat.report_embed_failure();
    } else {
        chat.check_embed(&docs).await;
    }

    if !cli.quiet && !cli.json {
        eprintln!("{}\n", dim(&render::preview_pane(&chat.preview(&docs))));
        print_message(&chat.transcript()[0]);
    }

    if !cli.ask.is_empty() {
        for question in &cli.ask {
            ask_and_print(&mut chat, &api, question, &cli).await;
        }
    } else {
        interactive(&mut chat, &api, &docs, &cli).await?;
    }

    if cli.json {
        let out = serde_json::json!({
            "doc_id": doc_id,
            "route": route.to_path(),
            "chunk_count": chunks.len(),
            "transcript": chat.transcript(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Ok(())
}

/// Read questions from stdin until EOF or `/quit`.
async fn interactive(chat: &mut ChatSession, api: &ApiClient, docs: &DocumentSession, cli: &Cli) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if !cli.quiet {
            eprint!("{} ", cyan(">"));
            io::stderr().flush().ok();
        }
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/preview" => {
                eprintln!("{}", render::preview_pane(&chat.preview(docs)));
                continue;
            }
            "" => continue,
            question => ask_and_print(chat, api, question, cli).await,
        }
    }
    Ok(())
}

async fn ask_and_print(chat: &mut ChatSession, api: &ApiClient, question: &str, cli: &Cli) {
    match chat.ask(api, question).await {
        Ok(reply) => {
            if !cli.json {
                print_message(reply);
            }
        }
        Err(SubmitRejection::EmptyQuestion) => {}
        Err(e) => eprintln!("{} {}", red("✘"), e),
    }
}

fn print_message(m: &Message) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}\n", render::message(m)).ok();
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, observer: Option<SharedObserver>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(cli.backend.clone())
        .request_timeout_secs(cli.request_timeout)
        .upload_timeout_secs(cli.upload_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
