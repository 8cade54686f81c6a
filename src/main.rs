use anyhow::{Context, Result};
use clap::Parser;
use interview_capture::audio::{CaptureConstraints, DeviceFactory, DeviceSource};
use interview_capture::session::{
    driver, EventSink, InterviewSession, NoticeLevel, QuestionList, SessionConfig, SessionEvent,
    SessionHandle, WindowEvent,
};
use interview_capture::{create_router, AppConfig, AppState, HttpInterviewApi};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interview-capture")]
#[command(about = "Run a live interview with segmented recording and transcription")]
struct Args {
    /// Config file (stem; extension optional)
    #[arg(short, long, default_value = "config/interview")]
    config: String,

    /// Session ID issued by the interview service
    #[arg(short, long)]
    session_id: Option<String>,

    /// Bearer token (overrides config)
    #[arg(short, long)]
    token: Option<String>,

    /// JSON file with the interview questions
    #[arg(short, long)]
    questions: PathBuf,

    /// "microphone" or the path of an audio file to replay
    #[arg(long, default_value = "microphone")]
    source: DeviceSource,

    /// Serve the local control API instead of reading commands from stdin
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = AppConfig::load(&args.config)?;
    if let Some(token) = args.token {
        cfg.api.token = token;
    }

    let session_id = args
        .session_id
        .unwrap_or_else(|| format!("interview-{}", uuid::Uuid::new_v4()));

    info!("Interview Capture v{}", env!("CARGO_PKG_VERSION"));
    info!("Session: {}", session_id);
    info!("API: {}", cfg.api.base_url);

    let questions = QuestionList::from_json_file(&args.questions)?;
    info!("Loaded {} questions", questions.len());

    let device = DeviceFactory::create(args.source, CaptureConstraints::from(&cfg.audio))
        .context("Failed to create capture device")?;
    let api = Arc::new(HttpInterviewApi::new(&cfg.api).context("Failed to build API client")?);

    let (events, mut event_rx) = EventSink::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let session = InterviewSession::new(
        SessionConfig::from_settings(session_id, &cfg.session),
        questions.as_slice().to_vec(),
        device,
        api,
        events,
        Box::new(move |responses| {
            let _ = done_tx.send(responses);
        }),
    );

    let (handle, task) = driver::spawn(session);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_event(&event);
        }
    });

    if args.serve {
        let addr = format!("{}:{}", cfg.control.bind, cfg.control.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind control API on {}", addr))?;
        info!("Control API listening on {}", addr);

        let router = create_router(AppState::new(handle.clone()));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Control API stopped: {}", e);
            }
        });
    } else {
        info!("Commands: start | next | toggle | status | type <text> | blur | focus | leave | exit-fullscreen");
        tokio::spawn(read_commands(handle.clone()));
    }

    let responses = tokio::select! {
        responses = done_rx => responses.ok(),
        _ = tokio::signal::ctrl_c() => None,
    };

    match responses {
        Some(responses) => {
            let _ = task.await;
            println!("{}", serde_json::to_string_pretty(&responses)?);
        }
        None => {
            warn!("Interview interrupted");
            task.abort();
        }
    }

    Ok(())
}

async fn read_commands(handle: SessionHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        let result = match command {
            "" => continue,
            "start" => handle.enable_safe_mode().await,
            "next" => handle.advance().await,
            "toggle" => handle.toggle_recording().await,
            "type" => handle.edit_response(rest).await,
            "blur" => handle.window_event(WindowEvent::Blur).await,
            "focus" => handle.window_event(WindowEvent::Focus).await,
            "leave" => handle.window_event(WindowEvent::PointerLeave).await,
            "exit-fullscreen" => handle.window_event(WindowEvent::FullscreenExit).await,
            "status" => match handle.status().await {
                Ok(status) => {
                    match serde_json::to_string_pretty(&status) {
                        Ok(json) => println!("{}", json),
                        Err(e) => error!("Failed to render status: {}", e),
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            },
            other => {
                warn!("Unknown command: {}", other);
                continue;
            }
        };

        if result.is_err() {
            break;
        }
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::Notice(notice) => match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        },
        SessionEvent::QuestionStarted { index, prompt, .. } => {
            info!("Question {}: {}", index + 1, prompt)
        }
        SessionEvent::Transcribed { fragment, .. } => info!("> {}", fragment),
        SessionEvent::Tick { remaining_secs } if remaining_secs % 60 == 0 => {
            info!("{} minutes left", remaining_secs / 60)
        }
        SessionEvent::Tick { .. } => {}
        SessionEvent::TimeUp => warn!("Time is up"),
        other => info!("{:?}", other),
    }
}
