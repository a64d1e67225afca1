use anyhow::Result;
use clap::{Arg, Command};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vidqa_client::ingest::{sleep_until_deadline, IngestOutcome};
use vidqa_client::query::QueryOutcome;
use vidqa_client::terminal::{
    parse_line, render_entry, validate_video_url, InputCommand, SnapshotRenderer, TerminalPlayer,
    HELP,
};
use vidqa_client::{
    create_backend, ClientError, Config, MediaHandle, SessionState, VideoCatalog,
};

/// Backend results delivered back to the input loop
enum Completed {
    Answer(QueryOutcome),
    Ingest(IngestOutcome),
    Catalog(vidqa_client::Result<usize>),
}

struct Frontend {
    session: SessionState,
    catalog: Arc<VideoCatalog>,
    player: Arc<TerminalPlayer>,
    player_handle: MediaHandle,
    completed: mpsc::UnboundedSender<Completed>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("vidqa")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ask questions about a video and jump to the answering segment")
        .arg(
            Arg::new("backend-url")
                .short('b')
                .long("backend-url")
                .value_name("URL")
                .help("Base URL of the question-answering backend"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = matches.get_one::<String>("backend-url") {
        config.backend.base_url = url.clone();
    }

    let level = if matches.get_flag("verbose") {
        "debug".to_string()
    } else {
        config.logging.log_level.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("vidqa_client={},warn", level))),
        )
        .init();

    config.validate()?;
    info!("{}", config.summary());

    let backend = create_backend(&config.backend)?;
    let catalog = Arc::new(VideoCatalog::new(Arc::clone(&backend)));
    let startup = Arc::clone(&catalog);
    tokio::spawn(async move {
        if let Err(e) = startup.refresh().await {
            warn!("Could not load the video list: {}", e);
        }
    });

    let session = SessionState::new(backend, &config.ingest)
        .with_video_added_listener(catalog.clone());

    let mut updates = session.subscribe();
    tokio::spawn(async move {
        let mut renderer = SnapshotRenderer::new();
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            for line in renderer.render(&snapshot) {
                println!("{}", line);
            }
        }
    });

    let (completed, mut completed_rx) = mpsc::unbounded_channel();
    let player = Arc::new(TerminalPlayer::new());
    let player_handle: MediaHandle = player.clone();
    let mut frontend = Frontend {
        session,
        catalog,
        player,
        player_handle,
        completed,
    };

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let deadline = frontend.session.dismissal_deadline();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = parse_line(&line) else { continue };
                if !frontend.handle(command).await {
                    break;
                }
            }
            Some(done) = completed_rx.recv() => match done {
                Completed::Answer(outcome) => frontend.session.apply_answer(outcome),
                Completed::Ingest(outcome) => {
                    frontend.session.settle_ingest(outcome);
                }
                Completed::Catalog(refreshed) => frontend.print_videos(refreshed).await,
            },
            _ = sleep_until_deadline(deadline) => {
                frontend.session.fire_due_dismissal(Instant::now());
            }
        }
    }

    info!("Goodbye");
    Ok(())
}

impl Frontend {
    /// Handle one command; returns false when the user asked to quit
    async fn handle(&mut self, command: InputCommand) -> bool {
        match command {
            InputCommand::Ask(question) => self.ask(&question),
            InputCommand::Videos => self.list_videos(),
            InputCommand::Select(key) => self.select(&key).await,
            InputCommand::Add(url) => self.add(&url),
            InputCommand::Play { turn, segment } => self.play(turn, segment),
            InputCommand::Log => {
                for (i, entry) in self.session.log().iter().enumerate() {
                    println!("{}", render_entry(i + 1, entry));
                }
            }
            InputCommand::Help => println!("{}", HELP),
            InputCommand::Invalid(message) => println!("{}", message),
            InputCommand::Quit => return false,
        }
        true
    }

    fn ask(&mut self, question: &str) {
        let Some(pending) = self.session.submit_query(question) else {
            if self.session.active_video().is_none() {
                println!("Select a video first with :select");
            }
            return;
        };

        let completed = self.completed.clone();
        tokio::spawn(async move {
            let _ = completed.send(Completed::Answer(pending.resolve().await));
        });
    }

    fn list_videos(&self) {
        let catalog = Arc::clone(&self.catalog);
        let completed = self.completed.clone();
        tokio::spawn(async move {
            let _ = completed.send(Completed::Catalog(catalog.refresh().await));
        });
    }

    async fn print_videos(&self, refreshed: vidqa_client::Result<usize>) {
        if let Err(e) = refreshed {
            println!("Could not load the video list: {}", e);
            return;
        }

        let listings = self.catalog.listings().await;
        if listings.is_empty() {
            println!("No videos yet. Add one with :add <url>");
        }
        for (i, listing) in listings.iter().enumerate() {
            match &listing.description {
                Some(description) if !description.is_empty() => {
                    println!("{:>3}. {} ({})", i + 1, listing.title, description)
                }
                _ => println!("{:>3}. {}", i + 1, listing.title),
            }
        }
    }

    async fn select(&mut self, key: &str) {
        match self.catalog.find(key).await {
            Some(video) => {
                self.player.load(&video);
                self.session.select_video(video);
                self.session.set_media_ref(Some(&self.player_handle));
                if let Some(video) = self.session.active_video() {
                    println!("Now asking about \"{}\"", video.title);
                }
            }
            None => println!("No video matches \"{}\"; try :videos", key),
        }
    }

    fn add(&mut self, input: &str) {
        let url = match validate_video_url(input) {
            Ok(url) => url,
            Err(message) => {
                println!("{}", message);
                return;
            }
        };

        self.session.open_ingest();
        self.session.edit_ingest_url(url.as_str());

        match self.session.submit_ingest() {
            Ok(pending) => {
                let completed = self.completed.clone();
                tokio::spawn(async move {
                    let _ = completed.send(Completed::Ingest(pending.resolve().await));
                });
            }
            Err(ClientError::IngestInFlight) => println!("A video is already being processed"),
            Err(e) => println!("{}", e),
        }
    }

    fn play(&self, turn: usize, segment: usize) {
        let Some(entry) = self.session.log().get(turn - 1) else {
            println!("There is no turn {}", turn);
            return;
        };
        let Some(view) = entry.message.segments().get(segment - 1) else {
            println!("Turn {} has no segment {}", turn, segment);
            return;
        };
        if !self.session.play_segment(view) {
            println!("No video is loaded");
        }
    }
}
