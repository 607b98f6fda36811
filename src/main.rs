use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncRead;
use tracing::{error, info, warn};

use watson_stt::{
    ClientConfig, ReaderSource, RecognitionEvent, RecognizeOptions, SpeechRecognitionResults,
    SpeechToText,
};

/// Watson STT - stream audio to IBM Watson Speech to Text
#[derive(Parser, Debug)]
#[command(name = "watson-stt")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transcribe an audio file, or stdin when AUDIO is "-"
    Transcribe(TranscribeArgs),
}

#[derive(Args, Debug)]
struct TranscribeArgs {
    /// Audio file to transcribe, "-" for stdin
    #[arg(value_name = "AUDIO")]
    audio: String,

    /// Audio MIME type; guessed from the file extension when omitted
    #[arg(long)]
    content_type: Option<String>,

    /// Recognition model, e.g. en-US_Multimedia
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    language_customization_id: Option<String>,

    #[arg(long)]
    acoustic_customization_id: Option<String>,

    #[arg(long)]
    base_model_version: Option<String>,

    /// Print interim hypotheses to stderr
    #[arg(long)]
    interim_results: bool,

    /// Request per-word timestamps
    #[arg(long)]
    timestamps: bool,

    /// Request speaker labels
    #[arg(long)]
    speaker_labels: bool,

    #[arg(long)]
    smart_formatting: bool,

    /// Service-side silence limit in seconds (-1 disables it)
    #[arg(long, allow_negative_numbers = true)]
    inactivity_timeout: Option<i64>,

    /// Comma-separated keywords to spot
    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// Confidence threshold for keyword spotting (0.0 - 1.0)
    #[arg(long)]
    keywords_threshold: Option<f32>,

    /// Print the recognize URL and start message without connecting
    #[arg(long)]
    dry_run: bool,
}

impl TranscribeArgs {
    fn recognize_options(&self) -> RecognizeOptions {
        let content_type = self
            .content_type
            .clone()
            .or_else(|| content_type_for_path(Path::new(&self.audio)).map(str::to_string));

        RecognizeOptions {
            content_type,
            model: self.model.clone(),
            language_customization_id: self.language_customization_id.clone(),
            acoustic_customization_id: self.acoustic_customization_id.clone(),
            base_model_version: self.base_model_version.clone(),
            interim_results: self.interim_results.then_some(true),
            timestamps: self.timestamps.then_some(true),
            speaker_labels: self.speaker_labels.then_some(true),
            smart_formatting: self.smart_formatting.then_some(true),
            inactivity_timeout: self.inactivity_timeout,
            keywords: (!self.keywords.is_empty()).then(|| self.keywords.clone()),
            keywords_threshold: self.keywords_threshold,
            ..Default::default()
        }
    }
}

fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "wav" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "mp3" => Some("audio/mp3"),
        "ogg" | "opus" => Some("audio/ogg"),
        "webm" => Some("audio/webm"),
        "mulaw" | "ulaw" => Some("audio/mulaw;rate=8000"),
        "alaw" => Some("audio/alaw;rate=8000"),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Must happen before the first TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command {
        Commands::Transcribe(args) => transcribe(SpeechToText::new(config), args).await,
    }
}

async fn transcribe(client: SpeechToText, args: TranscribeArgs) -> anyhow::Result<()> {
    let options = args.recognize_options();
    if options.content_type.is_none() {
        warn!("No content type given; the service will try to detect it");
    }

    if args.dry_run {
        println!("{}", client.recognize_url(&options)?);
        println!("{}", options.start_message().to_json()?);
        return Ok(());
    }

    let chunk_size = client.config().audio_chunk_size;
    if args.audio == "-" {
        let source = ReaderSource::new(tokio::io::stdin()).with_chunk_size(chunk_size);
        run_session(&client, options, source).await
    } else {
        let source = ReaderSource::open(&args.audio)
            .await
            .with_context(|| format!("Failed to open audio file {}", args.audio))?
            .with_chunk_size(chunk_size);
        run_session(&client, options, source).await
    }
}

async fn run_session<R>(
    client: &SpeechToText,
    options: RecognizeOptions,
    source: ReaderSource<R>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    // Ctrl-C ends the audio; the service still returns the final results.
    let closer = source.closer();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing recognition");
            closer.close();
        }
    });

    let (handle, mut events) = client.recognize_with_events(options, source)?;
    info!(session_id = %handle.id(), "Recognition started");

    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            RecognitionEvent::Transcription(results) => print_results(&results),
            RecognitionEvent::Listening => info!("Service is listening"),
            RecognitionEvent::TranscriptionComplete => info!("Transcription complete"),
            RecognitionEvent::Error(e) | RecognitionEvent::InactivityTimeout(e) => {
                error!("{e}");
                failure = Some(e);
            }
            RecognitionEvent::Connected | RecognitionEvent::Disconnected => {}
        }
    }

    let state = handle.wait().await;
    if let Some(e) = failure {
        bail!("Recognition failed: {e}");
    }
    info!(%state, "Recognition finished");
    Ok(())
}

fn print_results(results: &SpeechRecognitionResults) {
    for result in results.results() {
        let Some(best) = result.alternatives.first() else {
            continue;
        };
        if result.is_final {
            println!("{}", best.transcript.trim());
        } else {
            eprintln!("... {}", best.transcript.trim());
        }
    }

    if let Some(labels) = &results.speaker_labels {
        for label in labels.iter().filter(|l| l.is_final) {
            eprintln!(
                "speaker {} {:.2}s - {:.2}s",
                label.speaker, label.from, label.to
            );
        }
    }
}
