use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hark::voice::{
    self, AudioHost, AudioPlayback, FrameSource, InputDevice, SPOTTER_FRAME_LENGTH,
    SPOTTER_SAMPLE_RATE, Speaker, SpeechSynthesizer, SpeechToText, TextToSpeech,
};
use hark::{Assistant, AssistantSettings, ChatClient, Config, Session, ShutdownSignal, lifecycle};

/// Hark - wake-word voice assistant
#[derive(Parser)]
#[command(name = "hark", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,hark=info",
        1 => "info,hark=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // A missing .env is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration),
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let config = Config::load()?;
    config.validate()?;
    tracing::debug!(?config, "loaded configuration");

    let shutdown = ShutdownSignal::new();
    lifecycle::listen_for_ctrl_c(shutdown.clone());

    let stt = SpeechToText::from_config(&config.stt)?;
    let chat = ChatClient::from_config(&config.chat)?;
    let speaker = SpeechSynthesizer::new(TextToSpeech::from_config(&config.tts)?);

    let session = Session::open(
        || voice::build_engine(&config.wake, Box::new(stt.clone())),
        || {
            let host: Box<dyn InputDevice> = Box::new(AudioHost::new(shutdown.clone())?);
            Ok(host)
        },
    )?;

    tracing::info!(
        model = chat.model(),
        engine = ?config.wake.engine,
        "starting hark"
    );

    let mut assistant = Assistant::new(
        session,
        Box::new(stt),
        Box::new(chat),
        Box::new(speaker),
        AssistantSettings::from_config(&config),
        shutdown,
    );

    assistant.run().await?;
    Ok(())
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Reading the default microphone for {duration} seconds; say something.\n");

    let shutdown = ShutdownSignal::new();
    lifecycle::listen_for_ctrl_c(shutdown.clone());

    let mut host = AudioHost::new(shutdown)?;
    let mut stream = host.open_stream(SPOTTER_SAMPLE_RATE, SPOTTER_FRAME_LENGTH)?;

    println!("Sample rate: {SPOTTER_SAMPLE_RATE} Hz");
    println!("---");

    let heard = voice::monitor_input(stream.as_mut(), duration, |second, buffer| {
        let level = voice::rms(&buffer.samples);
        let peak = buffer
            .samples
            .iter()
            .map(|s| f32::from(s.unsigned_abs()) / 32768.0)
            .fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bar = (level * 100.0).min(50.0) as usize;

        println!(
            "{:>3}s  rms {level:.4}  peak {peak:.4}  |{:<50}|",
            second + 1,
            "#".repeat(bar)
        );
    });

    stream.close();
    host.terminate();

    let heard = heard?;
    if heard < duration {
        println!("\nStopped after {heard} of {duration} seconds.");
    }

    println!("\nA level that stays near 0 means no signal reached the wake word engine.");
    println!("List capture devices with `arecord -l` and check input levels in pavucontrol.");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Playing a 440 Hz tone for 2 seconds on the default output.\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000;
    let samples = voice::sine_tone(440.0, sample_rate, Duration::from_secs(2));

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    playback.play(&samples, sample_rate)?;

    println!("\nNo tone means replies will be silent too; check `pactl info` for the default sink.");

    Ok(())
}

/// Test TTS output through the synthesizer
#[allow(clippy::future_not_send)]
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Speaking: \"{text}\"\n");

    let config = Config::load()?;
    let tts = TextToSpeech::from_config(&config.tts)?;

    println!("Synthesizing speech ({:?})...", config.tts.provider);
    let mut synth = SpeechSynthesizer::new(tts);
    synth.speak(text).await;

    println!("\nSilence here means synthesis or playback failed; the log above has the reason.");

    Ok(())
}
