mod loopback;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use log::{debug, info, warn};
use serde::Deserialize;
use std::f32::consts::TAU;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pulse::config::{EngineConfig, WorkoutConfig};
use pulse::exercise::ExerciseType;
use pulse::geometry::{Joint, LandmarkSet, Point};
use pulse::logging::{init_logger, parse_level};
use pulse::session::{
    Session, SessionError, SessionEvent, SessionResult, SessionState, Workout, WorkoutSnapshot,
};

use crossterm::event::{self, KeyCode};
use loopback::Loopback;
use ratatui::{
    DefaultTerminal,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

#[derive(Parser, Debug)]
#[command(version, about = "Pulse - exercise session engine CLI", long_about = None)]
struct Args {
    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExerciseArg {
    Squat,
    Pushup,
    JumpingJack,
    Untracked,
}

impl From<ExerciseArg> for ExerciseType {
    fn from(arg: ExerciseArg) -> Self {
        match arg {
            ExerciseArg::Squat => ExerciseType::Squat,
            ExerciseArg::Pushup => ExerciseType::Pushup,
            ExerciseArg::JumpingJack => ExerciseType::JumpingJack,
            ExerciseArg::Untracked => ExerciseType::Untracked,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded landmark log through a workout
    Replay {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long, value_enum)]
        exercise: ExerciseArg,
        #[arg(short, long, default_value_t = 0)]
        target_reps: u32,
        #[arg(short, long)]
        duration: u32,
    },
    /// Run a live session against a synthetic pose, with a HUD
    Live {
        #[arg(short, long, value_enum)]
        exercise: ExerciseArg,
        #[arg(short, long, default_value_t = 10)]
        target_reps: u32,
        #[arg(short, long, default_value_t = 60)]
        duration: u32,
        /// Attach a loopback voice coach
        #[arg(long)]
        coach: bool,
    },
}

/// One line of a recorded frame log: seconds since recording start, and the
/// detected joints.
#[derive(Debug, Deserialize)]
struct RecordedFrame {
    t: f64,
    landmarks: LandmarkSet,
}

fn load_frames(path: &Path) -> Result<Vec<RecordedFrame>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read frame log {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid frame log {}", path.display()))
}

/// Runs `frames` through a workout, firing one tick per whole second of log
/// time. The clock keeps running after the last frame until the workout ends.
fn replay(
    config: WorkoutConfig,
    engine: &EngineConfig,
    frames: &[RecordedFrame],
) -> Result<SessionResult> {
    let mut workout = Workout::new(config, engine)?;
    workout.start()?;

    let origin = frames.first().map(|f| f.t).unwrap_or(0.0);
    let mut ticks = 0u64;
    for frame in frames {
        let due = ((frame.t - origin).max(0.0)).floor() as u64;
        while ticks < due && !workout.state().is_finished() {
            workout.tick();
            ticks += 1;
        }
        if let Some(reps) = workout.on_landmark_frame(&frame.landmarks).rep_counted {
            println!(
                "[{:>6.2}s] rep {}: {}",
                frame.t - origin,
                reps,
                workout.exercise().last_feedback()
            );
        }
    }
    while !workout.state().is_finished() {
        workout.tick();
    }

    workout
        .result()
        .ok_or_else(|| anyhow!("workout ended without a result"))
}

/// Joint angle for a synthetic rep cycle: extended at phase 0, flexed at 0.5.
fn cycle_angle(phase: f32) -> f32 {
    122.5 + 47.5 * (TAU * phase).cos()
}

/// Three joints bending at `vertex` by `degrees`, the first joint straight above.
fn bend(joints: [Joint; 3], vertex: Point, degrees: f32) -> LandmarkSet {
    let theta = degrees.to_radians();
    LandmarkSet::new()
        .with(joints[0], Point::new(vertex.x, vertex.y - 0.2))
        .with(joints[1], vertex)
        .with(
            joints[2],
            Point::new(vertex.x + 0.2 * theta.sin(), vertex.y - 0.2 * theta.cos()),
        )
}

fn synthetic_pose(exercise: ExerciseType, phase: f32) -> LandmarkSet {
    match exercise {
        ExerciseType::Squat | ExerciseType::Untracked => bend(
            [Joint::LeftHip, Joint::LeftKnee, Joint::LeftAnkle],
            Point::new(0.5, 0.7),
            cycle_angle(phase),
        ),
        ExerciseType::Pushup => bend(
            [Joint::LeftShoulder, Joint::LeftElbow, Joint::LeftWrist],
            Point::new(0.5, 0.5),
            cycle_angle(phase),
        ),
        ExerciseType::JumpingJack => {
            // 0 closed, 1 open
            let spread = 0.5 - 0.5 * (TAU * phase).cos();
            let feet = 0.05 + 0.35 * spread;
            let wrist_y = 0.7 - 0.55 * spread;
            LandmarkSet::new()
                .with(Joint::LeftHip, Point::new(0.45, 0.5))
                .with(Joint::RightHip, Point::new(0.55, 0.5))
                .with(Joint::LeftAnkle, Point::new(0.5 - feet / 2.0, 0.9))
                .with(Joint::RightAnkle, Point::new(0.5 + feet / 2.0, 0.9))
                .with(Joint::LeftWrist, Point::new(0.3, wrist_y))
                .with(Joint::RightWrist, Point::new(0.7, wrist_y))
        }
    }
}

/// Feeds the session a pose cycling once every `period` until it closes.
fn spawn_pose_driver(session: Session, exercise: ExerciseType, period: Duration) {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut frames = tokio::time::interval(Duration::from_millis(66));
        loop {
            frames.tick().await;
            let phase = (started.elapsed().as_secs_f32() / period.as_secs_f32()).fract();
            if let Err(SessionError::Closed) =
                session.on_landmark_frame(synthetic_pose(exercise, phase))
            {
                debug!("Pose driver exiting");
                break;
            }
        }
    });
}

fn hud_lines(snapshot: &WorkoutSnapshot, target_reps: u32) -> Vec<String> {
    let clock = match snapshot.state {
        SessionState::Countdown(n) => format!("starting in {}", n),
        SessionState::Active(t) => format!("{}s left", t),
        _ => String::new(),
    };
    let reps = if target_reps > 0 {
        format!("{} / {}", snapshot.reps, target_reps)
    } else {
        snapshot.reps.to_string()
    };
    let mut lines = vec![
        format!("State:    {} {}", snapshot.state.name(), clock),
        format!("Reps:     {}", reps),
        format!("Stage:    {:?}", snapshot.stage),
        format!("Feedback: {}", snapshot.feedback),
    ];
    if let Some(result) = snapshot.result() {
        lines.push(String::new());
        lines.push(format!(
            "{} with {} reps in {}s. Press 'q' to exit",
            if result.success { "Done" } else { "Missed" },
            result.reps,
            result.elapsed_seconds
        ));
    }
    lines
}

async fn run_live(
    mut terminal: DefaultTerminal,
    session: &Session,
    coach: Option<&Loopback>,
    title: &str,
    target_reps: u32,
) -> Result<()> {
    let mut events = session.subscribe();
    let mut log_lines: Vec<String> = Vec::new();

    loop {
        while let Ok(event) = events.try_recv() {
            let line = match event {
                SessionEvent::StateChanged(state) => format!("state -> {}", state.name()),
                SessionEvent::RepCounted { reps, feedback } => format!("rep {}: {}", reps, feedback),
                SessionEvent::Finished { result, at } => format!(
                    "finished at {}: success={}",
                    at.format("%H:%M:%S"),
                    result.success
                ),
            };
            log_lines.push(line);
        }
        let snapshot = session.snapshot().await?;
        let mut hud = hud_lines(&snapshot, target_reps);
        if let Some(coach) = coach {
            log_lines.extend(coach.log.drain());
            // Below the fixed rows, above any result.
            hud.insert(4, coach.hud_line());
        }

        terminal.draw(|frame| {
            let chunks = Layout::vertical([
                Constraint::Length(3),
                Constraint::Length(9),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

            let header = Paragraph::new(format!("Pulse - {}", title))
                .style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                )
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(header, chunks[0]);

            let hud = Paragraph::new(hud.join("\n"))
                .style(Style::default().fg(Color::White))
                .block(Block::default().borders(Borders::ALL).title("Session"));
            frame.render_widget(hud, chunks[1]);

            let items: Vec<ListItem> = log_lines
                .iter()
                .rev()
                .map(|l| ListItem::new(l.as_str()))
                .collect();
            let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
            frame.render_widget(list, chunks[2]);

            let footer = Paragraph::new("q: stop and exit")
                .style(Style::default().fg(Color::Gray))
                .block(Block::default().borders(Borders::ALL).title("Status"));
            frame.render_widget(footer, chunks[3]);
        })?;

        if event::poll(Duration::from_millis(100))? {
            if let event::Event::Key(key) = event::read()? {
                if let KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc = key.code {
                    return Ok(());
                }
            }
        }
    }
}

fn print_result(result: &SessionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let level = parse_level(&args.log_level)
        .ok_or_else(|| anyhow!("Unknown log level: {}", args.log_level))?;
    init_logger(level);

    let engine = EngineConfig::from_env()?;

    match args.command {
        Commands::Replay {
            file,
            exercise,
            target_reps,
            duration,
        } => {
            let frames = load_frames(&file)?;
            info!("Replaying {} frames from {}", frames.len(), file.display());
            let config = WorkoutConfig::new(exercise.into(), target_reps, duration);
            let result = replay(config, &engine, &frames)?;
            print_result(&result)
        }
        Commands::Live {
            exercise,
            target_reps,
            duration,
            coach,
        } => {
            let exercise: ExerciseType = exercise.into();
            let config = WorkoutConfig::new(exercise, target_reps, duration);
            let coach = coach.then(|| Loopback::new(engine.audio.clone(), 3));
            let session = match &coach {
                Some(coach) => {
                    Session::start_coached(config, &engine, coach.pipeline.clone()).await?
                }
                None => Session::start(config, &engine)?,
            };
            spawn_pose_driver(session.clone(), exercise, Duration::from_secs(2));

            let terminal = ratatui::init();
            let outcome = run_live(
                terminal,
                &session,
                coach.as_ref(),
                exercise.name(),
                target_reps,
            )
            .await;
            ratatui::restore();
            outcome?;

            match session.stop().await? {
                Some(result) => print_result(&result),
                None => {
                    warn!("Session stopped before it went live");
                    println!("Stopped before the workout started");
                    Ok(())
                }
            }
        }
    }
}
