use std::io::Write as _;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use panelflow::cli::{default_user_name, speaker_color, Args, Command};
use panelflow::{
    new_shared_status, ApiClient, ClientConfig, DiscussionSessionController, ExclusivityArbiter,
    ExclusivityVerdict, Message, MessageKind, NullSink, PanelflowError, PollingRequester,
    RoomRole, ScreenName, SessionState, SessionTransport, SnapshotOutcome, SnapshotSource,
    SourceEvent, SpeechEvent, SpeechSynchronizer, StartDiscussionRequest,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {}", "error:".bright_red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), PanelflowError> {
    let config = ClientConfig::load(args.config.as_deref())?;
    let api = ApiClient::new(&config)?;

    match args.command {
        Command::Rooms => {
            let rooms = api.list_rooms().await?;
            let mut ids: Vec<_> = rooms.keys().copied().collect();
            ids.sort_unstable();
            for id in ids {
                let info = &rooms[&id];
                println!("{:>4}  {}", id.to_string().bright_cyan(), info.room_name);
            }
            Ok(())
        }
        Command::CreateRoom { name } => {
            api.create_room(&name).await?;
            println!("room created: {}", name.bright_green());
            Ok(())
        }
        Command::DeleteRoom { room } => {
            api.delete_room(room).await?;
            println!("room {} deleted", room);
            Ok(())
        }
        Command::Configs => {
            for c in api.list_configs().await? {
                let label = c.label.get("ja").or_else(|| c.label.get("en"));
                println!(
                    "{:>4}  {}",
                    c.id.to_string().bright_cyan(),
                    label.map(String::as_str).unwrap_or("(unlabeled)")
                );
                for (lang, names) in &c.panelist_names {
                    println!("      [{}] {}", lang, names.join(", ").dimmed());
                }
            }
            Ok(())
        }
        Command::Agenda { file } => {
            for entry in api.load_agenda(&file).await? {
                println!("{}", entry);
            }
            Ok(())
        }
        Command::Watch { room, screen } => watch(&config, api, room, screen).await,
        Command::Exec {
            room,
            agenda_id,
            agenda_text,
            config_id,
            config_file,
            lang,
            tech,
            select_agenda,
        } => {
            let selection = StartDiscussionRequest {
                room_id: room,
                agenda_id,
                agenda_text,
                config_id,
                config_file,
                lang,
                tech_enable: tech,
                is_select_agenda: select_agenda,
            };
            exec(&config, api, room, selection).await
        }
        Command::Typing { room } => typing(&config, api, room).await,
    }
}

// ---------------------------------------------------------------------------
// Shared printing
// ---------------------------------------------------------------------------

/// Print messages the stream has gained since the last call.
fn print_new_messages(controller: &DiscussionSessionController, printed: &mut usize) {
    let messages = controller.stream().messages();
    if messages.len() < *printed {
        *printed = 0; // server-side reset
    }
    for message in &messages[*printed..] {
        match message.kind() {
            MessageKind::Utterance => {
                let color = speaker_color(controller.roster(), message.speaker());
                println!(
                    "{} {}",
                    format!("{}:", message.speaker()).color(color).bold(),
                    message.text()
                );
            }
            MessageKind::Lifecycle(_) | MessageKind::Notice => {
                println!("{}", format!("--- {} ---", message.text()).dimmed());
            }
            MessageKind::Intervention => {
                println!("{}", "…".dimmed());
            }
        }
    }
    *printed = messages.len();
}

/// Pump push snapshots into the controller, printing as they land. Returns
/// the close reason when the transport reports one.
async fn pump_and_print(
    controller: &mut DiscussionSessionController,
    source: &mut SessionTransport,
    printed: &mut usize,
) -> Option<panelflow::DisconnectReason> {
    loop {
        match source.next_event().await {
            Some(SourceEvent::Snapshot(snapshot)) => {
                controller.apply_snapshot(snapshot);
                print_new_messages(controller, printed);
            }
            Some(SourceEvent::Closed(reason)) => return Some(reason),
            None => return None,
        }
    }
}

// ---------------------------------------------------------------------------
// Viewer
// ---------------------------------------------------------------------------

async fn watch(
    config: &ClientConfig,
    api: ApiClient,
    room: u64,
    screen: ScreenName,
) -> Result<(), PanelflowError> {
    let mut controller = DiscussionSessionController::new(
        api,
        room,
        RoomRole::View,
        new_shared_status(),
        config.timing(),
        false,
    );
    controller.mount();
    let mut source = SessionTransport::connect(config, room, RoomRole::View, screen).await?;
    println!("{}", format!("watching room {room}").dimmed());

    let mut printed = 0;
    if let Some(reason) = pump_and_print(&mut controller, &mut source, &mut printed).await {
        eprintln!("{}", format!("connection closed: {reason:?}").dimmed());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

async fn exec(
    config: &ClientConfig,
    api: ApiClient,
    room: u64,
    selection: StartDiscussionRequest,
) -> Result<(), PanelflowError> {
    let timing = config.timing();
    let mut controller = DiscussionSessionController::new(
        api.clone(),
        room,
        RoomRole::Exec,
        new_shared_status(),
        timing,
        true,
    );
    controller.mount();

    // Connect before starting so a duplicate-executor rejection arrives
    // before any round is submitted.
    let mut source =
        SessionTransport::connect(config, room, RoomRole::Exec, ScreenName::Chat).await?;

    controller.start(selection).await?;
    let user_name = default_user_name();
    println!(
        "{}",
        "round started — Enter advances, text intervenes, /stop ends".dimmed()
    );

    let mut printed = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = source.next_event() => match event {
                Some(SourceEvent::Snapshot(snapshot)) => {
                    controller.apply_snapshot(snapshot);
                    print_new_messages(&controller, &mut printed);
                    if controller.state() == SessionState::Ended && controller.input_enabled() {
                        println!("{}", "round over — type to continue the discussion".dimmed());
                    }
                }
                Some(SourceEvent::Closed(reason)) => {
                    match ExclusivityArbiter::judge_and_preempt(&reason, &mut controller) {
                        ExclusivityVerdict::Evict { notice, rejoin_as } => {
                            eprintln!("{}", notice.bright_red().bold());
                            return rejoin_as_viewer(config, room, rejoin_as, timing).await;
                        }
                        ExclusivityVerdict::Ignore(reason) => {
                            eprintln!("{}", format!("connection closed: {reason:?}").dimmed());
                            return Ok(());
                        }
                    }
                }
                None => return Ok(()),
            },
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line == "/stop" {
                    controller.stop().await?;
                    println!("{}", "discussion stopped".dimmed());
                    break;
                } else if line.is_empty() {
                    if controller.advance_enabled() {
                        if let Err(e) = controller.request_next().await {
                            eprintln!("{} {e}", "advance failed:".yellow());
                        }
                    }
                } else if controller.input_enabled() {
                    if let Err(e) = controller.intervene(&user_name, line).await {
                        eprintln!("{} {e}", "intervention failed:".yellow());
                    }
                } else {
                    eprintln!("{}", "input is disabled right now".yellow());
                }
            }
        }
    }
    Ok(())
}

/// The eviction redirect: rejoin the same room without privileges. The
/// executor socket is never reconnected.
async fn rejoin_as_viewer(
    config: &ClientConfig,
    room: u64,
    role: RoomRole,
    timing: panelflow::TimingConfig,
) -> Result<(), PanelflowError> {
    let api = ApiClient::new(config)?;
    let mut controller = DiscussionSessionController::new(
        api,
        room,
        role,
        new_shared_status(),
        timing,
        false,
    );
    controller.mount();
    let mut source = SessionTransport::connect(config, room, role, ScreenName::Chat).await?;
    let mut printed = 0;
    pump_and_print(&mut controller, &mut source, &mut printed).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Typing surface
// ---------------------------------------------------------------------------

async fn typing(config: &ClientConfig, api: ApiClient, room: u64) -> Result<(), PanelflowError> {
    let timing = config.timing();
    let mut controller = DiscussionSessionController::new(
        api.clone(),
        room,
        RoomRole::View,
        new_shared_status(),
        timing,
        false,
    );
    controller.mount();

    let (mut synchronizer, events) = SpeechSynchronizer::new(
        timing.reveal_cadence,
        timing.settle_delay,
        Arc::new(NullSink),
    );
    let mut events = UnboundedReceiverStream::new(events);
    let mut requester = PollingRequester::new(api, room, controller.poll_interval());

    loop {
        let Some(event) = requester.next_event().await else { break };
        match event {
            SourceEvent::Snapshot(snapshot) => {
                if let SnapshotOutcome::NewUtterance(message) =
                    controller.apply_snapshot(snapshot)
                {
                    present_utterance(&mut synchronizer, &mut events, &controller, &message)
                        .await?;
                }
            }
            SourceEvent::Closed(_) => break,
        }
        requester.set_interval(controller.poll_interval());
        if controller.state() == SessionState::Ended {
            println!("{}", "--- discussion ended ---".dimmed());
            break;
        }
    }
    Ok(())
}

/// Reveal one utterance on the terminal at speech pace.
async fn present_utterance(
    synchronizer: &mut SpeechSynchronizer,
    events: &mut UnboundedReceiverStream<SpeechEvent>,
    controller: &DiscussionSessionController,
    message: &Message,
) -> Result<(), PanelflowError> {
    let speaker = message.speaker();
    let (pitch, voice_id) = controller
        .participant(speaker)
        .map(|p| (p.voice_pitch, p.voice_id))
        .unwrap_or((1.0, 0));
    let color = speaker_color(controller.roster(), speaker);
    let label = format!("{speaker}:").color(color).bold();

    let speak = synchronizer.speak(message.text(), pitch, voice_id);
    tokio::pin!(speak);
    let mut speak_result = None;
    loop {
        tokio::select! {
            res = &mut speak, if speak_result.is_none() => {
                let failed = res.is_err();
                speak_result = Some(res);
                if failed {
                    // No UtteranceComplete will follow a playback failure.
                    break;
                }
            }
            maybe_event = events.next() => match maybe_event {
                Some(SpeechEvent::Frame(frame)) => {
                    print!("\r{label} {}", frame.text);
                    let _ = std::io::stdout().flush();
                }
                Some(SpeechEvent::UtteranceComplete) => {
                    println!();
                    break;
                }
                None => break,
            }
        }
    }
    speak_result.unwrap_or(Ok(()))
}
