use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::app::{AppController, ChatSurface, DemoSurface, VoiceSessionController};
use crate::cli::{Command, DemoAction, ReplyArgs};
use crate::domain::voice::VOICE_CATALOG;
use crate::domain::{AudioReply, Notice, ReportId, Sender};

/// Run one CLI command against the controller.
pub async fn dispatch(controller: &AppController, command: Command) -> Result<()> {
    match command {
        Command::Login { token } => login(controller, &token).await,
        Command::Logout => logout(controller),
        Command::Whoami => whoami(controller).await,
        Command::Reports => reports(controller).await,
        Command::Download { report_id, out } => download(controller, report_id, out).await,
        Command::Upload { file } => upload(controller, &file).await,
        Command::History { report } => history(controller, report).await,
        Command::Ask { text, report, reply } => ask(controller, &text, report, &reply).await,
        Command::Talk { report, reply } => talk(controller, report, &reply).await,
        Command::Demo { action } => demo(controller, action).await,
        Command::Voices => {
            voices();
            Ok(())
        }
        Command::Devices { select, reset } => devices(controller, select, reset),
        Command::Paths => {
            paths(controller);
            Ok(())
        }
    }
}

fn show(notice: &Notice) {
    if notice.is_error() {
        eprintln!("{}", notice);
    } else {
        println!("{}", notice);
    }
}

/// Enter a guarded path; prints the sign-in hint and returns false when refused.
async fn enter(controller: &AppController, path: &str) -> bool {
    match controller.require_session(path).await {
        Ok(()) => true,
        Err(e) => {
            show(&Notice::from_error("Access refused", &e));
            eprintln!("Run `voicereport login --token <cookie>` first.");
            false
        }
    }
}

// ==================== Session Commands ====================

async fn login(controller: &AppController, token: &str) -> Result<()> {
    match controller.login(token).await {
        Ok(Some(session)) => {
            let name = session.user.name.as_deref().unwrap_or(session.user.id.as_str());
            println!("Signed in as {}", name);
        }
        Ok(None) => show(&Notice::error(
            "Cookie stored, but the web app does not recognize it",
        )),
        Err(e) => show(&Notice::from_error("Error signing in", &e)),
    }
    Ok(())
}

fn logout(controller: &AppController) -> Result<()> {
    controller.logout().context("Failed to remove stored session")?;
    println!("Signed out");
    Ok(())
}

async fn whoami(controller: &AppController) -> Result<()> {
    let user = controller.whoami().await;
    match user.session() {
        Some(session) => {
            println!("id:    {}", session.user.id);
            if let Some(name) = &session.user.name {
                println!("name:  {}", name);
            }
            if let Some(email) = &session.user.email {
                println!("email: {}", email);
            }
            if let Some(expires) = &session.expires {
                println!("until: {}", expires);
            }
        }
        None if user.has_credentials() => println!("Stored cookie is not signed in"),
        None => println!("Not signed in"),
    }
    Ok(())
}

// ==================== Report Commands ====================

async fn reports(controller: &AppController) -> Result<()> {
    if !enter(controller, "/user").await {
        return Ok(());
    }
    let selector = controller.report_selector().await;
    match selector.load().await {
        Ok(reports) if reports.is_empty() => println!("No reports yet. Upload one with `voicereport upload <file>`."),
        Ok(reports) => {
            let selected = selector.selected();
            for id in reports {
                let marker = if Some(&id) == selected.as_ref() { "*" } else { " " };
                println!("{} {}", marker, id);
            }
        }
        Err(e) => show(&Notice::from_error("Error fetching reports", &e)),
    }
    Ok(())
}

async fn download(controller: &AppController, report_id: String, out: Option<PathBuf>) -> Result<()> {
    if !enter(controller, "/user").await {
        return Ok(());
    }
    let dest = out.unwrap_or_else(|| PathBuf::from(&report_id));
    let selector = controller.report_selector().await;
    match selector.download(&ReportId::new(report_id), &dest).await {
        Ok(bytes) => println!("Saved {} ({} bytes)", dest.display(), bytes),
        Err(e) => show(&Notice::from_error("Error downloading report", &e)),
    }
    Ok(())
}

async fn upload(controller: &AppController, file: &Path) -> Result<()> {
    let surface = controller.upload_surface().await;
    info!(route = surface.route(), file = ?file, "Uploading");
    let outcome = surface.upload(file).await;
    if let Some(notice) = &outcome.notice {
        show(notice);
    }
    if let Some(message) = &outcome.server_message {
        println!("{}", message);
    }
    if let Some(route) = outcome.next_route {
        info!(route, "Upload finished");
        println!("Continue with `voicereport ask` or `voicereport talk` ({})", route);
    }
    Ok(())
}

// ==================== Chat Commands ====================

/// Chat surface mounted on `report`, or on the default selection.
async fn mounted_chat(controller: &AppController, report: Option<String>) -> Result<ChatSurface> {
    let chat = controller
        .chat_surface()
        .await
        .context("Failed to open chat")?;
    if let Some(notice) = chat.mount().await {
        show(&notice);
    }
    if let Some(report) = report {
        if let Some(notice) = chat.select_report(ReportId::new(report)).await {
            show(&notice);
        }
    }
    Ok(chat)
}

fn print_log(chat: &ChatSurface) {
    if let Some(report) = chat.reports().selected() {
        println!("Report {}", report);
    }
    let messages = chat.messages();
    if messages.is_empty() {
        println!("(no messages)");
    }
    for message in messages {
        let who = match message.sender {
            Sender::User => "You",
            Sender::Ai => "AI ",
        };
        println!("{}: {}", who, message.display_text());
    }
}

async fn history(controller: &AppController, report: Option<String>) -> Result<()> {
    let chat = mounted_chat(controller, report).await?;
    print_log(&chat);
    Ok(())
}

async fn ask(
    controller: &AppController,
    text: &str,
    report: Option<String>,
    reply_args: &ReplyArgs,
) -> Result<()> {
    let chat = mounted_chat(controller, report).await?;
    match chat.ask(text).await {
        Ok(Some(reply)) => deliver(controller, &reply, reply_args)?,
        Ok(None) => println!("Nothing to ask"),
        Err(notice) => show(&notice),
    }
    Ok(())
}

async fn talk(controller: &AppController, report: Option<String>, reply_args: &ReplyArgs) -> Result<()> {
    let chat = mounted_chat(controller, report).await?;
    if let Some(notice) = chat.start_voice().await {
        show(&notice);
        return Ok(());
    }
    match voice_turn(chat.voice(), chat.stop_voice()).await? {
        Some(Ok(reply)) => deliver(controller, &reply, reply_args)?,
        Some(Err(notice)) => show(&notice),
        None => {}
    }
    Ok(())
}

// ==================== Demo Commands ====================

async fn demo(controller: &AppController, action: DemoAction) -> Result<()> {
    let surface = controller.demo_surface().context("Failed to open demo")?;
    match action {
        DemoAction::Ask {
            text,
            language,
            accent,
            voice,
            reply,
        } => {
            if let Err(e) = choose_voice(&surface, language, accent, voice) {
                show(&Notice::from_error("Invalid voice selection", &e));
                return Ok(());
            }
            match surface.ask(&text).await {
                Ok(Some(audio)) => deliver(controller, &audio, &reply)?,
                Ok(None) => println!("Nothing to ask"),
                Err(notice) => show(&notice),
            }
        }
        DemoAction::Talk { reply } => {
            if let Some(notice) = surface.start_voice().await {
                show(&notice);
                return Ok(());
            }
            match voice_turn(surface.voice(), surface.stop_voice()).await? {
                Some(Ok(audio)) => deliver(controller, &audio, &reply)?,
                Some(Err(notice)) => show(&notice),
                None => {}
            }
        }
    }
    Ok(())
}

fn choose_voice(
    surface: &DemoSurface,
    language: Option<String>,
    accent: Option<String>,
    voice: Option<String>,
) -> Result<(), crate::domain::DomainError> {
    // Order matters: each step resets the ones after it.
    if let Some(language) = language {
        surface.set_language(&language)?;
    }
    if let Some(accent) = accent {
        surface.set_accent(&accent)?;
    }
    if let Some(voice) = voice {
        surface.set_voice(&voice)?;
    }
    Ok(())
}

fn voices() {
    for language in VOICE_CATALOG.iter() {
        println!("{} ({})", language.code, language.label);
        for accent in &language.accents {
            println!("  {} ({})", accent.code, accent.label);
            for voice in &accent.voices {
                let marker = if *voice == accent.default_voice() { " (default)" } else { "" };
                println!("    {}{}", voice, marker);
            }
        }
    }
}

// ==================== Audio Commands ====================

/// Resolves when a line is read from stdin.
///
/// A detached thread does the read so a pending read never holds up runtime shutdown.
fn enter_pressed() -> Result<oneshot::Receiver<()>> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-enter".to_string())
        .spawn(move || {
            let mut line = String::new();
            let _ = std::io::stdin().read_line(&mut line);
            let _ = tx.send(());
        })
        .context("Failed to watch stdin")?;
    Ok(rx)
}

/// Capture until Enter, then await `finish` for the reply.
///
/// Ctrl-C abandons the turn in either phase and yields `None`. Once the
/// handler is installed the default SIGINT exit is gone, so the upload
/// must watch it too.
async fn voice_turn<T>(
    voice: &VoiceSessionController,
    finish: impl Future<Output = T>,
) -> Result<Option<T>> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if !record_until_enter(voice, ctrl_c.as_mut()).await? {
        return Ok(None);
    }
    eprintln!("Processing... Ctrl-C to abandon");
    let outcome = unless_cancelled(finish, ctrl_c.as_mut()).await;
    if outcome.is_none() {
        warn!("Reply abandoned before the backend answered");
        eprintln!("Cancelled");
    }
    Ok(outcome)
}

/// `work`'s output, or `None` when `cancel` resolves first.
async fn unless_cancelled<T, C: Future>(work: impl Future<Output = T>, cancel: Pin<&mut C>) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        _ = cancel => None,
    }
}

/// Keep capturing until Enter. `cancel` firing abandons the capture without
/// uploading and returns false.
async fn record_until_enter<C: Future>(
    voice: &VoiceSessionController,
    mut cancel: Pin<&mut C>,
) -> Result<bool> {
    eprintln!("Recording... press Enter to stop, Ctrl-C to cancel");
    let mut enter = enter_pressed()?;
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        tokio::select! {
            _ = &mut enter => {
                eprintln!();
                return Ok(true);
            }
            _ = cancel.as_mut() => {
                eprintln!();
                if let Err(e) = voice.cancel().await {
                    warn!(error = %e, "Cancel failed");
                }
                eprintln!("Cancelled");
                return Ok(false);
            }
            _ = ticker.tick() => {
                if let Err(e) = voice.poll().await {
                    eprintln!();
                    show(&Notice::from_error("Recording stopped", &e));
                    return Ok(false);
                }
                eprint!(
                    "\r{:>5.1}s  level {:>3.0}%  chunks {}",
                    voice.elapsed().as_secs_f32(),
                    voice.level() * 100.0,
                    voice.buffered_chunks()
                );
            }
        }
    }
}

fn devices(controller: &AppController, select: Option<String>, reset: bool) -> Result<()> {
    if select.is_some() || reset {
        match controller.select_device(select.as_deref()) {
            Ok(()) => println!("Input device: {}", select.as_deref().unwrap_or("system default")),
            Err(e) => show(&Notice::from_error("Error selecting device", &e)),
        }
        return Ok(());
    }

    let current = controller.config().audio.device;
    match controller.list_devices() {
        Ok(devices) => {
            for device in devices {
                let selected = current.as_deref() == Some(device.id.as_str());
                let marker = if selected { "*" } else { " " };
                let default = if device.is_default { " (default)" } else { "" };
                println!("{} {}{}", marker, device.id, default);
            }
        }
        Err(e) => show(&Notice::from_error("Error listing devices", &e)),
    }
    Ok(())
}

/// Write a spoken reply to disk and optionally hand it to the system player.
fn deliver(controller: &AppController, reply: &AudioReply, args: &ReplyArgs) -> Result<()> {
    let path = match &args.out {
        Some(path) => path.clone(),
        None => {
            let dir = &controller.paths().replies_dir;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            dir.join(reply_file_name(reply))
        }
    };
    std::fs::write(&path, &reply.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Reply saved to {}", path.display());

    if args.play {
        if let Err(e) = open::that(&path) {
            show(&Notice::error(format!("Could not start player: {}", e)));
        }
    }
    Ok(())
}

fn reply_file_name(reply: &AudioReply) -> String {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("reply-{}.{}", stamp, reply.extension())
}

fn paths(controller: &AppController) {
    let paths = controller.paths();
    println!("config:  {}", paths.config_file.display());
    println!("data:    {}", paths.data_dir.display());
    println!("logs:    {}", paths.logs_dir.display());
    println!("replies: {}", paths.replies_dir.display());
}
