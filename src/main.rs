//! Party Chaos Match Server
//!
//! Bootstrapper for the authoritative match host.
//!
//! - `--demo` (default): run a scripted headless match at full speed.
//! - `--server`: host one match behind the WebSocket edge server.

use std::time::Duration;
use anyhow::{bail, Context};
use tokio::sync::broadcast;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use party_chaos::{
    TICK_RATE, VERSION,
    core::{clock::default_tick, ids::ParticipantId},
    game::{
        config::MatchConfig,
        state::MatchPhase,
        world::HeadlessWorld,
        zone::{ZoneConfig, ZoneId},
    },
    network::{
        host::{MatchHandle, MatchHost},
        protocol::ServerMessage,
        server::{GameServer, ServerConfig},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Party Chaos Server v{}", VERSION);
    info!("Tick Rate: {} Hz", TICK_RATE);

    let mode = std::env::args().nth(1);
    match mode.as_deref() {
        None | Some("--demo") => run_demo().await,
        Some("--server") => run_server().await,
        Some(other) => bail!("unknown mode {other:?}; expected --demo or --server"),
    }
}

fn init_tracing() {
    let default = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// =============================================================================
// SERVER
// =============================================================================

async fn run_server() -> anyhow::Result<()> {
    let server_config = ServerConfig::from_env();
    let match_config = MatchConfig::from_env();
    info!(?match_config, "Match rules");

    let (host, handle) = MatchHost::new(match_config, Box::new(HeadlessWorld::new()), server_config.tick())
        .context("failed to create match host")?;
    let server = GameServer::new(server_config, handle);
    let host_task = tokio::spawn(host.run(server.subscribe_shutdown()));

    tokio::select! {
        result = server.run() => result.context("server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Ctrl-C received"),
    }

    server.shutdown();
    host_task.await.context("match host task panicked")??;
    Ok(())
}

// =============================================================================
// DEMO
// =============================================================================

/// Scripted match: round 0 ends by eliminations, round 1 by timeout and
/// round 2 by an external end signal.
async fn run_demo() -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let config = MatchConfig::from_env();
    let tick = default_tick();
    let (mut host, handle) = MatchHost::new(config.clone(), Box::new(HeadlessWorld::new()), tick)
        .context("invalid match config")?;
    let zone = host.add_zone(ZoneConfig::default());
    let mut updates = handle.subscribe();

    let ids: Vec<ParticipantId> = (1..=4).map(ParticipantId::new).collect();
    for id in &ids {
        handle.connect(*id).await?;
    }
    for id in &ids {
        handle.set_ready(*id, true).await?;
    }

    // Upper bound so a broken script cannot spin forever
    let per_round = config.countdown_duration + config.round_duration + config.results_duration;
    let budget = per_round * config.rounds_per_match + Duration::from_secs(10);
    let max_ticks = budget.as_micros() / tick.as_micros().max(1);

    let mut play_time = Duration::ZERO;
    let mut finished = false;
    for _ in 0..max_ticks {
        let result = host.step(tick)?;
        log_updates(&mut updates);

        if result.match_ended {
            finished = true;
            break;
        }

        if host.session().phase() != MatchPhase::Playing {
            play_time = Duration::ZERO;
            continue;
        }
        play_time += tick;
        script(&handle, zone, &ids, host.session().current_round_index(), play_time, tick).await?;
    }

    if !finished {
        bail!("demo match did not finish within {:?}", budget);
    }

    info!("=== Match Results ===");
    for (place, (id, points)) in host.session().scoreboard().standings().iter().enumerate() {
        info!("#{}: {} - {} points", place + 1, id, points);
    }
    info!("Final phase: {}", host.session().phase());
    Ok(())
}

/// Did `play_time` cross `at` during the last tick?
fn crossed(play_time: Duration, tick: Duration, at: Duration) -> bool {
    play_time >= at && play_time.saturating_sub(tick) < at
}

async fn script(
    handle: &MatchHandle,
    zone: ZoneId,
    ids: &[ParticipantId],
    round: u32,
    play_time: Duration,
    tick: Duration,
) -> anyhow::Result<()> {
    let at = |secs: f64| crossed(play_time, tick, Duration::from_secs_f64(secs));

    if play_time == tick {
        handle.enter_zone(zone, ids[0]).await?;
        handle.enter_zone(zone, ids[1]).await?;
    }

    match round % 3 {
        0 => {
            if at(2.0) {
                handle.record_hit(ids[2], ids[0]).await?;
            }
            if at(2.5) {
                handle.eliminate(ids[2]).await?;
            }
            if at(4.0) {
                handle.eliminate(ids[3]).await?;
            }
            if at(6.0) {
                handle.eliminate(ids[1]).await?;
            }
        }
        1 => {
            if at(1.0) {
                handle.add_points(ids[3], 50).await?;
            }
        }
        _ => {
            if at(3.0) {
                handle.end_round().await?;
            }
        }
    }
    Ok(())
}

fn log_updates(updates: &mut broadcast::Receiver<ServerMessage>) {
    while let Ok(msg) = updates.try_recv() {
        match msg {
            ServerMessage::Event(event) => match event.participant() {
                Some(id) => info!(seq = event.seq, at_ms = event.at_ms, participant = %id, "{:?}", event.data),
                None => info!(seq = event.seq, at_ms = event.at_ms, "{:?}", event.data),
            },
            ServerMessage::Snapshot(snapshot) => debug!(revision = snapshot.revision, phase = %snapshot.phase, "Snapshot"),
            other => debug!(?other, "Update"),
        }
    }
}
