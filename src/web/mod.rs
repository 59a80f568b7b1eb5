//! Read-only observer: the simulation runs on a blocking task and every
//! frame is published over plain JSON endpoints and a server-sent event
//! stream. There are no input endpoints.

use std::{
    collections::VecDeque,
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    engine::{Engine, EngineSettings},
    events::LoggedEvent,
    world::{ServantView, Settlement, SettlementSnapshot},
};

/// Frames kept for `/api/frames`; older ones are dropped first.
pub const FRAME_HISTORY: usize = 600;

#[derive(Clone, Serialize)]
pub struct UiFrame {
    pub snapshot: SettlementSnapshot,
    pub completed: bool,
}

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub total_ticks: u64,
    pub frame: Option<UiFrame>,
    pub completed: bool,
}

pub struct WebServerConfig {
    pub world: Settlement,
    pub settings: EngineSettings,
    pub ticks: u64,
    pub host: String,
    pub port: u16,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame store shared by the simulation task and the request handlers.
struct Observer {
    scenario: String,
    total_ticks: u64,
    latest: Mutex<Option<UiFrame>>,
    history: Mutex<VecDeque<UiFrame>>,
    capacity: usize,
    done: AtomicBool,
    broadcaster: broadcast::Sender<String>,
}

impl Observer {
    fn new(scenario: String, total_ticks: u64, capacity: usize) -> Self {
        let (broadcaster, _) = broadcast::channel::<String>(512);
        Self {
            scenario,
            total_ticks,
            latest: Mutex::new(None),
            history: Mutex::new(VecDeque::with_capacity(capacity.min(FRAME_HISTORY))),
            capacity: capacity.max(1),
            done: AtomicBool::new(false),
            broadcaster,
        }
    }

    fn record(&self, snapshot: SettlementSnapshot) {
        let frame = UiFrame {
            snapshot,
            completed: false,
        };
        {
            let mut history = locked(&self.history);
            while history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(frame.clone());
        }
        self.publish(&frame);
        *locked(&self.latest) = Some(frame);
    }

    /// Marks the run complete and republishes the last frame flagged as such.
    fn finish(&self) {
        self.done.store(true, Ordering::SeqCst);
        let Some(mut frame) = locked(&self.latest).clone() else {
            return;
        };
        frame.completed = true;
        {
            let mut history = locked(&self.history);
            match history.back_mut() {
                Some(last) => *last = frame.clone(),
                None => history.push_back(frame.clone()),
            }
        }
        self.publish(&frame);
        *locked(&self.latest) = Some(frame);
    }

    fn publish(&self, frame: &UiFrame) {
        if let Ok(payload) = serde_json::to_string(frame) {
            let _ = self.broadcaster.send(payload);
        }
    }

    fn completed(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn latest_snapshot<T>(&self, pick: impl FnOnce(&SettlementSnapshot) -> T) -> Option<T> {
        locked(&self.latest).as_ref().map(|frame| pick(&frame.snapshot))
    }
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        mut world,
        settings,
        ticks,
        host,
        port,
    } = config;

    let scenario_name = settings.scenario_name.clone();
    let mut engine = Engine::standard(settings);
    let observer = Arc::new(Observer::new(scenario_name.clone(), ticks, FRAME_HISTORY));

    let sim_observer = observer.clone();
    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        engine.run_with_hook(&mut world, ticks, |snapshot| sim_observer.record(snapshot))?;
        sim_observer.finish();
        Ok(())
    });

    let scenario_label = scenario_name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %scenario_label, "simulation completed"),
            Ok(Err(err)) => error!("simulation error: {err:?}"),
            Err(err) => error!("simulation task failed: {err:?}"),
        }
    });

    let router = Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/frames", get(recent_frames))
        .route("/api/servants", get(servant_roster))
        .route("/api/log", get(event_log))
        .route("/api/events", get(stream_events))
        .with_state(observer);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    info!(%addr, scenario = %scenario_name, "observer live (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down observer");
}

async fn latest_state(State(observer): State<Arc<Observer>>) -> Json<StateEnvelope> {
    let frame = locked(&observer.latest).clone();
    Json(StateEnvelope {
        scenario: observer.scenario.clone(),
        total_ticks: observer.total_ticks,
        frame,
        completed: observer.completed(),
    })
}

#[derive(Serialize)]
struct FramesResponse {
    scenario: String,
    total_ticks: u64,
    completed: bool,
    frames: Vec<UiFrame>,
}

async fn recent_frames(State(observer): State<Arc<Observer>>) -> Json<FramesResponse> {
    let frames = locked(&observer.history).iter().cloned().collect();
    Json(FramesResponse {
        scenario: observer.scenario.clone(),
        total_ticks: observer.total_ticks,
        completed: observer.completed(),
        frames,
    })
}

#[derive(Serialize)]
struct RosterResponse {
    tick: Option<u64>,
    alive: usize,
    servants: Vec<ServantView>,
}

async fn servant_roster(State(observer): State<Arc<Observer>>) -> Json<RosterResponse> {
    let roster = observer.latest_snapshot(|snapshot| RosterResponse {
        tick: Some(snapshot.tick),
        alive: snapshot.alive,
        servants: snapshot.servants.clone(),
    });
    Json(roster.unwrap_or(RosterResponse {
        tick: None,
        alive: 0,
        servants: Vec::new(),
    }))
}

async fn event_log(State(observer): State<Arc<Observer>>) -> Json<Vec<LoggedEvent>> {
    Json(
        observer
            .latest_snapshot(|snapshot| snapshot.recent_events.clone())
            .unwrap_or_default(),
    )
}

async fn stream_events(
    State(observer): State<Arc<Observer>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = observer.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::spatial::TileGrid;

    fn snapshot_at(world: &mut Settlement, tick: u64) -> SettlementSnapshot {
        world.tick = tick;
        world.snapshot("observer")
    }

    #[test]
    fn history_keeps_only_the_newest_frames() {
        let mut world = Settlement::new(TileGrid::new(8, 8), Tuning::default(), 3);
        let observer = Observer::new("observer".into(), 10, 3);
        for tick in 1..=5 {
            observer.record(snapshot_at(&mut world, tick));
        }
        let ticks: Vec<u64> = locked(&observer.history)
            .iter()
            .map(|frame| frame.snapshot.tick)
            .collect();
        assert_eq!(ticks, vec![3, 4, 5]);
        assert_eq!(observer.latest_snapshot(|s| s.tick), Some(5));
    }

    #[test]
    fn finish_flags_the_last_frame() {
        let mut world = Settlement::new(TileGrid::new(8, 8), Tuning::default(), 3);
        world.spawn_settler("Adalyn");
        let observer = Observer::new("observer".into(), 2, 4);
        observer.record(snapshot_at(&mut world, 1));
        observer.finish();

        assert!(observer.completed());
        let history = locked(&observer.history);
        assert_eq!(history.len(), 1);
        assert!(history[0].completed);
        assert_eq!(observer.latest_snapshot(|s| s.servants.len()), Some(1));
    }
}
