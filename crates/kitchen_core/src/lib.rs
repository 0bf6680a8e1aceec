//! Client-side coordinator for kitchen order fulfillment. Reconciles push
//! notifications and periodic polling into one authoritative view of the
//! active order set, dispatches single-owner claim commands, and publishes
//! recomputed aggregate/ticket snapshots to the display layer.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use shared::{
    domain::{ChefId, ChefRef, ItemStatus, OrderItemId, ProductId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{KitchenPush, OrderItemPayload, OrderPayload, UpdateItemStatusRequest},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

pub mod aggregate;
pub mod claim;
pub mod projector;

pub use aggregate::{aggregate, AggregateRow};
pub use claim::{item_affordance, ClaimError, ItemAffordance};
pub use projector::{project_tickets, Ticket};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const PUSH_RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(500);
const PUSH_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(15);
const PUSH_EVENT_BUFFER: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Read/command interface to the external order store. The store is the one
/// shared source of truth between terminals; this client never mutates its
/// local copy ahead of a confirmed read.
#[async_trait]
pub trait KitchenOrderApi: Send + Sync {
    /// Fetches the authoritative active order set (confirmed/preparing).
    async fn fetch_active_orders(&self) -> Result<Vec<OrderPayload>>;
    /// Requests one forward item-status transition. The acting chef comes
    /// from the caller's authenticated context; the server arbitrates
    /// conflicting claims.
    async fn update_item_status(
        &self,
        item_id: OrderItemId,
        target_status: ItemStatus,
    ) -> Result<()>;
}

pub struct MissingKitchenOrderApi;

#[async_trait]
impl KitchenOrderApi for MissingKitchenOrderApi {
    async fn fetch_active_orders(&self) -> Result<Vec<OrderPayload>> {
        Err(anyhow!("order backend is unavailable"))
    }

    async fn update_item_status(
        &self,
        item_id: OrderItemId,
        _target_status: ItemStatus,
    ) -> Result<()> {
        Err(anyhow!("order backend is unavailable for item {}", item_id.0))
    }
}

/// Subscription to the kitchen push topics. Each successful `connect` yields
/// a receiver that ends when the underlying connection drops; reconnecting
/// is the coordinator's job.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn connect(&self) -> Result<mpsc::Receiver<KitchenPush>>;
}

pub struct MissingPushChannel;

#[async_trait]
impl PushChannel for MissingPushChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<KitchenPush>> {
        Err(anyhow!("push channel is unavailable"))
    }
}

/// External alerting collaborator, fired once per distinct new-order push
/// message and never on poll.
pub trait NotificationSink: Send + Sync {
    fn order_placed_alert(&self);
}

pub struct SilentNotificationSink;

impl NotificationSink for SilentNotificationSink {
    fn order_placed_alert(&self) {}
}

/// Why a refresh was scheduled; informational, for logs only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Poll,
    Push,
    Command,
}

/// Everything the display needs, recomputed as a whole on every refresh.
#[derive(Debug, Clone)]
pub struct KitchenSnapshot {
    pub orders: Vec<OrderPayload>,
    pub rows: Vec<AggregateRow>,
    pub tickets: Vec<Ticket>,
    pub focus: Option<ProductId>,
    /// True when the last fetch attempt failed and the data shown is the
    /// last known good state.
    pub stale: bool,
}

#[derive(Debug, Clone)]
pub enum KitchenEvent {
    SnapshotUpdated(KitchenSnapshot),
    ClaimRejected {
        item_id: OrderItemId,
        reason: String,
    },
}

struct CoordinatorState {
    orders: Vec<OrderPayload>,
    focus: Option<ProductId>,
    stale: bool,
    started: bool,
    refresh_rx: Option<mpsc::Receiver<RefreshReason>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorState {
    fn snapshot(&self) -> KitchenSnapshot {
        KitchenSnapshot {
            rows: aggregate::aggregate(&self.orders),
            tickets: projector::project_tickets(&self.orders, self.focus),
            orders: self.orders.clone(),
            focus: self.focus,
            stale: self.stale,
        }
    }
}

pub struct KitchenCoordinator {
    api: Arc<dyn KitchenOrderApi>,
    push: Arc<dyn PushChannel>,
    notifier: Arc<dyn NotificationSink>,
    identity: ChefRef,
    poll_interval: Duration,
    refresh_tx: mpsc::Sender<RefreshReason>,
    inner: Mutex<CoordinatorState>,
    events: broadcast::Sender<KitchenEvent>,
}

impl KitchenCoordinator {
    pub fn new(
        api: Arc<dyn KitchenOrderApi>,
        push: Arc<dyn PushChannel>,
        notifier: Arc<dyn NotificationSink>,
        identity: ChefRef,
    ) -> Arc<Self> {
        Self::new_with_poll_interval(api, push, notifier, identity, DEFAULT_POLL_INTERVAL)
    }

    pub fn new_with_poll_interval(
        api: Arc<dyn KitchenOrderApi>,
        push: Arc<dyn PushChannel>,
        notifier: Arc<dyn NotificationSink>,
        identity: ChefRef,
        poll_interval: Duration,
    ) -> Arc<Self> {
        // Capacity 1: a full queue already means "refresh again after the
        // in-flight one", so further triggers coalesce away.
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            push,
            notifier,
            identity,
            poll_interval,
            refresh_tx,
            inner: Mutex::new(CoordinatorState {
                orders: Vec::new(),
                focus: None,
                stale: false,
                started: false,
                refresh_rx: Some(refresh_rx),
                tasks: Vec::new(),
            }),
            events,
        })
    }

    pub fn identity(&self) -> &ChefRef {
        &self.identity
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<KitchenEvent> {
        self.events.subscribe()
    }

    /// Spawns the refresh worker, the poll ticker and the push listener.
    /// A coordinator is started at most once; a remounted dashboard builds a
    /// fresh coordinator so no stale handlers survive teardown.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let refresh_rx = {
            let mut state = self.inner.lock().await;
            if state.started {
                return Err(anyhow!("coordinator already started"));
            }
            state.started = true;
            state
                .refresh_rx
                .take()
                .ok_or_else(|| anyhow!("coordinator cannot be restarted after shutdown"))?
        };

        let worker = tokio::spawn(Arc::clone(self).run_refresh_worker(refresh_rx));
        let poller = tokio::spawn(Arc::clone(self).run_poll_ticker());
        let listener = tokio::spawn(Arc::clone(self).run_push_listener());

        let mut state = self.inner.lock().await;
        state.tasks = vec![worker, poller, listener];
        info!(chef = %self.identity.username, "coordinator: started");
        Ok(())
    }

    /// Tears down all background tasks deterministically; nothing fires
    /// after this returns.
    pub async fn shutdown(&self) {
        let tasks = {
            let mut state = self.inner.lock().await;
            std::mem::take(&mut state.tasks)
        };
        for task in &tasks {
            task.abort();
        }
        info!("coordinator: stopped");
    }

    /// Schedules a refresh. Both liveness signals (push and poll) and
    /// post-command confirmation funnel through here; a trigger arriving
    /// while one is already queued behind the in-flight fetch is coalesced.
    pub fn request_refresh(&self, reason: RefreshReason) {
        match self.refresh_tx.try_send(reason) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?reason, "refresh: trigger coalesced, one already queued");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(?reason, "refresh: worker gone, trigger dropped");
            }
        }
    }

    pub async fn snapshot(&self) -> KitchenSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Toggles the focus product: selecting the active filter again clears
    /// it. Pure recompute over the cached order set, no network round trip.
    /// Returns the filter now in effect.
    pub async fn set_focus(&self, product_id: ProductId) -> Option<ProductId> {
        let snapshot = {
            let mut state = self.inner.lock().await;
            state.focus = if state.focus == Some(product_id) {
                None
            } else {
                Some(product_id)
            };
            state.snapshot()
        };
        let focus = snapshot.focus;
        debug!(?focus, "display: focus filter toggled");
        let _ = self.events.send(KitchenEvent::SnapshotUpdated(snapshot));
        focus
    }

    /// What the display should offer the local chef for this item.
    pub fn affordance_for(&self, item: &OrderItemPayload) -> ItemAffordance {
        claim::item_affordance(item, &self.identity)
    }

    /// Claims a pending item (pending -> cooking). Any chef may race for a
    /// claim; the outcome is only trusted once the next refresh confirms it.
    pub async fn claim_item(&self, item_id: OrderItemId) -> Result<(), ClaimError> {
        let item = self
            .find_item(item_id)
            .await
            .ok_or(ClaimError::UnknownItem { item_id })?;
        claim::ensure_claimable(&item)?;
        self.dispatch_status_command(item_id, ItemStatus::Cooking)
            .await
    }

    /// Marks an owned cooking item done (cooking -> done). Refused locally
    /// when the local chef does not hold the claim, so doomed commands are
    /// not dispatched; the server still enforces ownership.
    pub async fn complete_item(&self, item_id: OrderItemId) -> Result<(), ClaimError> {
        let item = self
            .find_item(item_id)
            .await
            .ok_or(ClaimError::UnknownItem { item_id })?;
        claim::ensure_completable(&item, &self.identity)?;
        self.dispatch_status_command(item_id, ItemStatus::Done).await
    }

    async fn find_item(&self, item_id: OrderItemId) -> Option<OrderItemPayload> {
        let state = self.inner.lock().await;
        state
            .orders
            .iter()
            .flat_map(|order| order.items.iter())
            .find(|item| item.item_id == item_id)
            .cloned()
    }

    /// Sends one status command. The local snapshot is never touched here:
    /// two terminals may race for the same item and only the server can
    /// arbitrate, so confirmation always comes from the next refresh.
    async fn dispatch_status_command(
        &self,
        item_id: OrderItemId,
        target_status: ItemStatus,
    ) -> Result<(), ClaimError> {
        info!(
            item_id = item_id.0,
            ?target_status,
            "command: dispatching item status update"
        );
        match self.api.update_item_status(item_id, target_status).await {
            Ok(()) => {
                self.request_refresh(RefreshReason::Command);
                Ok(())
            }
            Err(err) => {
                let err = classify_command_error(item_id, err);
                if let ClaimError::Rejected { item_id, reason } = &err {
                    warn!(item_id = item_id.0, "command: rejected by server: {reason}");
                    let _ = self.events.send(KitchenEvent::ClaimRejected {
                        item_id: *item_id,
                        reason: reason.clone(),
                    });
                    // Resync ownership so the lock renders with the winner's
                    // name on the next paint.
                    self.request_refresh(RefreshReason::Command);
                }
                Err(err)
            }
        }
    }

    async fn run_refresh_worker(self: Arc<Self>, mut refresh_rx: mpsc::Receiver<RefreshReason>) {
        while let Some(reason) = refresh_rx.recv().await {
            self.refresh_once(reason).await;
        }
    }

    /// One full fetch-and-recompute cycle. Failures never escape: the last
    /// known good state keeps rendering, marked stale, until the next poll
    /// tick recovers.
    async fn refresh_once(&self, reason: RefreshReason) {
        debug!(?reason, "refresh: fetching active orders");
        match self.api.fetch_active_orders().await {
            Ok(orders) => {
                let active: Vec<OrderPayload> = orders
                    .into_iter()
                    .filter(|order| order.status.is_kitchen_active())
                    .collect();
                let snapshot = {
                    let mut state = self.inner.lock().await;
                    state.orders = active;
                    state.stale = false;
                    state.snapshot()
                };
                debug!(
                    orders = snapshot.orders.len(),
                    products = snapshot.rows.len(),
                    "refresh: snapshot recomputed"
                );
                let _ = self.events.send(KitchenEvent::SnapshotUpdated(snapshot));
            }
            Err(err) => {
                warn!("refresh: fetch failed, keeping last known orders: {err:#}");
                let snapshot = {
                    let mut state = self.inner.lock().await;
                    state.stale = true;
                    state.snapshot()
                };
                let _ = self.events.send(KitchenEvent::SnapshotUpdated(snapshot));
            }
        }
    }

    /// Fixed-interval liveness floor, independent of push health. The first
    /// tick fires immediately and doubles as the startup fetch.
    async fn run_poll_ticker(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.request_refresh(RefreshReason::Poll);
        }
    }

    /// Holds the push subscription open, reconnecting with capped backoff.
    /// Every message is only an invalidation signal; payloads are never
    /// applied as state patches. Connection trouble is logged and otherwise
    /// invisible: polling keeps the view live.
    async fn run_push_listener(self: Arc<Self>) {
        let mut delay = PUSH_RECONNECT_INITIAL_DELAY;
        loop {
            match self.push.connect().await {
                Ok(mut messages) => {
                    info!("push: channel connected");
                    delay = PUSH_RECONNECT_INITIAL_DELAY;
                    while let Some(message) = messages.recv().await {
                        self.handle_push_message(message);
                    }
                    warn!("push: channel closed, reconnecting");
                }
                Err(err) => {
                    debug!("push: connect failed: {err:#}");
                }
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(PUSH_RECONNECT_MAX_DELAY);
        }
    }

    fn handle_push_message(&self, message: KitchenPush) {
        match message {
            KitchenPush::OrderPlaced { order_id } => {
                debug!(order_id = order_id.map(|id| id.0), "push: new order announced");
                // One alert per distinct new-order message, never per poll.
                self.notifier.order_placed_alert();
                self.request_refresh(RefreshReason::Push);
            }
            KitchenPush::OrderUpdated { order_id } => {
                debug!(order_id = order_id.map(|id| id.0), "push: order updated");
                self.request_refresh(RefreshReason::Push);
            }
            KitchenPush::Error(api_error) => {
                warn!("push: server error event: {}", api_error.message);
                self.request_refresh(RefreshReason::Push);
            }
        }
    }
}

fn classify_command_error(item_id: OrderItemId, err: anyhow::Error) -> ClaimError {
    match err.downcast_ref::<ApiException>() {
        Some(api) if matches!(api.code, ErrorCode::Conflict | ErrorCode::Forbidden) => {
            ClaimError::Rejected {
                item_id,
                reason: api.message.clone(),
            }
        }
        _ => ClaimError::Transport(err),
    }
}

/// REST client for the order backend. The chef id rides as a query
/// parameter on every call, standing in for the gateway's authenticated
/// context.
pub struct HttpKitchenOrderApi {
    http: Client,
    server_url: String,
    chef_id: ChefId,
}

impl HttpKitchenOrderApi {
    pub fn new(server_url: impl Into<String>, chef_id: ChefId) -> Self {
        Self {
            http: Client::new(),
            server_url: server_url.into(),
            chef_id,
        }
    }
}

#[async_trait]
impl KitchenOrderApi for HttpKitchenOrderApi {
    async fn fetch_active_orders(&self) -> Result<Vec<OrderPayload>> {
        let orders = self
            .http
            .get(format!("{}/kitchen/orders", self.server_url))
            .query(&[("chef_id", self.chef_id.0)])
            .send()
            .await
            .with_context(|| format!("failed to fetch kitchen orders from {}", self.server_url))?
            .error_for_status()?
            .json()
            .await?;
        Ok(orders)
    }

    async fn update_item_status(
        &self,
        item_id: OrderItemId,
        target_status: ItemStatus,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/kitchen/items/status", self.server_url))
            .query(&[("chef_id", self.chef_id.0)])
            .json(&UpdateItemStatusRequest {
                item_id,
                target_status,
            })
            .send()
            .await
            .with_context(|| {
                format!("failed to post item status update to {}", self.server_url)
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        match response.json::<ApiError>().await {
            Ok(api_error) => Err(ApiException::from(api_error).into()),
            Err(_) => Err(anyhow!("item status update failed with http status {status}")),
        }
    }
}

/// WebSocket transport for the push topics.
pub struct WebSocketPushChannel {
    ws_url: String,
}

impl WebSocketPushChannel {
    pub fn new(server_url: &str) -> Result<Self> {
        let mut url =
            Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
        let ws_scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => return Err(anyhow!("server url must be http(s), got {other}://")),
        };
        url.set_scheme(ws_scheme)
            .map_err(|_| anyhow!("failed to derive websocket scheme for {server_url}"))?;
        url.set_path("/kitchen/events");
        Ok(Self {
            ws_url: url.to_string(),
        })
    }
}

#[async_trait]
impl PushChannel for WebSocketPushChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<KitchenPush>> {
        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .with_context(|| format!("failed to connect websocket: {}", self.ws_url))?;
        let (_, mut ws_reader) = ws_stream.split();
        let (tx, rx) = mpsc::channel(PUSH_EVENT_BUFFER);

        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let message = match serde_json::from_str::<KitchenPush>(&text) {
                            Ok(message) => message,
                            Err(err) => {
                                // Receipt alone is the signal, so even an
                                // unreadable frame still invalidates.
                                warn!("push: unreadable frame treated as update: {err}");
                                KitchenPush::OrderUpdated { order_id: None }
                            }
                        };
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("push: websocket receive failed: {err}");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
