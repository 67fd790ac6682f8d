// gateway/src/store.rs
//! Token store: opaque session token -> serialized session record.
//!
//! The dispatch core only ever reads from it. Records are written by the
//! login flow, which lives outside the gateway.
use actix::{Actor, Addr, AsyncContext, Context, Handler, Message, MessageResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

// Default record lifetime in seconds (24 hours)
const DEFAULT_SESSION_TTL: i64 = 86400;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

/// Read side of the token store
#[async_trait(?Send)]
pub trait TokenStore: Send + Sync {
    /// Raw stored value for `token`; `None` when absent or expired
    async fn get(&self, token: &str) -> Result<Option<String>, StoreError>;
}

/// Actor message: Look up the raw record stored for a token
#[derive(Message)]
#[rtype(result = "Option<String>")]
pub struct LookupToken {
    pub token: String,
}

/// Actor message: Store a raw record under a token
#[derive(Message)]
#[rtype(result = "()")]
pub struct PutToken {
    pub token: String,
    pub raw: String,
}

/// Actor message: Drop expired records
#[derive(Message)]
#[rtype(result = "usize")]
pub struct PurgeExpired;

struct StoredRecord {
    raw: String,
    expires_at: DateTime<Utc>,
}

impl StoredRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-process token store with per-record expiry
pub struct TokenStoreActor {
    records: DashMap<String, StoredRecord>,
    ttl: ChronoDuration,
    // Sweep interval in seconds
    sweep_interval: u64,
}

impl Default for TokenStoreActor {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStoreActor {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            ttl: ChronoDuration::seconds(DEFAULT_SESSION_TTL),
            sweep_interval: 3600,
        }
    }

    /// Lifetimes beyond what chrono can represent saturate
    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.ttl = ChronoDuration::try_seconds(ttl_seconds).unwrap_or_else(|| {
            tracing::warn!("Session TTL of {}s is out of range, saturating", ttl_seconds);
            if ttl_seconds < 0 { ChronoDuration::MIN } else { ChronoDuration::MAX }
        });
        self
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.ttl).unwrap_or(if self.ttl < ChronoDuration::zero() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
    }

    pub fn with_sweep_interval(mut self, interval_seconds: u64) -> Self {
        self.sweep_interval = interval_seconds;
        self
    }

    fn purge_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        before - self.records.len()
    }
}

impl Actor for TokenStoreActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("TokenStoreActor started with TTL: {}s", self.ttl.num_seconds());

        ctx.run_interval(Duration::from_secs(self.sweep_interval.max(1)), |act, _ctx| {
            let purged = act.purge_expired();
            if purged > 0 {
                tracing::info!("Purged {} expired session records", purged);
            }
        });
    }
}

impl Handler<LookupToken> for TokenStoreActor {
    type Result = MessageResult<LookupToken>;

    fn handle(&mut self, msg: LookupToken, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.records.get(&msg.token) {
            Some(record) if !record.is_expired(Utc::now()) => Some(record.raw.clone()),
            // Expired records read as absent until the next sweep removes them
            Some(_) => None,
            None => None,
        };

        MessageResult(result)
    }
}

impl Handler<PutToken> for TokenStoreActor {
    type Result = ();

    fn handle(&mut self, msg: PutToken, _ctx: &mut Self::Context) -> Self::Result {
        let record = StoredRecord {
            raw: msg.raw,
            expires_at: self.expiry_from(Utc::now()),
        };
        self.records.insert(msg.token, record);
    }
}

impl Handler<PurgeExpired> for TokenStoreActor {
    type Result = MessageResult<PurgeExpired>;

    fn handle(&mut self, _msg: PurgeExpired, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.purge_expired())
    }
}

/// [`TokenStore`] backed by a running [`TokenStoreActor`]
#[derive(Clone)]
pub struct ActorTokenStore {
    addr: Addr<TokenStoreActor>,
}

impl ActorTokenStore {
    pub fn new(addr: Addr<TokenStoreActor>) -> Self {
        Self { addr }
    }

    pub async fn put(&self, token: impl Into<String>, raw: impl Into<String>) -> Result<(), StoreError> {
        self.addr
            .send(PutToken { token: token.into(), raw: raw.into() })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait(?Send)]
impl TokenStore for ActorTokenStore {
    async fn get(&self, token: &str) -> Result<Option<String>, StoreError> {
        self.addr
            .send(LookupToken { token: token.to_string() })
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}
