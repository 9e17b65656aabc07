//! Lightweight global metrics for the snap engine.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Snap-сообщения (всего / отброшено как bad)
//! - Применённые trace'ы и split'ы
//! - Реестр realm'ов (created / dropped)
//! - Построения контекстов
//! - Cap_snaps (queued / pending writer / flushable / отправленные flush'и)
//! - Пропущенные stale-гонки split'ов

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Messages -----
static SNAP_MESSAGES_TOTAL: AtomicU64 = AtomicU64::new(0);
static SNAP_MESSAGES_BAD: AtomicU64 = AtomicU64::new(0);
static SNAP_TRACES_APPLIED: AtomicU64 = AtomicU64::new(0);
static SNAP_SPLITS: AtomicU64 = AtomicU64::new(0);

// ----- Realm registry -----
static REALMS_CREATED: AtomicU64 = AtomicU64::new(0);
static REALMS_DROPPED: AtomicU64 = AtomicU64::new(0);

// ----- Context builder -----
static CONTEXTS_BUILT: AtomicU64 = AtomicU64::new(0);

// ----- Cap snaps -----
static CAPSNAPS_QUEUED: AtomicU64 = AtomicU64::new(0);
static CAPSNAPS_PENDING_WRITER: AtomicU64 = AtomicU64::new(0);
static CAPSNAPS_FLUSHABLE: AtomicU64 = AtomicU64::new(0);
static CAPSNAP_FLUSHES_SENT: AtomicU64 = AtomicU64::new(0);

// ----- Split races -----
static STALE_SPLIT_RACES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub snap_messages_total: u64,
    pub snap_messages_bad: u64,
    pub snap_traces_applied: u64,
    pub snap_splits: u64,

    pub realms_created: u64,
    pub realms_dropped: u64,

    pub contexts_built: u64,

    pub capsnaps_queued: u64,
    pub capsnaps_pending_writer: u64,
    pub capsnaps_flushable: u64,
    pub capsnap_flushes_sent: u64,

    pub stale_split_races: u64,
}

impl MetricsSnapshot {
    /// Число живых realm'ов по счётчикам реестра.
    pub fn realms_live(&self) -> u64 {
        self.realms_created.saturating_sub(self.realms_dropped)
    }
}

// ----- Recorders -----

pub fn record_snap_message() {
    SNAP_MESSAGES_TOTAL.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snap_message_bad() {
    SNAP_MESSAGES_BAD.fetch_add(1, Ordering::Relaxed);
}

pub fn record_trace_applied() {
    SNAP_TRACES_APPLIED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_split() {
    SNAP_SPLITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_realm_created() {
    REALMS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_realm_dropped() {
    REALMS_DROPPED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_context_built() {
    CONTEXTS_BUILT.fetch_add(1, Ordering::Relaxed);
}

pub fn record_capsnap_queued(pending_writer: bool) {
    CAPSNAPS_QUEUED.fetch_add(1, Ordering::Relaxed);
    if pending_writer {
        CAPSNAPS_PENDING_WRITER.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_capsnap_flushable() {
    CAPSNAPS_FLUSHABLE.fetch_add(1, Ordering::Relaxed);
}

pub fn record_capsnap_flush_sent() {
    CAPSNAP_FLUSHES_SENT.fetch_add(1, Ordering::Relaxed);
}

pub fn record_stale_split_race() {
    STALE_SPLIT_RACES.fetch_add(1, Ordering::Relaxed);
}

/// Снимок всех счётчиков (Relaxed-чтения).
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        snap_messages_total: SNAP_MESSAGES_TOTAL.load(Ordering::Relaxed),
        snap_messages_bad: SNAP_MESSAGES_BAD.load(Ordering::Relaxed),
        snap_traces_applied: SNAP_TRACES_APPLIED.load(Ordering::Relaxed),
        snap_splits: SNAP_SPLITS.load(Ordering::Relaxed),
        realms_created: REALMS_CREATED.load(Ordering::Relaxed),
        realms_dropped: REALMS_DROPPED.load(Ordering::Relaxed),
        contexts_built: CONTEXTS_BUILT.load(Ordering::Relaxed),
        capsnaps_queued: CAPSNAPS_QUEUED.load(Ordering::Relaxed),
        capsnaps_pending_writer: CAPSNAPS_PENDING_WRITER.load(Ordering::Relaxed),
        capsnaps_flushable: CAPSNAPS_FLUSHABLE.load(Ordering::Relaxed),
        capsnap_flushes_sent: CAPSNAP_FLUSHES_SENT.load(Ordering::Relaxed),
        stale_split_races: STALE_SPLIT_RACES.load(Ordering::Relaxed),
    }
}
