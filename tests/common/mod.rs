//! Общие помощники интеграционных тестов:
//! - TestInodes: inode-кэш в памяти.
//! - TestSessions: сессионный слой MDS, записывающий flush-payload'ы (и
//!   умеющий по флагу ронять отправку).
//! - Сборщики сообщений поверх wire-кодера.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use snaprealm::{
    encode_snap_message, CapInode, CapSnapFlush, EngineConfig, InodeCache, MdsSession,
    MdsSessions, SnapEngine, SnapMessage, SnapOp, TraceRecord,
};

pub struct TestInodes {
    inner: Mutex<HashMap<u64, Arc<CapInode>>>,
}

impl TestInodes {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
        })
    }

    pub fn insert(&self, inode: Arc<CapInode>) {
        self.inner.lock().unwrap().insert(inode.ino, inode);
    }

    pub fn remove(&self, ino: u64) {
        self.inner.lock().unwrap().remove(&ino);
    }
}

impl InodeCache for TestInodes {
    fn lookup(&self, ino: u64) -> Option<Arc<CapInode>> {
        self.inner.lock().unwrap().get(&ino).cloned()
    }
}

pub struct TestSessions {
    sessions: HashMap<u32, Arc<MdsSession>>,
    sent: Mutex<Vec<CapSnapFlush>>,
    fail_sends: AtomicBool,
}

impl TestSessions {
    pub fn new(ranks: &[u32]) -> Arc<Self> {
        let sessions = ranks.iter().map(|&m| (m, MdsSession::new(m))).collect();
        Arc::new(Self {
            sessions,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        })
    }

    /// Всё отправленное на текущий момент, в порядке отправки.
    pub fn sent(&self) -> Vec<CapSnapFlush> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }
}

impl MdsSessions for TestSessions {
    fn get(&self, mds: u32) -> Option<Arc<MdsSession>> {
        self.sessions.get(&mds).cloned()
    }

    fn send_flush(&self, _session: &MdsSession, flush: &CapSnapFlush) -> Result<()> {
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(anyhow!("messenger down"));
        }
        self.sent.lock().unwrap().push(flush.clone());
        Ok(())
    }
}

/// Движок на свежих моках, с сессиями для заданных рангов MDS.
pub fn engine_with(ranks: &[u32]) -> (SnapEngine, Arc<TestInodes>, Arc<TestSessions>) {
    let inodes = TestInodes::new();
    let sessions = TestSessions::new(ranks);
    let engine = SnapEngine::new(EngineConfig::default(), inodes.clone(), sessions.clone());
    (engine, inodes, sessions)
}

pub fn rec(
    ino: u64,
    parent: u64,
    seq: u64,
    created: u64,
    parent_since: u64,
    snaps: &[u64],
    prior: &[u64],
) -> TraceRecord {
    TraceRecord {
        ino,
        parent,
        seq,
        created,
        parent_since,
        snaps: snaps.to_vec(),
        prior_parent_snaps: prior.to_vec(),
    }
}

pub fn msg_bytes(
    op: SnapOp,
    split: u64,
    split_inos: &[u64],
    split_realms: &[u64],
    trace: Vec<TraceRecord>,
) -> Vec<u8> {
    encode_snap_message(&SnapMessage {
        op,
        split,
        split_inos: split_inos.to_vec(),
        split_realms: split_realms.to_vec(),
        trace,
    })
    .expect("encode test message")
}

/// Update-сообщение без split-части.
pub fn update_msg(trace: Vec<TraceRecord>) -> Vec<u8> {
    msg_bytes(SnapOp::Update, 0, &[], &[], trace)
}
