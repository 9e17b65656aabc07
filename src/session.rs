//! Шов к сессионному слою MDS.
//!
//! Сессионный слой (управление соединениями, его собственная дисциплина
//! мьютексов) — внешний коллаборатор; движку нужно лишь найти сессию по
//! рангу MDS, увеличить её seq сообщений и передать ей flush-payload'ы.
//! Мьютекс сессии берётся на время per-inode flush-батча.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::capsnap::CapSnapFlush;

/// Хэндл одной сессии MDS.
#[derive(Debug)]
pub struct MdsSession {
    pub mds: u32,
    seq: AtomicU64,
    mutex: Mutex<()>,
}

impl MdsSession {
    pub fn new(mds: u32) -> Arc<Self> {
        Arc::new(Self {
            mds,
            seq: AtomicU64::new(0),
            mutex: Mutex::new(()),
        })
    }

    /// Учесть входящее сообщение на этой сессии.
    pub fn bump_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    /// Взять мьютекс сессии на время flush-батча.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().expect("session mutex poisoned")
    }
}

/// Сессионный слой MDS с точки зрения движка.
pub trait MdsSessions: Send + Sync {
    /// Сессия для ранга MDS; `None`, если открытой сессии нет.
    fn get(&self, mds: u32) -> Option<Arc<MdsSession>>;

    /// Отправить один cap_snap flush по сессии. Вызывается с удержанным
    /// мьютексом сессии; может блокироваться на исходящем messenger'е.
    fn send_flush(&self, session: &MdsSession, flush: &CapSnapFlush) -> Result<()>;
}
