//! Взгляд движка на инод с открытыми capabilities.
//!
//! Что здесь:
//! - Биты capabilities (маски issued/used). Сам движок проверяет только
//!   CAP_WR, решая, должен ли поставленный в очередь cap_snap ждать writer'а.
//! - CapInode / InodeState: per-inode состояние, которое движок читает и
//!   мутирует. `Mutex` вокруг InodeState — это и есть per-inode lock;
//!   берётся всегда внутри rwlock'а realm-графа.
//! - InodeCache: шов к inode-кэшу клиента. Движок ищет иноды по id
//!   (head-версия, не снапшотный вид) и терпит нерезидентные иноды.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::capsnap::CapSnap;

// Биты capabilities
pub const CAP_PIN: u32 = 1;
pub const CAP_RD: u32 = 2;
pub const CAP_WR: u32 = 4;
pub const CAP_BUFFER: u32 = 8;

/// Мутабельное per-inode состояние под inode lock'ом.
#[derive(Debug, Default)]
pub struct InodeState {
    /// Id владеющего realm'а; 0, пока инод не привязан к realm'у.
    pub realm: u64,

    // Живые метаданные; замораживаются в cap_snap при финализации.
    pub size: u64,
    pub mtime: u64,
    pub atime: u64,
    pub ctime: u64,
    pub time_warp_seq: u32,

    /// Биты capabilities, активно используемые прямо сейчас.
    pub caps_used: u32,
    /// Биты capabilities, выданные MDS.
    pub caps_issued: u32,

    /// Счётчик грязных страниц живого ("head") инода. Переносится на
    /// cap_snap при постановке в очередь.
    pub wrbuffer_ref_head: u64,

    /// Очередь snapshot-захватов, старые впереди.
    pub cap_snaps: Vec<CapSnap>,
}

impl InodeState {
    /// true, если последний cap_snap всё ещё ждёт writer'а. Пока захват
    /// pending, новые записи стартовать не могут, так что в этом состоянии
    /// может быть только последний элемент.
    #[inline]
    pub fn have_pending_cap_snap(&self) -> bool {
        self.cap_snaps.last().map(|c| c.writing).unwrap_or(false)
    }
}

/// Инод с открытыми capabilities, каким его видит движок.
#[derive(Debug)]
pub struct CapInode {
    pub ino: u64,
    /// MDS, авторитетный для этого инода; выбирает сессию для flush'а.
    pub auth_mds: u32,
    state: Mutex<InodeState>,
}

impl CapInode {
    pub fn new(ino: u64, auth_mds: u32) -> Arc<Self> {
        Arc::new(Self {
            ino,
            auth_mds,
            state: Mutex::new(InodeState::default()),
        })
    }

    /// Взять per-inode lock.
    pub fn lock(&self) -> MutexGuard<'_, InodeState> {
        self.state.lock().expect("inode lock poisoned")
    }
}

/// Inode-кэш клиента с точки зрения движка.
pub trait InodeCache: Send + Sync {
    /// Найти резидентный инод по id. `None`, если его нет в кэше.
    fn lookup(&self, ino: u64) -> Option<Arc<CapInode>>;
}
