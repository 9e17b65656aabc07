//! engine — ядро движка: realm-граф, обработчик протокола, машинерия cap_snap.
//!
//! Подмодули:
//! - trace.rs: применение разобранного snap-trace'а (записи от листа к корню).
//! - handle.rs: точка входа handle_snap, включая split-протокол.
//! - capsnap.rs: queue / finish / complete / ack для cap_snaps.
//! - flush.rs: snap-flush список и flush-драйвер.
//! - doctor.rs: самопроверка инвариантов realm-графа.
//!
//! Блокировки:
//! - `realms` — multi-reader/single-writer lock realm-графа. Write-режим для
//!   членства в реестре, связей, полей realm'ов и кэшированных контекстов;
//!   read-режим для lookup'ов и постановки cap_snaps (топология должна
//!   стоять на месте).
//! - Per-inode мьютекс вкладывается внутрь realm lock'а.
//! - Мьютекс flush-списка — самый внутренний, держится только на O(1)
//!   операциях очереди.

mod capsnap;
mod doctor;
mod flush;
mod handle;
mod trace;

pub use doctor::CheckReport;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};

use crate::config::EngineConfig;
use crate::context::SnapContext;
use crate::inode::{CapInode, InodeCache};
use crate::realm::RealmMap;
use crate::session::MdsSessions;

/// Read-only снимок одного realm'а для вызывающего кода и тестов.
#[derive(Debug, Clone)]
pub struct RealmInfo {
    pub ino: u64,
    pub nref: u64,
    pub seq: u64,
    pub created: u64,
    pub parent_ino: u64,
    pub parent: Option<u64>,
    pub parent_since: u64,
    pub snaps: Vec<u64>,
    pub prior_parent_snaps: Vec<u64>,
    pub children: Vec<u64>,
    pub inodes_with_caps: Vec<u64>,
    pub cached_context: Option<Arc<SnapContext>>,
}

/// Клиентский движок snapshot-realm'ов.
pub struct SnapEngine {
    pub(crate) cfg: EngineConfig,
    pub(crate) realms: RwLock<RealmMap>,
    pub(crate) flush_list: Mutex<VecDeque<u64>>,
    pub(crate) inodes: Arc<dyn InodeCache>,
    pub(crate) sessions: Arc<dyn MdsSessions>,
}

impl SnapEngine {
    pub fn new(
        cfg: EngineConfig,
        inodes: Arc<dyn InodeCache>,
        sessions: Arc<dyn MdsSessions>,
    ) -> Self {
        Self {
            cfg,
            realms: RwLock::new(RealmMap::new()),
            flush_list: Mutex::new(VecDeque::new()),
            inodes,
            sessions,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub(crate) fn realms_write(&self) -> RwLockWriteGuard<'_, RealmMap> {
        self.realms.write().expect("realm lock poisoned")
    }

    pub(crate) fn realms_read(&self) -> RwLockReadGuard<'_, RealmMap> {
        self.realms.read().expect("realm lock poisoned")
    }

    /// Найти или создать realm и взять на него ссылку для вызывающего кода.
    /// Отпускается через [`put_realm`](Self::put_realm).
    pub fn get_realm(&self, ino: u64) -> u64 {
        self.realms_write().get_or_create(ino);
        ino
    }

    /// Отпустить ссылку на realm, взятую через [`get_realm`](Self::get_realm)
    /// (или выданную изнутри [`handle_snap`](Self::handle_snap)).
    pub fn put_realm(&self, ino: u64) {
        self.realms_write().put(ino);
    }

    /// Snap-контекст realm'а; если кэш инвалидирован — сперва перестроить.
    /// Возвращённый контекст прикрепляется к исходящим записям.
    pub fn get_context(&self, realm_ino: u64) -> Result<Arc<SnapContext>> {
        let mut map = self.realms_write();
        if !map.contains(realm_ino) {
            return Err(anyhow!("unknown realm {:#x}", realm_ino));
        }
        map.build_context(realm_ino);
        Ok(map
            .get(realm_ino)
            .and_then(|r| r.cached_context.clone())
            .expect("context just built"))
    }

    /// Привязать инод с открытыми caps к realm'у: членство в списке,
    /// обратный указатель инода и ссылка на realm, которую держит инод.
    /// Повторная привязка к другому realm'у мигрирует инод.
    pub fn attach_inode(&self, inode: &Arc<CapInode>, realm_ino: u64) {
        let mut map = self.realms_write();
        let mut st = inode.lock();
        if st.realm == realm_ino {
            return;
        }
        if st.realm != 0 {
            let old = st.realm;
            if let Some(r) = map.get_mut(old) {
                r.inodes_with_caps.retain(|&i| i != inode.ino);
            }
            map.put(old);
            st.realm = 0;
        }
        // ссылка от get_or_create становится ссылкой инода
        map.get_or_create(realm_ino).inodes_with_caps.push(inode.ino);
        st.realm = realm_ino;
    }

    /// Снять членство инода в realm'е (последний cap отпущен).
    pub fn detach_inode(&self, inode: &Arc<CapInode>) {
        let mut map = self.realms_write();
        let mut st = inode.lock();
        if st.realm == 0 {
            return;
        }
        let old = st.realm;
        if let Some(r) = map.get_mut(old) {
            r.inodes_with_caps.retain(|&i| i != inode.ino);
        }
        map.put(old);
        st.realm = 0;
    }

    /// Read-side снимок realm'а, если он зарегистрирован.
    pub fn realm_info(&self, ino: u64) -> Option<RealmInfo> {
        let map = self.realms_read();
        map.get(ino).map(|r| RealmInfo {
            ino: r.ino,
            nref: r.nref,
            seq: r.seq,
            created: r.created,
            parent_ino: r.parent_ino,
            parent: r.parent,
            parent_since: r.parent_since,
            snaps: r.snaps.clone(),
            prior_parent_snaps: r.prior_parent_snaps.clone(),
            children: r.children.clone(),
            inodes_with_caps: r.inodes_with_caps.clone(),
            cached_context: r.cached_context.clone(),
        })
    }

    /// Число зарегистрированных realm'ов.
    pub fn realm_count(&self) -> usize {
        self.realms_read().len()
    }
}
