//! engine/handle — точка входа для входящих snap-сообщений.
//!
//! Простая форма — create/update/destroy на существующем realm'е:
//! разобрать, применить trace, перестроить. Сложная форма — split: часть
//! существующего realm'а становится новым дочерним realm'ом с миграцией
//! перечисленных инодов и дочерних realm'ов.
//!
//! Контракт split'а (весь смысл — в порядке шагов):
//! 1. Захваты мигрирующих инодов ставятся под ТЕКУЩИМ контекстом старого
//!    realm'а, причём инод уже отцеплен от списка старого realm'а, чтобы
//!    trace ниже не захватил его второй раз.
//! 2. Применяется trace (параметры нового realm'а, иерархия, перестройка).
//! 3. Только после этого отцепленные иноды входят в новый realm.

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use super::SnapEngine;
use crate::metrics::{record_snap_message, record_snap_message_bad, record_split};
use crate::realm::RealmMap;
use crate::wire::{decode_snap_message, SnapMessage, SnapOp};

impl SnapEngine {
    /// Обработать одно snap-сообщение от `mds`. Битые сообщения и сообщения
    /// от неизвестной сессии отбрасываются (лог, состояние не тронуто).
    pub fn handle_snap(&self, mds: u32, data: &[u8]) -> Result<()> {
        record_snap_message();

        let Some(session) = self.sessions.get(mds) else {
            record_snap_message_bad();
            warn!("dropping snap message: no session for mds{}", mds);
            return Err(anyhow!("no session for mds{}", mds));
        };

        let msg = match decode_snap_message(data, &self.cfg) {
            Ok(m) => m,
            Err(e) => {
                record_snap_message_bad();
                warn!("dropping corrupt snap message from mds{}: {:#}", mds, e);
                return Err(e);
            }
        };
        session.bump_seq();
        debug!(
            "handle_snap from mds{} op {} split {:#x} trace {} realm(s)",
            mds,
            msg.op.name(),
            msg.split,
            msg.trace.len()
        );

        {
            let mut map = self.realms_write();
            if msg.op == SnapOp::Split {
                self.apply_split(&mut map, &msg);
            } else {
                let first =
                    self.update_snap_trace(&mut map, &msg.trace, msg.op == SnapOp::Destroy);
                map.put(first);
            }
        }

        self.flush_snaps();
        Ok(())
    }

    /// Вызывающий код держит realm lock в write-режиме.
    fn apply_split(&self, map: &mut RealmMap, msg: &SnapMessage) {
        record_split();
        let split_ino = msg.split;
        map.get_or_create(split_ino);
        info!(
            "splitting realm {:#x}: {} inode(s), {} child realm(s)",
            split_ino,
            msg.split_inos.len(),
            msg.split_realms.len()
        );

        // Подглядываем момент создания нового realm'а; сам realm обновит
        // только trace ниже.
        let new_created = msg.trace[0].created;

        let mut moved = Vec::new();
        for &ino in &msg.split_inos {
            let Some(inode) = self.inodes.lookup(ino) else {
                continue;
            };
            let st = inode.lock();
            let old = st.realm;
            if old == 0 {
                continue;
            }
            let old_created = map.get(old).map(|r| r.created).unwrap_or(0);
            if old_created > new_created {
                // Split другого MDS уже поместил инод в более новый realm;
                // оставляем его там.
                crate::metrics::record_stale_split_race();
                debug!(
                    "leaving inode {:#x} in newer realm {:#x} (created {} > {})",
                    ino, old, old_created, new_created
                );
                continue;
            }
            debug!("will move inode {:#x} to split realm {:#x}", ino, split_ino);
            // Отцепляем от списка старого realm'а, но к новому пока не
            // цепляем: захват должен случиться сейчас, под старым
            // контекстом, и не должен повториться из trace'а.
            if let Some(r) = map.get_mut(old) {
                r.inodes_with_caps.retain(|&i| i != ino);
            }
            let old_ctx = map.get(old).and_then(|r| r.cached_context.clone());
            drop(st);
            if let Some(ctx) = old_ctx {
                self.queue_cap_snap_locked(&inode, &ctx);
            }
            moved.push(inode);
        }

        // возможно, мы забрали часть детей старого realm'а
        for &child in &msg.split_realms {
            map.get_or_create(child);
            map.adjust_parent(child, split_ino);
            map.put(child);
        }

        // не deletion: split только добавляет snap-состояние
        let first = self.update_snap_trace(map, &msg.trace, false);

        // вот теперь вводим иноды в новый realm
        for inode in moved {
            let mut st = inode.lock();
            let old = st.realm;
            if old != 0 {
                map.put(old);
            }
            if let Some(r) = map.get_mut(first) {
                r.inodes_with_caps.push(inode.ino);
            }
            map.hold(first);
            st.realm = first;
        }

        map.put(split_ino);
        map.put(first);
    }
}
