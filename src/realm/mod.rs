//! Реестр и граф realm'ов.
//!
//! Что здесь:
//! - Realm: один узел иерархии (snap-списки, seq, связи parent/child,
//!   иноды с caps, кэшированный snap-контекст).
//! - RealmMap: реестр по ино-ключу, владеющий всеми realm'ами, с явными
//!   refcount'ами. Сам реестр ссылок не держит; realm удаляется в момент
//!   отпускания последней ссылки.
//!
//! Правила ссылок:
//! - get_or_create/hold берут ссылку, put отпускает.
//! - Ребёнок держит одну ссылку на родителя (ставится в adjust_parent,
//!   отпускается в put при смерти ребёнка или смене родителя).
//! - Каждый инод с caps держит одну ссылку на свой realm.
//! - Рёбра — это id realm'ов, не указатели; списки детей и инодов —
//!   невладеющие обратные ссылки.
//!
//! Все методы требуют rwlock realm-графа в write-режиме; сам lock живёт в
//! SnapEngine, который владеет map'ой.

mod build;

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::context::SnapContext;
use crate::metrics::{record_realm_created, record_realm_dropped};

/// Один snapshot-realm: поддерево неймспейса, разделяющее snap-набор.
#[derive(Debug, Default)]
pub(crate) struct Realm {
    pub ino: u64,
    /// Сильные ссылки; реестр не добавляет ни одной.
    pub nref: u64,

    /// Логическая версия, назначенная сервером; не убывает.
    pub seq: u64,
    /// Момент создания, назначенный сервером.
    pub created: u64,

    /// Id родителя из последнего анонса; 0 у корня.
    pub parent_ino: u64,
    /// Установленная связь с родителем (на него держится ссылка); None у корня.
    pub parent: Option<u64>,
    /// Момент, с которого текущий родитель стал родителем; более старые
    /// родительские снапшоты не наследуются.
    pub parent_since: u64,

    /// Снапшоты, созданные на самом realm'е, по убыванию.
    pub snaps: Vec<u64>,
    /// Снапшоты от прежних родителей, по убыванию.
    pub prior_parent_snaps: Vec<u64>,

    /// Id дочерних realm'ов (обратные ссылки, невладеющие).
    pub children: Vec<u64>,
    /// Иноды с открытыми caps в этом realm'е (обратные ссылки, невладеющие).
    pub inodes_with_caps: Vec<u64>,

    /// Последний построенный snap-контекст; None после инвалидации до
    /// перестройки.
    pub cached_context: Option<Arc<SnapContext>>,
}

impl Realm {
    fn new(ino: u64) -> Self {
        Self {
            ino,
            ..Default::default()
        }
    }
}

/// Реестр realm'ов по ино-ключу.
#[derive(Debug, Default)]
pub(crate) struct RealmMap {
    realms: HashMap<u64, Realm>,
}

impl RealmMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn get(&self, ino: u64) -> Option<&Realm> {
        self.realms.get(&ino)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, ino: u64) -> Option<&mut Realm> {
        self.realms.get_mut(&ino)
    }

    #[inline]
    pub(crate) fn contains(&self, ino: u64) -> bool {
        self.realms.contains_key(&ino)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.realms.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&u64, &Realm)> {
        self.realms.iter()
    }

    /// Найти или создать realm с корнем `ino` и взять ссылку.
    pub(crate) fn get_or_create(&mut self, ino: u64) -> &mut Realm {
        let realm = self.realms.entry(ino).or_insert_with(|| {
            record_realm_created();
            debug!("get_realm created {:#x}", ino);
            Realm::new(ino)
        });
        realm.nref += 1;
        debug!("get_realm {:#x} {} -> {}", ino, realm.nref - 1, realm.nref);
        realm
    }

    /// Взять дополнительную ссылку на существующий realm.
    pub(crate) fn hold(&mut self, ino: u64) {
        if let Some(realm) = self.realms.get_mut(&ino) {
            realm.nref += 1;
            debug!("hold_realm {:#x} {} -> {}", ino, realm.nref - 1, realm.nref);
        } else {
            debug_assert!(false, "hold on unknown realm {ino:#x}");
        }
    }

    /// Отпустить одну ссылку; на последней — отцепить от родителя,
    /// отпустить ссылку на родителя и удалить запись реестра. Отпускание
    /// идёт вверх по цепочке родителей итеративно.
    pub(crate) fn put(&mut self, ino: u64) {
        let mut cur = ino;
        loop {
            let Some(realm) = self.realms.get_mut(&cur) else {
                debug_assert!(false, "put on unknown realm {cur:#x}");
                return;
            };
            debug!("put_realm {:#x} {} -> {}", cur, realm.nref, realm.nref - 1);
            realm.nref = realm.nref.saturating_sub(1);
            if realm.nref > 0 {
                return;
            }
            let dead = self.realms.remove(&cur).expect("realm present");
            record_realm_dropped();
            debug!("drop_realm {:#x}", cur);
            match dead.parent {
                Some(p) => {
                    if let Some(parent) = self.realms.get_mut(&p) {
                        parent.children.retain(|&c| c != cur);
                    }
                    // отпускаем ссылку, которую умерший ребёнок держал на родителя
                    cur = p;
                }
                None => return,
            }
        }
    }

    /// Сменить родителя `ino` на `new_parent` (0 = без родителя), поправив
    /// списки детей и ссылки. Возвращает true, если родитель изменился.
    pub(crate) fn adjust_parent(&mut self, ino: u64, new_parent: u64) -> bool {
        let Some(realm) = self.realms.get(&ino) else {
            debug_assert!(false, "adjust_parent on unknown realm {ino:#x}");
            return false;
        };
        if realm.parent_ino == new_parent {
            return false;
        }
        let old_parent = realm.parent;
        debug!(
            "adjust_parent {:#x}: {:#x} -> {:#x}",
            ino, realm.parent_ino, new_parent
        );

        if new_parent != 0 {
            // сначала берём ссылку child-link на нового родителя
            self.get_or_create(new_parent).children.push(ino);
        }
        if let Some(old) = old_parent {
            if let Some(parent) = self.realms.get_mut(&old) {
                parent.children.retain(|&c| c != ino);
            }
        }
        let realm = self.realms.get_mut(&ino).expect("realm present");
        realm.parent_ino = new_parent;
        realm.parent = if new_parent != 0 { Some(new_parent) } else { None };
        if let Some(old) = old_parent {
            self.put(old);
        }
        true
    }
}
