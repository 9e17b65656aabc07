//! snaprealm — клиентский движок snapshot-realm'ов для клиента
//! распределённой файловой системы.
//!
//! Снапшоты здесь делаются кооперативно: сервер метаданных (MDS) объявляет
//! состояние снапшотов и изменения топологии, а клиент для каждой исходящей
//! записи сам решает, к какому логическому snapshot-контексту она относится.
//! Снапшот действует не на всю файловую систему, а на поддерево под
//! каталогом — иерархия делится на "realm'ы", файлы которых разделяют один
//! snap-набор. Набор realm'а — это снапшоты, созданные на нём самом, плюс
//! родительские, взятые после того, как родитель стал родителем (rename
//! переносит поддеревья между realm'ами), и аналогично снапшоты прежних
//! родителей за интервалы их родительства.
//!
//! Движок держит иерархию realm'ов с refcount'ами, зеркалящую серверные
//! связи parent/child, строит snap-контекст на realm (прикрепляется к
//! исходящим записям в объектное хранилище) и захватывает per-inode
//! метаданные (cap_snap) при каждом продвижении snap-набора realm'а, чтобы
//! затем сбросить захваты обратно на MDS после завершения writeback.
//!
//! Точки входа: [`SnapEngine::handle_snap`] для входящих snap-сообщений,
//! [`SnapEngine::get_context`] для исходящих записей,
//! [`SnapEngine::flush_snaps`] для отправки накопленных захватов.

// Базовые модули
pub mod config;
pub mod consts;
pub mod metrics;

// Предметные модули
pub mod capsnap;
pub mod context;
pub mod engine;
pub mod inode;
pub mod session;
pub mod wire;

mod realm;

// Удобные реэкспорты
pub use capsnap::{CapSnap, CapSnapFlush, FlushState};
pub use config::EngineConfig;
pub use consts::NO_SNAP;
pub use context::SnapContext;
pub use engine::{CheckReport, RealmInfo, SnapEngine};
pub use inode::{CapInode, InodeCache, InodeState, CAP_BUFFER, CAP_PIN, CAP_RD, CAP_WR};
pub use session::{MdsSession, MdsSessions};
pub use wire::{
    decode_snap_message, encode_snap_message, SnapMessage, SnapOp, TraceRecord,
};
