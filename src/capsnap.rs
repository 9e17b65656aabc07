//! Cap snaps — per-inode, per-snapshot захваты метаданных.
//!
//! Когда к realm'у применяется снапшот, size/mtime-метаданные каждого инода
//! с caps в этом realm'е захватываются в CapSnap, пока writeback не
//! завершится и захват не уйдёт обратно на MDS. Захват, взятый во время
//! незавершённой записи, остаётся "pending" (`writing`), пока запись не
//! осядет и финальные size/mtime не станут известны.

use std::sync::Arc;

use crate::context::SnapContext;

/// Один snapshot-захват в очереди инода.
#[derive(Debug, Clone)]
pub struct CapSnap {
    /// Контекст, под которым взят захват (контекст realm'а до продвижения
    /// seq).
    pub context: Arc<SnapContext>,
    /// Снапшот, за которым следует захват: `context.seq - 1`.
    pub follows: u64,
    /// Выданные биты capabilities на момент захвата.
    pub issued: u32,
    /// Грязные страницы, перенесённые с живого инода; должны стечь в ноль,
    /// прежде чем захват можно отправлять.
    pub dirty: u64,
    /// Флаг pending-writer'а: в момент постановки шла запись; финальные
    /// метаданные неизвестны до её завершения.
    pub writing: bool,

    // Замороженные метаданные; валидны после снятия `writing` и
    // финализации захвата.
    pub size: u64,
    pub mtime: u64,
    pub atime: u64,
    pub ctime: u64,
    pub time_warp_seq: u32,

    /// Отправлен на MDS, ждёт ack.
    pub flushed: bool,
}

/// Исход финализации cap_snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Финализирован и поставлен в snap-flush список.
    Flushable,
    /// Финализирован, но ещё держит грязные страницы; уйдёт после writeback.
    NotYetFlushable,
}

/// Flush-payload, передаваемый сессионному слою MDS для одного cap_snap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapSnapFlush {
    pub ino: u64,
    pub follows: u64,
    /// Seq контекста, под которым взят захват.
    pub seq: u64,
    pub size: u64,
    pub mtime: u64,
    pub atime: u64,
    pub ctime: u64,
    pub time_warp_seq: u32,
    pub issued: u32,
}
