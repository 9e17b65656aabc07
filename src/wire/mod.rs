//! Wire-типы snap-сообщений MDS.
//!
//! Что здесь:
//! - SnapOp: опкод сообщения (update/create/destroy/split).
//! - TraceRecord: одна per-realm запись snap-trace'а (от глубины к корню).
//! - SnapMessage: полностью разобранное snap-сообщение.
//!
//! Константы формата (размеры, смещения, значения опкодов) — в
//! `crate::consts`; декодер — в `decode.rs`, кодер — в `encode.rs`.

mod decode;
mod encode;

pub use decode::decode_snap_message;
pub use encode::{encode_snap_message, encode_trace_record};

use crate::consts::{SNAP_OP_CREATE, SNAP_OP_DESTROY, SNAP_OP_SPLIT, SNAP_OP_UPDATE};

/// Опкод snap-сообщения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapOp {
    Update,
    Create,
    Destroy,
    Split,
}

impl SnapOp {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            SNAP_OP_UPDATE => Some(SnapOp::Update),
            SNAP_OP_CREATE => Some(SnapOp::Create),
            SNAP_OP_DESTROY => Some(SnapOp::Destroy),
            SNAP_OP_SPLIT => Some(SnapOp::Split),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            SnapOp::Update => SNAP_OP_UPDATE,
            SnapOp::Create => SNAP_OP_CREATE,
            SnapOp::Destroy => SNAP_OP_DESTROY,
            SnapOp::Split => SNAP_OP_SPLIT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SnapOp::Update => "update",
            SnapOp::Create => "create",
            SnapOp::Destroy => "destroy",
            SnapOp::Split => "split",
        }
    }
}

/// Одна realm-запись snap-trace'а.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub ino: u64,
    /// Id родительского realm'а; 0 у корня.
    pub parent: u64,
    pub seq: u64,
    pub created: u64,
    pub parent_since: u64,
    /// Снапшоты, созданные прямо на этом realm'е.
    pub snaps: Vec<u64>,
    /// Снапшоты, унаследованные от прежних родителей.
    pub prior_parent_snaps: Vec<u64>,
}

/// Разобранное snap-сообщение: поля заголовка, split-списки и trace
/// (самый глубокий realm первым, корень последним).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapMessage {
    pub op: SnapOp,
    /// Realm, который отщепляется; имеет смысл только для `SnapOp::Split`.
    pub split: u64,
    pub split_inos: Vec<u64>,
    pub split_realms: Vec<u64>,
    pub trace: Vec<TraceRecord>,
}
