//! Общие константы wire-формата (заголовок snap-сообщения, trace-записи, опкоды).

/// Snap id для "head"-обращений к инодам (вне снапшота).
pub const NO_SNAP: u64 = u64::MAX;

// -------- Заголовок snap-сообщения --------
//
// Layout (little-endian):
// [op u32]
// [split u64]            -- не ноль, если выполняется split существующего realm
// [num_split_inos u32]
// [num_split_realms u32]
// [trace_len u32]        -- длина trace в байтах
//
// Total header size = 4 + 8 + 4 + 4 + 4 = 24 bytes.
pub const SNAP_HDR_SIZE: usize = 24;

// Offsets inside the message header
pub const SNAP_HDR_OFF_OP: usize = 0;
pub const SNAP_HDR_OFF_SPLIT: usize = 4;
pub const SNAP_HDR_OFF_NUM_SPLIT_INOS: usize = 12;
pub const SNAP_HDR_OFF_NUM_SPLIT_REALMS: usize = 16;
pub const SNAP_HDR_OFF_TRACE_LEN: usize = 20;

// Опкоды snap-сообщений
pub const SNAP_OP_UPDATE: u32 = 0;
pub const SNAP_OP_CREATE: u32 = 1;
pub const SNAP_OP_DESTROY: u32 = 2;
pub const SNAP_OP_SPLIT: u32 = 3;

// -------- Trace-запись --------
//
// Одна запись на realm, от самого глубокого к корню; корень завершает trace
// на границе trace_len.
//
// Layout (little-endian):
// [ino u64]
// [parent u64]           -- 0 у корня
// [seq u64]
// [created u64]
// [parent_since u64]
// [num_snaps u32]
// [num_prior_parent_snaps u32]
// далее num_snaps x u64, затем num_prior_parent_snaps x u64.
//
// Fixed header size = 5*8 + 2*4 = 48 bytes.
pub const TRACE_REC_HDR_SIZE: usize = 48;

// Offsets inside the record header
pub const TRACE_REC_OFF_INO: usize = 0;
pub const TRACE_REC_OFF_PARENT: usize = 8;
pub const TRACE_REC_OFF_SEQ: usize = 16;
pub const TRACE_REC_OFF_CREATED: usize = 24;
pub const TRACE_REC_OFF_PARENT_SINCE: usize = 32;
pub const TRACE_REC_OFF_NUM_SNAPS: usize = 40;
pub const TRACE_REC_OFF_NUM_PRIOR: usize = 44;
