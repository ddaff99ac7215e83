//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! 各リクエストには ULID (Universally Unique Lexicographically Sortable Identifier)
//! を割り当てます。生成順でソートできるので、ログ上でも admission 順が追いやすい。
//!
//! `Id<T>` は Phantom type パターンで、`T` は実行時には使わないマーカー型です。
//! 複数の ID 種別を混同できないようにコンパイル時に区別します。

use std::fmt;
use std::marker::PhantomData;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Marker trait for each ID kind.
///
/// Provides the prefix used by `Display` (e.g. "req-").
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Generate a fresh id from the current wall clock plus random bits.
    pub fn generate() -> Self {
        let timestamp_ms = Utc::now().timestamp_millis().max(0) as u64;
        Self::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for a submitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Request {}

impl IdMarker for Request {
    fn prefix() -> &'static str {
        "req-"
    }
}

/// Identifier of one submitted request (one `QueueItem`).
pub type RequestId = Id<Request>;
