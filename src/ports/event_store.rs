use crate::domain::{events::DomainEvent, value_objects::BorrowingId};
use async_trait::async_trait;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 楽観的排他制御の競合
///
/// 追記時の期待バージョンが集約の現在のバージョンと一致しなかった。
/// 競合した追記は何も書き込まない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Version conflict on borrowing {aggregate_id}: expected version {expected_version}")]
pub struct VersionConflict {
    pub aggregate_id: BorrowingId,
    pub expected_version: usize,
}

/// イベントストアポート
///
/// ドメインイベントの永続化と取得を抽象化する。
/// イベントは追記専用ログに保存される不変の事実。
///
/// 貸出記録の永続化契約との対応：
/// - 新規保存：バージョン0にBorrowingCreatedを追記
/// - 明細返却：LineItemReturnedを追記
/// - 返却完了：BorrowingClosedを追記（最後の明細返却と同じ追記で保存する）
/// - 読み込み：loadしたイベント列をreplay_eventsで復元
#[async_trait]
pub trait EventStore: Send + Sync {
    /// 集約のイベントを追加する
    ///
    /// 1回の呼び出しで渡されたイベントはすべて保存されるか、1件も保存されない。
    /// `expected_version`は読み込み時点のイベント数。一致しない場合は
    /// `VersionConflict`を返す。
    async fn append(
        &self,
        aggregate_id: BorrowingId,
        expected_version: usize,
        events: Vec<DomainEvent>,
    ) -> Result<()>;

    /// 集約のすべてのイベントを読み込む
    ///
    /// 追加された順序でイベントを返す。
    /// replay_events による集約状態の復元に使用される。
    async fn load(&self, aggregate_id: BorrowingId) -> Result<Vec<DomainEvent>>;
}
