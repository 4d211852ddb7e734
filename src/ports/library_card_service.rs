use crate::domain::{library_card::LibraryCard, value_objects::CardNumber};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 図書カードサービスポート
///
/// 貸出コンテキストと会員コンテキストの境界を維持する。
/// 図書カードの実体は外部のデータストアが所有する。
#[async_trait]
pub trait LibraryCardService: Send + Sync {
    /// カード番号で図書カードを取得する
    ///
    /// 存在しない場合は`None`を返す。
    async fn get_card(&self, card_number: &CardNumber) -> Result<Option<LibraryCard>>;
}
