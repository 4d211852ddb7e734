pub mod borrowing_read_model;
pub mod event_store;
pub mod statistics;

// パブリックに型を再エクスポート
pub use borrowing_read_model::BorrowingReadModel as PostgresBorrowingReadModel;
pub use event_store::EventStore as PostgresEventStore;
pub use statistics::StatisticsSource as PostgresStatisticsSource;
