pub mod book_service;
pub mod library_card_service;

pub use book_service::BookService;
pub use library_card_service::LibraryCardService;
