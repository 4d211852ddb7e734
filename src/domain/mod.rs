pub mod book;
pub mod borrowing;
pub mod commands;
pub mod errors;
pub mod events;
pub mod library_card;
pub mod quota;
pub mod value_objects;

pub use book::Book;
pub use errors::*;
pub use events::*;
pub use library_card::LibraryCard;
pub use quota::{BookSelection, evaluate_selection, merge_selections};
pub use value_objects::*;
