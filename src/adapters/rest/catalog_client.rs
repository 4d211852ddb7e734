use crate::domain::{
    Book, LibraryCard,
    value_objects::{BookId, CardNumber, MaxBooksAllowed},
};
use crate::ports::{book_service::BookService, library_card_service::LibraryCardService};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Every catalog response wraps its payload in `{ "data": ... }`
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct LibraryCardDto {
    card_number: String,
    start_date: String,
    expiry_date: String,
    #[serde(default)]
    reader_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
    max_books_allowed: u32,
    #[serde(default)]
    is_locked: bool,
}

#[derive(Debug, Deserialize)]
struct BookDto {
    book_id: Uuid,
    title: String,
    #[serde(default)]
    quantity: Option<i64>,
}

/// Accepts both `2024-01-31` and full timestamps such as `2024-01-31T00:00:00.000Z`
fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("invalid {} '{}': {}", field, value, e).into())
}

impl TryFrom<LibraryCardDto> for LibraryCard {
    type Error = Box<dyn std::error::Error + Send + Sync>;

    fn try_from(dto: LibraryCardDto) -> Result<Self> {
        Ok(LibraryCard {
            card_number: CardNumber::new(dto.card_number)?,
            issue_date: parse_date("start_date", &dto.start_date)?,
            expiry_date: parse_date("expiry_date", &dto.expiry_date)?,
            holder_name: dto.reader_name.unwrap_or_default(),
            address: dto.address.unwrap_or_default(),
            max_books_allowed: MaxBooksAllowed::new(dto.max_books_allowed)?,
            is_locked: dto.is_locked,
        })
    }
}

impl From<BookDto> for Book {
    fn from(dto: BookDto) -> Self {
        // Negative or missing stock is treated as nothing on the shelf
        let available_quantity = dto
            .quantity
            .map(|q| u32::try_from(q.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0);

        Book {
            book_id: BookId::from_uuid(dto.book_id),
            title: dto.title,
            available_quantity,
        }
    }
}

/// HTTP client for the library catalog (cards and books)
///
/// Implements both `LibraryCardService` and `BookService`. A 404 from the
/// catalog means the entity does not exist and maps to `None`.
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let base_url = Url::parse(&base_url.into())?;
        if base_url.cannot_be_a_base() {
            return Err(format!("catalog URL '{}' cannot be a base", base_url).into());
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// Appends path segments to the base URL, percent-encoding each one
    ///
    /// `/`, `?` and `#` inside a segment never change the resource requested.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| "catalog URL cannot be a base")?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_data<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Option<T>> {
        let url = self.endpoint(segments)?;

        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(%url, "Catalog entity not found");
            return Ok(None);
        }

        let envelope: DataEnvelope<T> = response.error_for_status()?.json().await?;
        Ok(Some(envelope.data))
    }
}

#[async_trait]
impl LibraryCardService for CatalogClient {
    async fn get_card(&self, card_number: &CardNumber) -> Result<Option<LibraryCard>> {
        // Dot segments would be dropped from the URL and hit the card list
        if matches!(card_number.as_str(), "." | "..") {
            return Ok(None);
        }

        let dto: Option<LibraryCardDto> = self
            .get_data(&["librarycards", card_number.as_str()])
            .await?;
        dto.map(LibraryCard::try_from).transpose()
    }
}

#[async_trait]
impl BookService for CatalogClient {
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let book_id = book_id.to_string();
        let dto: Option<BookDto> = self.get_data(&["books", book_id.as_str()]).await?;
        Ok(dto.map(Book::from))
    }
}
