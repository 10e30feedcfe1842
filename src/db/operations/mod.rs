pub mod content;
pub mod ranking;
pub mod submission;
pub mod user;
pub mod word_review;

use crate::services::models::UnknownVariant;

pub(crate) fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

pub(crate) fn decode_variant<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = UnknownVariant>,
{
    value.parse::<T>().map_err(decode_err)
}
