//! Procedural macros for the docmap project.
//!
//! `#[derive(Record)]` generates the record description and field (de)construction the
//! document converter needs:
//!
//! ```ignore
//! #[derive(Debug, Clone, Record)]
//! pub struct Person {
//!     #[record(id)]
//!     pub email: String,
//!     #[record(rename = "created")]
//!     pub created_at: chrono::DateTime<chrono::Utc>,
//! }
//! ```

use proc_macro::TokenStream;

mod record;

#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input.into()).into()
}
