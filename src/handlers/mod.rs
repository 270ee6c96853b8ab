//! Command Handlers module
//!
//! The data-access layer: each handler turns domain operations into
//! document store calls. Every call is attempted once; failures propagate.

mod account_handler;
mod commands;
mod engagement_handler;
mod event_handler;
mod status_handler;


pub use account_handler::AccountHandler;
pub use commands::*;
pub use engagement_handler::EngagementHandler;
pub use event_handler::EventHandler;
pub use status_handler::StatusHandler;

use crate::store::{Collection, Document, DocumentStore, Filter, Query, StoreError};

/// Number of documents matching every filter
pub(crate) async fn count(
    store: &dyn DocumentStore,
    collection: Collection,
    filters: Vec<Filter>,
) -> Result<u64, StoreError> {
    let list = store
        .list(collection, &Query::new().filters(filters).count_only())
        .await?;
    Ok(list.total)
}

/// Delete every document matching the filters, returning how many went
pub(crate) async fn delete_matching(
    store: &dyn DocumentStore,
    collection: Collection,
    filters: Vec<Filter>,
) -> Result<usize, StoreError> {
    let list = store.list(collection, &Query::new().filters(filters)).await?;
    for document in &list.documents {
        store.delete(collection, &document.id).await?;
    }
    Ok(list.documents.len())
}

/// Oldest document matching every filter
pub(crate) async fn find_first(
    store: &dyn DocumentStore,
    collection: Collection,
    filters: Vec<Filter>,
) -> Result<Option<Document>, StoreError> {
    let list = store
        .list(
            collection,
            &Query::new()
                .filters(filters)
                .order(crate::store::Order::CreatedAsc)
                .limit(1),
        )
        .await?;
    Ok(list.documents.into_iter().next())
}
