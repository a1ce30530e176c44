//! Forward-only walk over a paginated catalog listing.

use std::collections::VecDeque;

use futures_util::Stream;
use tracing::debug;

use crate::catalog::{CatalogApi, ImageFilter, RawImage};
use crate::error::Result;

enum WalkState {
    Start,
    HasPage,
    Done,
}

/// Lazy record sequence over one asset listing. Each continuation token is
/// merged into the next request and stripped afterwards; the walk ends after
/// the first page that carries no token. A fixed `page_size` in the filter
/// caps the walk at exactly one page. Not restartable; transport errors
/// surface verbatim and are not retried here.
pub struct CatalogWalker<'a, C> {
    catalog: &'a C,
    asset: String,
    filter: ImageFilter,
    buffered: VecDeque<RawImage>,
    next_token: Option<String>,
    last_token: Option<String>,
    pages_fetched: u32,
    state: WalkState,
}

impl<'a, C: CatalogApi> CatalogWalker<'a, C> {
    pub fn new(catalog: &'a C, asset: &str, mut filter: ImageFilter) -> Self {
        filter.page_token = None;
        Self {
            catalog,
            asset: asset.to_owned(),
            filter,
            buffered: VecDeque::new(),
            next_token: None,
            last_token: None,
            pages_fetched: 0,
            state: WalkState::Start,
        }
    }

    /// The next record, or `None` once the listing is exhausted.
    pub async fn next_scene(&mut self) -> Result<Option<RawImage>> {
        loop {
            if let Some(image) = self.buffered.pop_front() {
                return Ok(Some(image));
            }
            match self.state {
                WalkState::Done => return Ok(None),
                WalkState::Start => self.fetch_page(None).await?,
                WalkState::HasPage => match self.next_token.take() {
                    Some(token) => self.fetch_page(Some(token)).await?,
                    None => {
                        self.state = WalkState::Done;
                        return Ok(None);
                    }
                },
            }
        }
    }

    async fn fetch_page(&mut self, token: Option<String>) -> Result<()> {
        let mut filter = self.filter.clone();
        filter.page_token = token;
        let page = self.catalog.list_images(&self.asset, &filter).await?;
        self.pages_fetched += 1;
        debug!(
            asset = %self.asset,
            page = self.pages_fetched,
            images = page.images.len(),
            "fetched catalog page"
        );

        if page.next_page_token.is_some() {
            self.last_token = page.next_page_token.clone();
        }
        // An explicit page size means the caller asked for that page only.
        self.next_token = if self.filter.page_size.is_some() {
            None
        } else {
            page.next_page_token
        };
        self.buffered = page.images.into();
        self.state = WalkState::HasPage;
        Ok(())
    }

    /// The most recent continuation token the catalog handed back.
    pub fn last_token(&self) -> Option<&str> {
        self.last_token.as_deref()
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Adapts the walk into a `Stream` of records.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawImage>> + 'a {
        futures_util::stream::try_unfold(self, |mut walker| async move {
            let item = walker.next_scene().await?;
            Ok(item.map(|image| (image, walker)))
        })
    }
}
