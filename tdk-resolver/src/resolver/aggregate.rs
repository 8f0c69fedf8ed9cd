//! Latest chapter number per media
//!
//! Computed from every live chapter container in the cache. Per container,
//! chapters are grouped by (scanlator, language) and the chapter with the
//! highest listing index gives the group's number, floored to an integer.
//! The result is memoized in the cache under a singleton key and dropped
//! whenever a chapter container is written or media buckets are emptied.
//! A computation that overlaps an invalidation is returned but not memoized.

use super::{Container, Resolver};
use crate::cache::{get_typed, set_typed, Bucket, BucketKey, ContentKind, MANGA_NAMESPACE};
use crate::error::{InterceptionStage, ResolveError, ResolveResult};
use crate::hooks::LatestNumbersEvent;
use crate::providers::ChapterDetails;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Bucket holding the memoized aggregate
pub const LATEST_NUMBERS_BUCKET: &str = "aggregate_latest-chapter-numbers";

/// Singleton entry key inside [`LATEST_NUMBERS_BUCKET`]
pub const LATEST_NUMBERS_KEY: &str = "latest-chapter-numbers";

/// Highest chapter a (provider, scanlator, language) group has reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestNumber {
    pub provider: String,
    pub scanlator: String,
    pub language: String,
    pub number: i64,
}

/// Latest number of each (scanlator, language) group in one container
///
/// Chapters whose number does not parse are ignored.
pub fn latest_numbers_for(container: &Container<ChapterDetails>) -> Vec<LatestNumber> {
    let mut groups: BTreeMap<(String, String), (u32, i64)> = BTreeMap::new();

    for chapter in &container.items {
        let Ok(number) = chapter.chapter.trim().parse::<f64>() else {
            continue;
        };
        if !number.is_finite() {
            continue;
        }

        let group = (
            chapter.scanlator.clone().unwrap_or_default(),
            chapter.language.clone().unwrap_or_default(),
        );
        let candidate = (chapter.index, number.floor() as i64);

        groups
            .entry(group)
            .and_modify(|best| {
                if candidate.0 > best.0 {
                    *best = candidate;
                }
            })
            .or_insert(candidate);
    }

    groups
        .into_iter()
        .map(|((scanlator, language), (_, number))| LatestNumber {
            provider: container.provider.clone(),
            scanlator,
            language,
            number,
        })
        .collect()
}

impl Resolver {
    fn latest_numbers_bucket(&self) -> Bucket {
        Bucket::new(LATEST_NUMBERS_BUCKET, self.ttl)
    }

    /// Latest chapter numbers keyed by media ID, memoized until invalidated
    pub async fn latest_chapter_numbers(&self) -> ResolveResult<BTreeMap<i64, Vec<LatestNumber>>> {
        let memo = self.latest_numbers_bucket();

        match get_typed::<BTreeMap<i64, Vec<LatestNumber>>>(
            self.cache.as_ref(),
            &memo,
            LATEST_NUMBERS_KEY,
        )
        .await
        {
            Ok(Some(numbers)) => {
                debug!("Latest chapter numbers served from memo");
                return Ok(numbers);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Latest chapter memo unreadable, recomputing"),
        }

        let generation = *self.memo_generation.lock().await;

        let mut event = LatestNumbersEvent {
            numbers: self.compute_latest_numbers().await,
        };
        self.hooks
            .latest_numbers
            .trigger(&mut event)
            .map_err(|source| ResolveError::Interception {
                stage: InterceptionStage::Aggregate,
                source,
            })?;

        let current = self.memo_generation.lock().await;
        if *current != generation {
            debug!("Chapter containers changed during aggregation, not memoizing");
        } else if let Err(e) =
            set_typed(self.cache.as_ref(), &memo, LATEST_NUMBERS_KEY, &event.numbers).await
        {
            warn!(error = %e, "Failed to memoize latest chapter numbers");
        }
        drop(current);

        Ok(event.numbers)
    }

    async fn compute_latest_numbers(&self) -> BTreeMap<i64, Vec<LatestNumber>> {
        let mut numbers: BTreeMap<i64, Vec<LatestNumber>> = BTreeMap::new();

        let prefix = format!("{}_", MANGA_NAMESPACE);
        let names = match self.cache.bucket_names(&prefix).await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Could not list chapter buckets");
                return numbers;
            }
        };

        let keys = names
            .iter()
            .filter_map(|name| BucketKey::parse(name))
            .filter(|key| key.kind == ContentKind::Chapters);

        for key in keys {
            let bucket = Bucket::for_key(&key, self.ttl);
            match get_typed::<Container<ChapterDetails>>(
                self.cache.as_ref(),
                &bucket,
                &key.entry_key(),
            )
            .await
            {
                Ok(Some(container)) => numbers
                    .entry(key.media_id)
                    .or_default()
                    .extend(latest_numbers_for(&container)),
                Ok(None) => {}
                Err(e) => warn!(bucket = %key, error = %e, "Skipping unreadable chapter bucket"),
            }
        }

        numbers
    }

    pub(crate) async fn invalidate_latest_numbers(&self) {
        let mut generation = self.memo_generation.lock().await;
        *generation = generation.wrapping_add(1);

        if let Err(e) = self
            .cache
            .invalidate_by(&|name: &str| name == LATEST_NUMBERS_BUCKET)
            .await
        {
            warn!(error = %e, "Failed to drop latest chapter memo");
        }
    }
}
