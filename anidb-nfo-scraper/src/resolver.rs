//! Fills missing cross-reference ids by searching secondary catalogs.
//!
//! For each catalog whose field is still unset, the resolver walks a lazy
//! [`SearchPlan`] of title queries one at a time. Each query's hits are
//! filtered by category and year, then matched case-folded against the
//! query. The first exact match ends the search; otherwise the closest
//! fuzzy match seen across the whole plan is accepted.

use anidb_nfo_core::{
    AnimeIds, CrossRef, LANG_NATIVE, LANG_ROMANIZED, Script, TitleType, TitleVariant,
};
use anidb_nfo_mapping::fuzzy::year_eligible;
use anidb_nfo_mapping::{CaseMode, IdentityMap, Match, MatchPolicy};

use crate::catalog::{Candidate, SearchQuery, SecondaryCatalog};
use crate::error::ScrapeError;

/// The ordered title queries tried for one anime.
///
/// The official native-script title comes first, then the main romanized
/// title. Each contributes its full text and, when it ends in `(YYYY)`, a
/// year-stripped form carrying the year.
pub struct SearchPlan<'a> {
    variants: Vec<&'a TitleVariant>,
    next_variant: usize,
    pending: Option<SearchQuery>,
}

impl<'a> SearchPlan<'a> {
    pub fn new(titles: &'a [TitleVariant]) -> Self {
        let variants = [
            (TitleType::Official, LANG_NATIVE),
            (TitleType::Main, LANG_ROMANIZED),
        ]
        .into_iter()
        .filter_map(|(kind, lang)| titles.iter().find(|t| t.is(kind, lang)))
        .collect();
        Self {
            variants,
            next_variant: 0,
            pending: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

impl Iterator for SearchPlan<'_> {
    type Item = SearchQuery;

    fn next(&mut self) -> Option<SearchQuery> {
        if let Some(query) = self.pending.take() {
            return Some(query);
        }
        let variant = *self.variants.get(self.next_variant)?;
        self.next_variant += 1;

        let script = Script::from_language(&variant.language);
        if let Some(year) = variant.year {
            self.pending = Some(SearchQuery {
                title: variant.base_title().to_string(),
                year: Some(year),
                script,
            });
        }
        Some(SearchQuery {
            title: variant.title.clone(),
            year: None,
            script,
        })
    }
}

/// Pick the best candidate for one query.
///
/// Candidates outside the catalog's category or (for year-qualified
/// queries) from another year are never considered, not even for an
/// exact match.
pub fn best_candidate(
    policy: &MatchPolicy,
    query: &SearchQuery,
    candidates: &[Candidate],
) -> Option<Match<u32>> {
    let matcher = policy.matcher(CaseMode::Folded, query.is_year_qualified(), query.script);
    let pool = candidates
        .iter()
        .filter(|c| c.in_category && year_eligible(query.year, c.year))
        .flat_map(|c| c.titles.iter().map(move |t| (c.id, t.as_str())));
    matcher.best_match(&query.title, pool)
}

/// Drives secondary-catalog searches and records confirmed links.
pub struct CrossReferenceResolver {
    catalogs: Vec<Box<dyn SecondaryCatalog>>,
}

impl CrossReferenceResolver {
    pub fn new(catalogs: Vec<Box<dyn SecondaryCatalog>>) -> Self {
        Self { catalogs }
    }

    /// Whether any catalog is configured. An empty resolver is a pass-through.
    pub fn is_enabled(&self) -> bool {
        !self.catalogs.is_empty()
    }

    pub fn catalog_names(&self) -> Vec<&str> {
        self.catalogs.iter().map(|c| c.name()).collect()
    }

    /// Fill every unset cross-reference of `aid` that a configured catalog covers.
    ///
    /// Returns the identity as it stands afterwards. Only access or client
    /// configuration faults are returned as errors; anything else a catalog
    /// reports is logged and treated as "no match".
    pub async fn resolve(
        &self,
        map: &mut IdentityMap,
        aid: u32,
    ) -> Result<Option<AnimeIds>, ScrapeError> {
        if map.from_id(aid).is_none() {
            return Ok(None);
        }

        for catalog in &self.catalogs {
            let field = catalog.field();
            if map.from_id(aid).and_then(|ids| ids.get(field)).is_some() {
                continue;
            }

            let found = match self.search(catalog.as_ref(), map, aid).await {
                Ok(found) => found,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("{} search for anidb {aid} failed: {e}", catalog.name());
                    None
                }
            };

            match found {
                Some(id) => {
                    map.link(aid, CrossRef::new(field, id))?;
                }
                None => log::debug!("No {} match for anidb {aid}", catalog.name()),
            }
        }

        Ok(map.from_id(aid).cloned())
    }

    async fn search(
        &self,
        catalog: &dyn SecondaryCatalog,
        map: &IdentityMap,
        aid: u32,
    ) -> Result<Option<u32>, ScrapeError> {
        let plan = SearchPlan::new(map.titles(aid));
        if plan.is_empty() {
            log::debug!("anidb {aid} has no title suitable for searching {}", catalog.name());
            return Ok(None);
        }

        let mut best: Option<Match<u32>> = None;
        for query in plan {
            log::debug!("Searching {} for '{}'", catalog.name(), query.title);
            let candidates = catalog.search(&query).await?;
            let Some(found) = best_candidate(map.policy(), &query, &candidates) else {
                continue;
            };
            if found.is_exact() {
                return Ok(Some(found.key));
            }
            if best.as_ref().is_none_or(|b| found.distance() < b.distance()) {
                best = Some(found);
            }
        }
        Ok(best.map(|m| m.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(title: &str, kind: TitleType, lang: &str) -> TitleVariant {
        TitleVariant::new(title, kind, lang)
    }

    fn candidate(id: u32, title: &str, year: Option<i32>, in_category: bool) -> Candidate {
        Candidate {
            id,
            titles: vec![title.to_string()],
            year,
            in_category,
        }
    }

    #[test]
    fn plan_prefers_native_then_romanized_with_year_stripped_forms() {
        let titles = vec![
            variant("Fruits Basket (2019)", TitleType::Main, "x-jat"),
            variant("Fruits Basket", TitleType::Official, "en"),
            variant("フルーツバスケット (2019)", TitleType::Official, "ja"),
        ];
        let queries: Vec<_> = SearchPlan::new(&titles).collect();
        let summary: Vec<_> = queries
            .iter()
            .map(|q| (q.title.as_str(), q.year, q.script))
            .collect();
        assert_eq!(
            summary,
            [
                ("フルーツバスケット (2019)", None, Script::Native),
                ("フルーツバスケット", Some(2019), Script::Native),
                ("Fruits Basket (2019)", None, Script::Romanized),
                ("Fruits Basket", Some(2019), Script::Romanized),
            ]
        );
    }

    #[test]
    fn plan_without_native_or_main_title_is_empty() {
        let titles = vec![variant("Fruits Basket", TitleType::Official, "en")];
        assert!(SearchPlan::new(&titles).is_empty());
        assert_eq!(SearchPlan::new(&titles).count(), 0);
    }

    #[test]
    fn category_mismatch_is_never_an_exact_match() {
        let query = SearchQuery {
            title: "Cowboy Bebop".into(),
            year: None,
            script: Script::Romanized,
        };
        let candidates = [candidate(94664, "Cowboy Bebop", Some(2021), false)];
        assert!(best_candidate(&MatchPolicy::default(), &query, &candidates).is_none());
    }

    #[test]
    fn year_qualified_query_ignores_other_years() {
        let query = SearchQuery {
            title: "Fruits Basket".into(),
            year: Some(2019),
            script: Script::Romanized,
        };
        let candidates = [
            candidate(1, "Fruits Basket", Some(2001), true),
            candidate(2, "Fruits Basket: 2nd", Some(2019), true),
        ];
        let found = best_candidate(&MatchPolicy::default(), &query, &candidates).unwrap();
        assert_eq!(found.key, 2);
        assert!(!found.is_exact());
    }

    #[test]
    fn year_qualified_threshold_is_relaxed() {
        let policy = MatchPolicy {
            threshold: 2,
            ..Default::default()
        };
        let query = SearchQuery {
            title: "Kimetsu no Yaiba".into(),
            year: Some(2019),
            script: Script::Romanized,
        };
        // distance 3: beyond the base threshold, within 2 * 4.0
        let candidates = [candidate(7, "Kimetsu no Yaibaaaa", Some(2019), true)];
        assert!(best_candidate(&policy, &query, &candidates).is_some());

        let unqualified = SearchQuery { year: None, ..query };
        let candidates = [candidate(7, "Kimetsu no Yaibaaaa", None, true)];
        assert!(best_candidate(&policy, &unqualified, &candidates).is_none());
    }
}
