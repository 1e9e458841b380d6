//! Find-or-create resolution for AI document ingestion.
//!
//! Matching sees every row in the tenant's family, merged rows included: an
//! older merged-away row may bear the best available secondary key, and a
//! key-equal superseded row is trusted as a mapping so the same raw text
//! always lands on the same canonical target.
//!
//! Priority, first match wins: merge-history by normalized name, exact
//! strict-key match, loose heuristic-key match (recall only, where the
//! family enables it), secondary key (tax number / card suffix / item
//! code), then create.

use log::{debug, warn};

use crate::context::RequestContext;
use crate::error::TallyResult;
use crate::family::{Family, SecondaryKey};
use crate::forest::MergeForest;
use crate::normalize::{card_suffix, heuristic_key, strict_key};
use crate::record::{EntityRow, Observation};

use super::IdentityEngine;

/// How a match was found; drives the backfill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    /// Strict or heuristic name equality.
    Name,
    /// Tax number, card suffix, or item code.
    Secondary,
}

impl IdentityEngine {
    /// Returns the entity a raw extracted name denotes, creating one when
    /// nothing matches.
    ///
    /// # Errors
    /// - [`TallyError::InvalidName`](crate::error::TallyError::InvalidName)
    ///   for empty or placeholder names
    /// - store errors other than the handled creation race
    pub fn find_or_create(
        &self,
        ctx: &RequestContext,
        family: Family,
        raw_name: &str,
        observation: &Observation,
    ) -> TallyResult<EntityRow> {
        let name = self.validate_name(raw_name)?;
        let descriptor = family.descriptor();

        let rows = self.load_family(ctx, family)?;
        let forest = MergeForest::from_rows(&rows);

        let key = strict_key(&name);
        let mut hit = match_by_key(&rows, |row| strict_key(&row.name) == key)
            .map(|row| (row, MatchKind::Name));

        if hit.is_none() && descriptor.heuristic_names && self.config().heuristic_matching {
            let loose = heuristic_key(&name);
            hit = match_by_key(&rows, |row| heuristic_key(&row.name) == loose)
                .map(|row| (row, MatchKind::Name));
        }

        if hit.is_none() {
            hit = match_by_secondary(descriptor.secondary_key, &rows, &name, observation)
                .map(|row| (row, MatchKind::Secondary));
        }

        if let Some((row, kind)) = hit {
            debug!(
                "find_or_create {family} {name:?}: matched {} via {kind:?}",
                row.id
            );
            return self.adopt_match(ctx, family, row, &forest, &name, observation, kind);
        }

        let row = EntityRow::new(ctx.tenant_id, family, &name)
            .with_observation(observation)
            .recognized();
        match self.entity_store().insert(row) {
            Ok(created) => {
                debug!("find_or_create {family} {name:?}: created {}", created.id);
                Ok(created)
            }
            Err(err) if err.is_unique_violation() => {
                // A concurrent caller also concluded "no match, create" and
                // won. The row exists now; return it instead of the error.
                warn!("find_or_create {family} {name:?}: lost creation race, re-querying");
                let existing = self
                    .entity_store()
                    .find_by_name(ctx.tenant_id, family, &name)?;
                let rival = existing
                    .iter()
                    .find(|row| row.is_root())
                    .or_else(|| existing.first())
                    .cloned();
                match rival {
                    Some(rival) => Ok(rival),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves a matched row to its canonical target and backfills
    /// attributes the target lacks.
    fn adopt_match(
        &self,
        ctx: &RequestContext,
        family: Family,
        row: &EntityRow,
        forest: &MergeForest,
        name: &str,
        observation: &Observation,
        kind: MatchKind,
    ) -> TallyResult<EntityRow> {
        let canonical_id = forest.resolve(row.id);
        let canonical = if canonical_id == row.id {
            row.clone()
        } else {
            self.require(ctx, family, canonical_id)?
        };

        let mut patch = observation.backfill_for(&canonical);

        // Widen the name only on a secondary-key hit: a plain name hit means
        // the names are already equal, and replacing a curated name with a
        // shorter extraction would lose information.
        if kind == MatchKind::Secondary
            && name.chars().count() > canonical.name.chars().count()
        {
            patch.name = Some(name.to_string());
        }

        if patch.is_empty() {
            return Ok(canonical);
        }
        Ok(self
            .entity_store()
            .update(ctx.tenant_id, family, canonical.id, patch)?)
    }
}

/// First row matching the predicate, preferring superseded rows (their
/// pointer is a trusted prior mapping) over live roots.
fn match_by_key<'a, F>(rows: &'a [EntityRow], matches: F) -> Option<&'a EntityRow>
where
    F: Fn(&EntityRow) -> bool,
{
    let mut root_hit = None;
    for row in rows {
        if !matches(row) {
            continue;
        }
        if row.merged_into.is_some() {
            return Some(row);
        }
        root_hit.get_or_insert(row);
    }
    root_hit
}

/// Secondary-key match per the family descriptor.
fn match_by_secondary<'a>(
    secondary: SecondaryKey,
    rows: &'a [EntityRow],
    name: &str,
    observation: &Observation,
) -> Option<&'a EntityRow> {
    match secondary {
        SecondaryKey::None => None,
        SecondaryKey::TaxNumber => {
            let tax_no = observation.tax_no.as_deref()?.trim();
            if tax_no.is_empty() {
                return None;
            }
            rows.iter()
                .find(|row| row.tax_no.as_deref().map(str::trim) == Some(tax_no))
        }
        SecondaryKey::CardSuffix => {
            let suffix = card_suffix(name)?;
            rows.iter()
                .find(|row| card_suffix(&row.name).as_deref() == Some(suffix.as_str()))
        }
        SecondaryKey::ItemCode => {
            let code = observation.code.as_deref()?.trim();
            if code.is_empty() {
                return None;
            }
            rows.iter()
                .find(|row| row.code.as_deref().map(str::trim) == Some(code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TenantId;
    use crate::record::EntityId;

    fn row(name: &str) -> EntityRow {
        EntityRow::new(TenantId::new(), Family::Account, name)
    }

    #[test]
    fn test_match_prefers_superseded_mapping_over_root() {
        let target = EntityId::new();
        let mut merged = row("walmart");
        merged.merged_into = Some(target);
        let live = row("walmart");
        let rows = vec![live.clone(), merged.clone()];

        let hit = match_by_key(&rows, |r| r.name == "walmart").unwrap();
        assert_eq!(hit.id, merged.id, "superseded mapping wins");
    }

    #[test]
    fn test_match_falls_back_to_root() {
        let live = row("walmart");
        let rows = vec![live.clone()];
        let hit = match_by_key(&rows, |r| r.name == "walmart").unwrap();
        assert_eq!(hit.id, live.id);
    }

    #[test]
    fn test_secondary_card_suffix_matches_across_spellings() {
        let visa = row("Visa ****1234");
        let rows = vec![row("Petty cash"), visa.clone()];
        let hit = match_by_secondary(
            SecondaryKey::CardSuffix,
            &rows,
            "Visa ending in 1234",
            &Observation::none(),
        )
        .unwrap();
        assert_eq!(hit.id, visa.id);
    }

    #[test]
    fn test_secondary_tax_number_requires_observation() {
        let mut acme = row("Acme");
        acme.tax_no = Some("91330100MA27".to_string());
        let rows = vec![acme];

        assert!(match_by_secondary(
            SecondaryKey::TaxNumber,
            &rows,
            "Acme Trading",
            &Observation::none(),
        )
        .is_none());

        assert!(match_by_secondary(
            SecondaryKey::TaxNumber,
            &rows,
            "Acme Trading",
            &Observation::with_tax_no("91330100MA27"),
        )
        .is_some());
    }

    #[test]
    fn test_secondary_none_never_matches() {
        let rows = vec![row("anything")];
        assert!(match_by_secondary(
            SecondaryKey::None,
            &rows,
            "anything",
            &Observation::none()
        )
        .is_none());
    }
}
